// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, command, value_parser};

fn opt(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help)
}

fn req(name: &'static str, help: &'static str) -> Arg {
    opt(name, help).required(true)
}

fn switch(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .action(ArgAction::SetTrue)
        .help(help)
}

fn json() -> Arg {
    switch("json", "Print pretty JSON")
}

fn jsonl() -> Arg {
    switch("jsonl", "Print one JSON object per line")
}

fn day(name: &'static str, long: &'static str, help: &'static str) -> Arg {
    opt(name, help)
        .long(long)
        .value_parser(value_parser!(u32).range(1..=31))
}

pub fn build_cli() -> Command {
    command!()
        .name("finplan")
        .about("Personal finance: incomes, expenses, card invoices, investments and goals")
        .subcommand_required(false)
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("config")
                .about("User preferences (base_currency, utc_offset, privacy_mode)")
                .subcommand(
                    Command::new("set")
                        .arg(Arg::new("key").required(true))
                        .arg(Arg::new("value").required(true).allow_hyphen_values(true)),
                )
                .subcommand(Command::new("get").arg(Arg::new("key").required(true)))
                .subcommand(Command::new("list")),
        )
        .subcommand(
            Command::new("category")
                .about("Income and expense categories")
                .subcommand(
                    Command::new("add")
                        .arg(req("name", "Category name"))
                        .arg(req("type", "income|expense"))
                        .arg(opt("budget", "Monthly budget")),
                )
                .subcommand(Command::new("list"))
                .subcommand(Command::new("rm").arg(req("name", "Category name"))),
        )
        .subcommand(
            Command::new("tx")
                .about("Transactions")
                .subcommand(
                    Command::new("add")
                        .arg(req("date", "YYYY-MM-DD"))
                        .arg(req("description", "What it was"))
                        .arg(req("amount", "Positive amount"))
                        .arg(req("type", "income|expense"))
                        .arg(opt("category", "Category name"))
                        .arg(opt("card", "Credit card name"))
                        .arg(
                            opt("installments", "Split into N monthly installments")
                                .value_parser(value_parser!(u32).range(1..=120)),
                        )
                        .arg(switch("paid", "Record as already paid")),
                )
                .subcommand(
                    Command::new("list")
                        .arg(opt("month", "YYYY-MM"))
                        .arg(opt("type", "income|expense"))
                        .arg(opt("category", "Category name"))
                        .arg(opt("card", "Credit card name"))
                        .arg(switch("unpaid", "Only unpaid rows"))
                        .arg(opt("limit", "Max rows").value_parser(value_parser!(usize)))
                        .arg(json())
                        .arg(jsonl()),
                )
                .subcommand(Command::new("rm").arg(req("id", "Transaction id"))),
        )
        .subcommand(
            Command::new("card")
                .about("Credit cards and invoices")
                .subcommand(
                    Command::new("add")
                        .arg(req("name", "Card name"))
                        .arg(req("limit", "Credit limit"))
                        .arg(day("closing_day", "closing-day", "Day the invoice closes").required(true))
                        .arg(day("due_day", "due-day", "Day the invoice is due").required(true))
                        .arg(opt("color", "Display color")),
                )
                .subcommand(Command::new("list").arg(json()))
                .subcommand(Command::new("rm").arg(req("name", "Card name")))
                .subcommand(
                    Command::new("invoice")
                        .arg(req("name", "Card name"))
                        .arg(json()),
                )
                .subcommand(
                    Command::new("pay")
                        .about("Settle the invoice up to a date")
                        .arg(req("name", "Card name"))
                        .arg(opt("date", "Settle rows on or before YYYY-MM-DD (default today)"))
                        .arg(json()),
                )
                .subcommand(Command::new("payments").arg(opt("name", "Card name"))),
        )
        .subcommand(
            Command::new("budget")
                .about("Category budgets and the planning table")
                .subcommand(
                    Command::new("set")
                        .arg(req("category", "Category name"))
                        .arg(req("amount", "Budget amount"))
                        .arg(opt("month", "Override a single YYYY-MM")),
                )
                .subcommand(Command::new("list").arg(opt("month", "YYYY-MM")))
                .subcommand(
                    Command::new("plan")
                        .arg(req("year", "YYYY"))
                        .arg(json()),
                ),
        )
        .subcommand(
            Command::new("asset")
                .about("Investments")
                .subcommand(
                    Command::new("add")
                        .arg(req("ticker", "Ticker"))
                        .arg(opt("name", "Display name"))
                        .arg(req("type", "stock|fii|crypto|fixed"))
                        .arg(opt("quantity", "Units held"))
                        .arg(opt("invested", "Cost basis"))
                        .arg(opt("price_id", "Coin id for the crypto price API").long("price-id")),
                )
                .subcommand(Command::new("list"))
                .subcommand(Command::new("rm").arg(req("ticker", "Ticker")))
                .subcommand(
                    Command::new("buy")
                        .arg(req("ticker", "Ticker"))
                        .arg(req("quantity", "Units bought"))
                        .arg(req("amount", "Total cost")),
                )
                .subcommand(
                    Command::new("sell")
                        .arg(req("ticker", "Ticker"))
                        .arg(req("quantity", "Units sold")),
                )
                .subcommand(
                    Command::new("price")
                        .about("Record a manual unit price")
                        .arg(req("ticker", "Ticker"))
                        .arg(req("price", "Unit price"))
                        .arg(opt("date", "YYYY-MM-DD")),
                )
                .subcommand(
                    Command::new("value")
                        .arg(switch("live", "Fetch crypto prices"))
                        .arg(json()),
                ),
        )
        .subcommand(
            Command::new("goal")
                .about("Savings goals")
                .subcommand(
                    Command::new("add")
                        .arg(req("name", "Goal name"))
                        .arg(req("target", "Target amount"))
                        .arg(opt("current", "Already saved"))
                        .arg(opt("deadline", "YYYY-MM-DD")),
                )
                .subcommand(Command::new("list").arg(json()))
                .subcommand(
                    Command::new("deposit")
                        .arg(req("name", "Goal name"))
                        .arg(
                            req("amount", "Amount to add (negative withdraws)")
                                .allow_hyphen_values(true),
                        ),
                )
                .subcommand(Command::new("rm").arg(req("name", "Goal name"))),
        )
        .subcommand(
            Command::new("report")
                .about("Monthly summaries and the dashboard")
                .subcommand(
                    Command::new("summary")
                        .arg(req("year", "YYYY"))
                        .arg(json())
                        .arg(jsonl()),
                )
                .subcommand(
                    Command::new("dashboard")
                        .arg(req("month", "YYYY-MM"))
                        .arg(json()),
                ),
        )
        .subcommand(
            Command::new("export").subcommand(
                Command::new("transactions")
                    .arg(req("format", "csv|json"))
                    .arg(req("out", "Output path")),
            ),
        )
        .subcommand(Command::new("doctor").about("Check data for problems"))
}
