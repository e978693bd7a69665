// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::budgets::UNCATEGORIZED;
use crate::commands::cards::{InvoiceStatus, all_invoice_statuses};
use crate::commands::categories::load_categories;
use crate::commands::transactions::{TxFilter, load_transactions};
use crate::models::{Transaction, TxType};
use crate::settings::Preferences;
use crate::utils::{
    flag, local_date, maybe_print_json, month_end, parse_month, parse_year, pretty_table, required,
};
use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, FixedOffset, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("summary", sub)) => summary(conn, sub)?,
        Some(("dashboard", sub)) => dashboard_cmd(conn, sub)?,
        _ => {}
    }
    Ok(())
}

/// How a month's balance is derived from its totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceMode {
    /// income − expense, may be negative
    Signed,
    /// max(0, income − expense)
    FloorAtZero,
}

impl BalanceMode {
    pub fn apply(&self, income: Decimal, expense: Decimal) -> Decimal {
        let b = income - expense;
        match self {
            BalanceMode::Signed => b,
            BalanceMode::FloorAtZero => b.max(Decimal::ZERO),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSummary {
    pub month: String,
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

/// Twelve buckets, January first. Each transaction lands in the month of
/// its local calendar date; other years are ignored.
pub fn monthly_summary(
    txs: &[Transaction],
    year: i32,
    offset: &FixedOffset,
    mode: BalanceMode,
) -> Result<Vec<MonthSummary>> {
    let mut buckets = [(Decimal::ZERO, Decimal::ZERO); 12];
    for t in txs {
        let d = local_date(&t.date, offset)
            .with_context(|| format!("Transaction {} has an unusable date", t.id))?;
        if d.year() != year {
            continue;
        }
        let slot = &mut buckets[d.month0() as usize];
        match t.r#type {
            TxType::Income => slot.0 += t.amount,
            TxType::Expense => slot.1 += t.amount,
        }
    }
    Ok(buckets
        .iter()
        .enumerate()
        .map(|(i, (income, expense))| MonthSummary {
            month: format!("{}-{:02}", year, i + 1),
            income: *income,
            expense: *expense,
            balance: mode.apply(*income, *expense),
        })
        .collect())
}

fn summary(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let prefs = Preferences::load(conn)?;
    let year = parse_year(required(sub, "year")?)?;
    let txs = load_transactions(conn, &TxFilter::default())?;
    let months = monthly_summary(&txs, year, &prefs.utc_offset, BalanceMode::Signed)?;
    if maybe_print_json(flag(sub, "json"), flag(sub, "jsonl"), &months)? {
        return Ok(());
    }
    let (mut inc, mut exp) = (Decimal::ZERO, Decimal::ZERO);
    let mut rows: Vec<Vec<String>> = months
        .iter()
        .map(|m| {
            inc += m.income;
            exp += m.expense;
            vec![
                m.month.clone(),
                prefs.money(&m.income),
                prefs.money(&m.expense),
                prefs.money(&m.balance),
            ]
        })
        .collect();
    rows.push(vec![
        "Total".into(),
        prefs.money(&inc),
        prefs.money(&exp),
        prefs.money(&BalanceMode::Signed.apply(inc, exp)),
    ]);
    println!(
        "{}",
        pretty_table(&["Month", "Income", "Expense", "Balance"], rows)
    );
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySpend {
    pub category: String,
    pub spent: Decimal,
    pub budget: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub month: String,
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
    pub spend_by_category: Vec<CategorySpend>,
    pub invoices: Vec<InvoiceStatus>,
}

pub fn dashboard(conn: &Connection, year: i32, month: u32, prefs: &Preferences) -> Result<Dashboard> {
    let txs = load_transactions(conn, &TxFilter::default())?;
    let months = monthly_summary(&txs, year, &prefs.utc_offset, BalanceMode::Signed)?;
    let this = month
        .checked_sub(1)
        .and_then(|i| months.get(i as usize))
        .ok_or_else(|| anyhow!("Invalid month {}", month))?;

    let categories = load_categories(conn)?;
    let names: HashMap<i64, (&str, Decimal)> = categories
        .iter()
        .map(|c| (c.id, (c.name.as_str(), c.budget)))
        .collect();
    let mut spend: HashMap<String, (Decimal, Decimal)> = HashMap::new();
    for t in txs.iter().filter(|t| t.r#type == TxType::Expense) {
        let d = local_date(&t.date, &prefs.utc_offset)?;
        if d.year() != year || d.month() != month {
            continue;
        }
        let (name, budget) = t
            .category_id
            .and_then(|id| names.get(&id).copied())
            .unwrap_or((UNCATEGORIZED, Decimal::ZERO));
        let entry = spend
            .entry(name.to_string())
            .or_insert((Decimal::ZERO, budget));
        entry.0 += t.amount;
    }
    let mut spend_by_category: Vec<CategorySpend> = spend
        .into_iter()
        .map(|(category, (spent, budget))| CategorySpend {
            category,
            spent,
            budget,
        })
        .collect();
    spend_by_category.sort_by(|a, b| b.spent.cmp(&a.spent).then(a.category.cmp(&b.category)));

    // billing cycles are computed from the end of the viewed month when it is in the past
    let today = Utc::now().with_timezone(&prefs.utc_offset).date_naive();
    let anchor = month_end(year, month)?.min(today);
    Ok(Dashboard {
        month: this.month.clone(),
        income: this.income,
        expense: this.expense,
        balance: this.balance,
        spend_by_category,
        invoices: all_invoice_statuses(conn, anchor)?,
    })
}

fn dashboard_cmd(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let prefs = Preferences::load(conn)?;
    let (year, month) = parse_month(required(sub, "month")?)?;
    let dash = dashboard(conn, year, month, &prefs)?;
    if maybe_print_json(flag(sub, "json"), false, &dash)? {
        return Ok(());
    }
    println!(
        "{}",
        pretty_table(
            &["Month", "Income", "Expense", "Balance"],
            vec![vec![
                dash.month.clone(),
                prefs.money(&dash.income),
                prefs.money(&dash.expense),
                prefs.money(&dash.balance),
            ]]
        )
    );
    let rows = dash
        .spend_by_category
        .iter()
        .map(|c| {
            vec![
                c.category.clone(),
                prefs.money(&c.spent),
                prefs.money(&c.budget),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Category", "Spent", "Budget"], rows)
    );
    if !dash.invoices.is_empty() {
        let rows = dash
            .invoices
            .iter()
            .map(|i| {
                vec![
                    i.card.clone(),
                    prefs.money(&i.current_invoice),
                    prefs.percent(&i.usage_percent),
                    i.cycle.due.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Card", "Invoice", "Usage", "Due"], rows)
        );
    }
    Ok(())
}
