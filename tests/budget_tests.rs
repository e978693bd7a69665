// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use finplan::commands::budgets::{self, load_overrides, planning_grid, UNCATEGORIZED};
use finplan::commands::categories::{self, load_categories};
use finplan::error::FinError;
use finplan::models::TxType;
use finplan::commands::transactions::{TxFilter, load_transactions};
use finplan::utils::parse_offset;
use finplan::{cli, db};
use rusqlite::Connection;
use rust_decimal::Decimal;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    conn.execute_batch(
        r#"
        INSERT INTO categories(id,name,type,budget) VALUES
            (1,'Rent','EXPENSE','1000'),
            (2,'Gifts','EXPENSE','0'),
            (3,'Salary','INCOME','4000');
        INSERT INTO transactions(date,description,amount,type,category_id) VALUES
            ('2025-01-05','Jan rent','1000','EXPENSE',1),
            ('2025-01-06','Jan pay','4000','INCOME',3),
            ('2025-02-05','Feb rent','1000','EXPENSE',1),
            ('2025-02-07','Bakery','25','EXPENSE',NULL),
            ('2024-12-24','Old gift','80','EXPENSE',2);
        "#,
    )
    .unwrap();
    conn
}

fn run_budget(conn: &Connection, args: &[&str]) {
    let mut argv = vec!["finplan", "budget"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    let Some(("budget", m)) = matches.subcommand() else {
        panic!("no budget subcommand");
    };
    budgets::handle(conn, m).unwrap();
}

fn grid(conn: &Connection, year: i32) -> budgets::BudgetPlan {
    let categories = load_categories(conn).unwrap();
    let overrides = load_overrides(conn, year).unwrap();
    let txs = load_transactions(conn, &TxFilter::default()).unwrap();
    planning_grid(
        &categories,
        &overrides,
        &txs,
        year,
        &parse_offset("+00:00").unwrap(),
    )
    .unwrap()
}

#[test]
fn ghost_rows_are_suppressed_and_untagged_spend_gets_a_row() {
    let conn = setup();
    let plan = grid(&conn, 2025);
    let names: Vec<&str> = plan.rows.iter().map(|r| r.category.as_str()).collect();
    assert!(!names.contains(&"Gifts"));
    assert!(names.contains(&"Rent"));
    assert!(names.contains(&"Salary"));
    let untagged = plan
        .rows
        .iter()
        .find(|r| r.category == UNCATEGORIZED)
        .unwrap();
    assert_eq!(untagged.r#type, TxType::Expense);
    assert_eq!(untagged.months[1].realized, Decimal::from(25));
    assert!(untagged.planned_total.is_zero());
}

#[test]
fn month_override_replaces_category_budget_for_that_cell() {
    let conn = setup();
    run_budget(&conn, &["set", "--category", "Rent", "--amount", "1200", "--month", "2025-03"]);
    let plan = grid(&conn, 2025);
    let rent = plan.rows.iter().find(|r| r.category == "Rent").unwrap();
    assert_eq!(rent.months[0].planned, Decimal::from(1000));
    assert_eq!(rent.months[2].planned, Decimal::from(1200));
    assert_eq!(rent.planned_total, Decimal::from(12200));
    assert_eq!(rent.realized_total, Decimal::from(2000));
}

#[test]
fn setting_default_budget_updates_category() {
    let conn = setup();
    run_budget(&conn, &["set", "--category", "Gifts", "--amount", "50"]);
    let plan = grid(&conn, 2025);
    let gifts = plan.rows.iter().find(|r| r.category == "Gifts").unwrap();
    assert_eq!(gifts.planned_total, Decimal::from(600));
    // the 2024 gift belongs to another year
    assert!(gifts.realized_total.is_zero());
}

#[test]
fn footer_balance_is_floored_at_zero() {
    let conn = setup();
    let plan = grid(&conn, 2025);
    assert_eq!(plan.footer.len(), 12);
    assert_eq!(plan.footer[0].balance, Decimal::from(3000));
    assert_eq!(plan.footer[1].expense, Decimal::from(1025));
    assert_eq!(plan.footer[1].balance, Decimal::ZERO);
}

#[test]
fn untagged_income_and_expense_get_separate_rows() {
    let conn = setup();
    conn.execute(
        "INSERT INTO transactions(date,description,amount,type) VALUES ('2025-02-15','Side gig','4000','INCOME')",
        [],
    )
    .unwrap();
    let plan = grid(&conn, 2025);
    let untagged: Vec<_> = plan
        .rows
        .iter()
        .filter(|r| r.category == UNCATEGORIZED)
        .collect();
    assert_eq!(untagged.len(), 2);
    let income = untagged.iter().find(|r| r.r#type == TxType::Income).unwrap();
    let expense = untagged.iter().find(|r| r.r#type == TxType::Expense).unwrap();
    assert_eq!(income.months[1].realized, Decimal::from(4000));
    assert_eq!(expense.months[1].realized, Decimal::from(25));
}

#[test]
fn removing_unknown_category_is_not_found() {
    let conn = setup();
    let matches = cli::build_cli().get_matches_from(["finplan", "category", "rm", "--name", "Travel"]);
    let Some(("category", m)) = matches.subcommand() else {
        panic!("no category subcommand");
    };
    let err = categories::handle(&conn, m).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FinError>(),
        Some(FinError::NotFound { kind: "Category", .. })
    ));
}
