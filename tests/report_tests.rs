// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use finplan::commands::reports::{BalanceMode, dashboard, monthly_summary};
use finplan::models::{Transaction, TxType};
use finplan::settings::Preferences;
use finplan::utils::parse_offset;
use finplan::db;
use rusqlite::Connection;
use rust_decimal::Decimal;

fn tx(id: i64, date: &str, amount: i64, r#type: TxType) -> Transaction {
    Transaction {
        id,
        date: date.to_string(),
        description: format!("t{}", id),
        amount: Decimal::from(amount),
        r#type,
        category_id: None,
        credit_card_id: None,
        installment_number: None,
        installment_total: None,
        is_paid: false,
    }
}

#[test]
fn summary_has_twelve_months_with_signed_balance() {
    let txs = vec![
        tx(1, "2025-01-05", 100, TxType::Income),
        tx(2, "2025-01-20", 40, TxType::Expense),
        tx(3, "2025-03-02", 80, TxType::Expense),
        tx(4, "2024-12-31", 999, TxType::Income),
    ];
    let utc = parse_offset("+00:00").unwrap();
    let months = monthly_summary(&txs, 2025, &utc, BalanceMode::Signed).unwrap();
    assert_eq!(months.len(), 12);
    assert_eq!(months[0].month, "2025-01");
    assert_eq!(months[0].income, Decimal::from(100));
    assert_eq!(months[0].expense, Decimal::from(40));
    assert_eq!(months[0].balance, Decimal::from(60));
    assert_eq!(months[1].balance, Decimal::ZERO);
    assert_eq!(months[2].balance, Decimal::from(-80));
    assert_eq!(months[11].month, "2025-12");
}

#[test]
fn floor_at_zero_never_goes_negative() {
    let txs = vec![tx(1, "2025-03-02", 80, TxType::Expense)];
    let utc = parse_offset("+00:00").unwrap();
    let months = monthly_summary(&txs, 2025, &utc, BalanceMode::FloorAtZero).unwrap();
    assert_eq!(months[2].balance, Decimal::ZERO);
    assert_eq!(months[2].expense, Decimal::from(80));
}

#[test]
fn timestamps_bucket_by_local_calendar_date() {
    // 02:00 UTC on Feb 1st is still January 31st at UTC-3
    let txs = vec![tx(1, "2025-02-01T02:00:00Z", 50, TxType::Expense)];
    let brt = parse_offset("-03:00").unwrap();
    let months = monthly_summary(&txs, 2025, &brt, BalanceMode::Signed).unwrap();
    assert_eq!(months[0].expense, Decimal::from(50));
    assert_eq!(months[1].expense, Decimal::ZERO);

    let utc = parse_offset("+00:00").unwrap();
    let months = monthly_summary(&txs, 2025, &utc, BalanceMode::Signed).unwrap();
    assert_eq!(months[1].expense, Decimal::from(50));
}

#[test]
fn unusable_dates_are_reported() {
    let txs = vec![tx(7, "31/01/2025", 10, TxType::Expense)];
    let utc = parse_offset("+00:00").unwrap();
    let err = monthly_summary(&txs, 2025, &utc, BalanceMode::Signed).unwrap_err();
    assert!(err.to_string().contains("Transaction 7"));
}

#[test]
fn dashboard_groups_spend_by_category() {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    conn.execute_batch(
        r#"
        INSERT INTO categories(id,name,type,budget) VALUES (1,'Food','EXPENSE','300'), (2,'Salary','INCOME','0');
        INSERT INTO transactions(date,description,amount,type,category_id) VALUES
            ('2025-04-01','Pay','2000','INCOME',2),
            ('2025-04-03','Market','120','EXPENSE',1),
            ('2025-04-09','Diner','30','EXPENSE',1),
            ('2025-04-10','Misc','200','EXPENSE',NULL),
            ('2025-05-01','Market','99','EXPENSE',1);
        "#,
    )
    .unwrap();
    let dash = dashboard(&conn, 2025, 4, &Preferences::default()).unwrap();
    assert_eq!(dash.month, "2025-04");
    assert_eq!(dash.income, Decimal::from(2000));
    assert_eq!(dash.expense, Decimal::from(350));
    assert_eq!(dash.balance, Decimal::from(1650));
    assert_eq!(dash.spend_by_category.len(), 2);
    assert_eq!(dash.spend_by_category[0].category, "(uncategorized)");
    assert_eq!(dash.spend_by_category[1].category, "Food");
    assert_eq!(dash.spend_by_category[1].spent, Decimal::from(150));
    assert_eq!(dash.spend_by_category[1].budget, Decimal::from(300));
    assert!(dash.invoices.is_empty());
}
