// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use finplan::commands::portfolio::{
    self, PriceFeed, PriceStatus, latest_price, value_portfolio, yield_percent,
};
use finplan::error::FinError;
use finplan::models::Asset;
use finplan::{cli, db};
use rusqlite::Connection;
use rust_decimal::Decimal;

struct FixedFeed(Decimal);

impl PriceFeed for FixedFeed {
    fn unit_price(&self, _asset: &Asset, _currency: &str) -> Result<Decimal, FinError> {
        Ok(self.0)
    }
}

struct DownFeed;

impl PriceFeed for DownFeed {
    fn unit_price(&self, asset: &Asset, _currency: &str) -> Result<Decimal, FinError> {
        Err(FinError::PriceLookup {
            ticker: asset.ticker.clone(),
            reason: "connection refused".into(),
        })
    }
}

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    conn.execute_batch(
        r#"
        INSERT INTO assets(id,ticker,name,type,quantity,invested_amount) VALUES
            (1,'BTC','Bitcoin','CRYPTO','0.5','10000'),
            (2,'PETR4','Petrobras','STOCK','100','3000'),
            (3,'CDB','Bank CDB','FIXED','1','5000'),
            (4,'GIFT','Gifted shares','STOCK','10','0'),
            (5,'SOLD','Sold out','STOCK','0','0');
        "#,
    )
    .unwrap();
    conn
}

fn position<'a>(
    report: &'a portfolio::PortfolioReport,
    ticker: &str,
) -> &'a portfolio::Valuation {
    report.positions.iter().find(|p| p.ticker == ticker).unwrap()
}

#[test]
fn live_quote_is_used_and_cached() {
    let conn = setup();
    let feed = FixedFeed(Decimal::from(30000));
    let report = value_portfolio(&conn, Some(&feed), "USD").unwrap();
    let btc = position(&report, "BTC");
    assert_eq!(btc.status, PriceStatus::Live);
    assert_eq!(btc.market_value, Decimal::from(15000));
    assert_eq!(btc.yield_percent, Decimal::from(50));
    assert_eq!(latest_price(&conn, 1).unwrap(), Some(Decimal::from(30000)));
}

#[test]
fn failed_lookup_is_stale_and_uses_cached_price_or_cost() {
    let conn = setup();
    let report = value_portfolio(&conn, Some(&DownFeed), "USD").unwrap();
    let btc = position(&report, "BTC");
    assert_eq!(btc.status, PriceStatus::Stale);
    assert_eq!(btc.unit_price, None);
    assert_eq!(btc.market_value, Decimal::from(10000));

    conn.execute(
        "INSERT INTO prices(asset_id,as_of,price,source) VALUES (1,'2025-01-01','24000','manual')",
        [],
    )
    .unwrap();
    let report = value_portfolio(&conn, Some(&DownFeed), "USD").unwrap();
    let btc = position(&report, "BTC");
    assert_eq!(btc.status, PriceStatus::Stale);
    assert_eq!(btc.market_value, Decimal::from(12000));
    // GIFT has no price source either
    assert_eq!(report.totals.stale_positions, 2);
}

#[test]
fn offline_valuation_uses_reference_cost_and_zero_yield_without_investment() {
    let conn = setup();
    let report = value_portfolio(&conn, None, "BRL").unwrap();
    assert_eq!(report.currency, "BRL");
    // positions with no quantity and no cost are skipped
    assert!(report.positions.iter().all(|p| p.ticker != "SOLD"));

    let petr = position(&report, "PETR4");
    assert_eq!(petr.status, PriceStatus::Reference);
    assert_eq!(petr.market_value, Decimal::from(3850));

    let cdb = position(&report, "CDB");
    assert_eq!(cdb.status, PriceStatus::CostBasis);
    assert_eq!(cdb.market_value, Decimal::from(5000));
    assert!(cdb.yield_percent.is_zero());

    let gift = position(&report, "GIFT");
    assert_eq!(gift.status, PriceStatus::Stale);
    assert!(gift.yield_percent.is_zero());
}

#[test]
fn stored_price_beats_reference() {
    let conn = setup();
    conn.execute(
        "INSERT INTO prices(asset_id,as_of,price,source) VALUES (2,'2025-06-01','40','manual')",
        [],
    )
    .unwrap();
    let report = value_portfolio(&conn, None, "BRL").unwrap();
    let petr = position(&report, "PETR4");
    assert_eq!(petr.status, PriceStatus::Stored);
    assert_eq!(petr.market_value, Decimal::from(4000));
    assert_eq!(report.totals.invested_amount, Decimal::from(18000));
}

#[test]
fn selling_reduces_cost_basis_proportionally() {
    let mut conn = setup();
    let matches = cli::build_cli().get_matches_from([
        "finplan", "asset", "sell", "--ticker", "petr4", "--quantity", "25",
    ]);
    let Some(("asset", m)) = matches.subcommand() else {
        panic!("no asset subcommand");
    };
    portfolio::handle(&mut conn, m).unwrap();
    let (qty, invested): (String, String) = conn
        .query_row(
            "SELECT quantity, invested_amount FROM assets WHERE ticker='PETR4'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(qty.parse::<Decimal>().unwrap(), Decimal::from(75));
    assert_eq!(invested.parse::<Decimal>().unwrap(), Decimal::from(2250));
}

fn run_asset(conn: &mut Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["finplan", "asset"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    let Some(("asset", m)) = matches.subcommand() else {
        panic!("no asset subcommand");
    };
    portfolio::handle(conn, m)
}

#[test]
fn negative_trades_are_rejected() {
    let mut conn = setup();
    let buy = run_asset(
        &mut conn,
        &["buy", "--ticker", "PETR4", "--quantity=-5", "--amount", "100"],
    )
    .unwrap_err();
    assert!(matches!(
        buy.downcast_ref::<FinError>(),
        Some(FinError::InvalidInput(_))
    ));
    assert!(run_asset(&mut conn, &["buy", "--ticker", "PETR4", "--quantity", "5", "--amount=-100"]).is_err());
    assert!(run_asset(&mut conn, &["sell", "--ticker", "PETR4", "--quantity=-5"]).is_err());
    let qty: String = conn
        .query_row("SELECT quantity FROM assets WHERE ticker='PETR4'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(qty, "100");
}

#[test]
fn unrepresentable_values_fall_back_instead_of_panicking() {
    let tiny = Decimal::new(1, 28);
    assert!(yield_percent(Decimal::from(1000), tiny).is_zero());

    let conn = setup();
    conn.execute(
        "INSERT INTO prices(asset_id,as_of,price,source) VALUES (2,'2025-06-01','79228162514264337593543950335','manual')",
        [],
    )
    .unwrap();
    let report = value_portfolio(&conn, None, "BRL").unwrap();
    let petr = position(&report, "PETR4");
    assert_eq!(petr.status, PriceStatus::Stale);
    assert_eq!(petr.market_value, Decimal::from(3000));
}
