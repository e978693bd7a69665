// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::FinError;
use crate::models::{Asset, AssetType};
use crate::settings::Preferences;
use crate::utils::{
    flag, http_client, id_for_asset, maybe_print_json, optional, parse_date, parse_decimal,
    pretty_table, required, stored_decimal,
};
use anyhow::{Result, anyhow};
use chrono::Utc;
use once_cell::sync::Lazy;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add_asset(conn, sub)?,
        Some(("list", _)) => list_assets(conn)?,
        Some(("rm", sub)) => {
            let ticker = required(sub, "ticker")?.to_uppercase();
            let id = id_for_asset(conn, &ticker)?;
            conn.execute("DELETE FROM assets WHERE id=?1", params![id])?;
            println!("Removed asset {}", ticker);
        }
        Some(("buy", sub)) => buy(conn, sub)?,
        Some(("sell", sub)) => sell(conn, sub)?,
        Some(("price", sub)) => set_price(conn, sub)?,
        Some(("value", sub)) => value(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn add_asset(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let ticker = required(sub, "ticker")?.to_uppercase();
    let name = optional(sub, "name").unwrap_or(ticker.as_str()).to_string();
    let typ: AssetType = required(sub, "type")?.parse()?;
    let quantity = match optional(sub, "quantity") {
        Some(raw) => parse_decimal(raw)?,
        None => Decimal::ZERO,
    };
    let invested = match optional(sub, "invested") {
        Some(raw) => parse_decimal(raw)?,
        None => Decimal::ZERO,
    };
    let price_id = optional(sub, "price_id").map(|s| s.to_lowercase());
    conn.execute(
        "INSERT INTO assets(ticker, name, type, quantity, invested_amount, price_id)
         VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            ticker,
            name,
            typ.as_str(),
            quantity.to_string(),
            invested.to_string(),
            price_id
        ],
    )?;
    log::info!("asset {} added", ticker);
    println!("Added asset {} ({}, {})", ticker, name, typ);
    Ok(())
}

pub fn load_assets(conn: &Connection) -> Result<Vec<Asset>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, ticker, name, type, quantity, invested_amount, price_id FROM assets ORDER BY ticker",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
            r.get::<_, Option<String>>(6)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, ticker, name, typ, qty, invested, price_id) = row?;
        out.push(Asset {
            r#type: typ.parse()?,
            quantity: stored_decimal(&qty, &format!("quantity of {}", ticker))?,
            invested_amount: stored_decimal(&invested, &format!("invested amount of {}", ticker))?,
            id,
            ticker,
            name,
            price_id,
        });
    }
    Ok(out)
}

fn load_asset(conn: &Connection, ticker: &str) -> Result<Asset> {
    let id = id_for_asset(conn, ticker)?;
    load_assets(conn)?
        .into_iter()
        .find(|a| a.id == id)
        .ok_or_else(|| anyhow!("Asset '{}' not found", ticker))
}

fn list_assets(conn: &Connection) -> Result<()> {
    let prefs = Preferences::load(conn)?;
    let data = load_assets(conn)?
        .into_iter()
        .map(|a| {
            vec![
                a.ticker,
                a.name,
                a.r#type.to_string(),
                format!("{:.4}", a.quantity),
                prefs.money(&a.invested_amount),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Ticker", "Name", "Type", "Qty", "Invested"], data)
    );
    Ok(())
}

fn positive_quantity(raw: &str) -> Result<Decimal> {
    let qty = parse_decimal(raw)?;
    if qty <= Decimal::ZERO {
        return Err(FinError::InvalidInput(format!("quantity must be positive, got {}", qty)).into());
    }
    Ok(qty)
}

fn buy(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let asset = load_asset(conn, &required(sub, "ticker")?.to_uppercase())?;
    let qty = positive_quantity(required(sub, "quantity")?)?;
    let cost = parse_decimal(required(sub, "amount")?)?;
    if cost < Decimal::ZERO {
        return Err(FinError::InvalidInput(format!("cost must not be negative, got {}", cost)).into());
    }
    conn.execute(
        "UPDATE assets SET quantity=?1, invested_amount=?2 WHERE id=?3",
        params![
            (asset.quantity + qty).to_string(),
            (asset.invested_amount + cost).to_string(),
            asset.id
        ],
    )?;
    log::info!("bought {} {} for {}", qty, asset.ticker, cost);
    println!("Bought {} x {} for {}", qty, asset.ticker, cost);
    Ok(())
}

/// Reduce a position at average cost: the invested amount shrinks in
/// proportion to the quantity sold.
pub fn reduce_position(asset: &Asset, qty: Decimal) -> Result<(Decimal, Decimal)> {
    if qty > asset.quantity {
        return Err(FinError::InvalidInput(format!(
            "cannot sell {} {}, only {} held",
            qty, asset.ticker, asset.quantity
        ))
        .into());
    }
    let remaining = asset.quantity - qty;
    let invested = if remaining.is_zero() || asset.quantity.is_zero() {
        Decimal::ZERO
    } else {
        asset.invested_amount * remaining / asset.quantity
    };
    Ok((remaining, invested.round_dp(2)))
}

fn sell(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let asset = load_asset(conn, &required(sub, "ticker")?.to_uppercase())?;
    let qty = positive_quantity(required(sub, "quantity")?)?;
    let (remaining, invested) = reduce_position(&asset, qty)?;
    conn.execute(
        "UPDATE assets SET quantity=?1, invested_amount=?2 WHERE id=?3",
        params![remaining.to_string(), invested.to_string(), asset.id],
    )?;
    log::info!("sold {} {}, {} left", qty, asset.ticker, remaining);
    println!("Sold {} x {} ({} left)", qty, asset.ticker, remaining);
    Ok(())
}

fn set_price(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let ticker = required(sub, "ticker")?.to_uppercase();
    let asset_id = id_for_asset(conn, &ticker)?;
    let price = parse_decimal(required(sub, "price")?)?;
    let as_of = match optional(sub, "date") {
        Some(raw) => parse_date(raw)?.to_string(),
        None => Utc::now().to_rfc3339(),
    };
    store_price(conn, asset_id, &as_of, price, "manual")?;
    println!("Price of {} set to {} as of {}", ticker, price, as_of);
    Ok(())
}

fn store_price(conn: &Connection, asset_id: i64, as_of: &str, price: Decimal, source: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO prices(asset_id, as_of, price, source) VALUES (?1, ?2, ?3, ?4)",
        params![asset_id, as_of, price.to_string(), source],
    )?;
    Ok(())
}

pub fn latest_price(conn: &Connection, asset_id: i64) -> Result<Option<Decimal>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT price FROM prices WHERE asset_id=?1 ORDER BY as_of DESC, id DESC LIMIT 1",
            params![asset_id],
            |r| r.get(0),
        )
        .optional()?;
    raw.map(|s| stored_decimal(&s, "price")).transpose()
}

/// Where a unit price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceStatus {
    Live,
    Stored,
    Reference,
    CostBasis,
    Stale,
}

impl PriceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PriceStatus::Live => "live",
            PriceStatus::Stored => "stored",
            PriceStatus::Reference => "reference",
            PriceStatus::CostBasis => "cost basis",
            PriceStatus::Stale => "STALE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub price: Option<Decimal>,
    pub status: PriceStatus,
}

/// Source of current unit prices.
pub trait PriceFeed {
    fn unit_price(&self, asset: &Asset, currency: &str) -> Result<Decimal, FinError>;
}

/// Public crypto price API, keyed by coin id.
pub struct CoinGecko {
    client: reqwest::blocking::Client,
    base_url: String,
}

static COIN_IDS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("BTC", "bitcoin"),
        ("ETH", "ethereum"),
        ("SOL", "solana"),
        ("ADA", "cardano"),
        ("XRP", "ripple"),
        ("DOGE", "dogecoin"),
        ("USDT", "tether"),
        ("USDC", "usd-coin"),
        ("BNB", "binancecoin"),
        ("DOT", "polkadot"),
        ("LTC", "litecoin"),
    ])
});

pub fn coin_id(asset: &Asset) -> String {
    if let Some(id) = &asset.price_id {
        return id.clone();
    }
    COIN_IDS
        .get(asset.ticker.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| asset.ticker.to_lowercase())
}

impl CoinGecko {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: "https://api.coingecko.com/api/v3".to_string(),
        })
    }
}

impl PriceFeed for CoinGecko {
    fn unit_price(&self, asset: &Asset, currency: &str) -> Result<Decimal, FinError> {
        let id = coin_id(asset);
        let vs = currency.to_lowercase();
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.base_url, id, vs
        );
        let fail = |reason: String| FinError::PriceLookup {
            ticker: asset.ticker.clone(),
            reason,
        };
        let resp = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| fail(e.to_string()))?;
        let body: HashMap<String, HashMap<String, f64>> =
            resp.json().map_err(|e| fail(e.to_string()))?;
        let px = body
            .get(&id)
            .and_then(|m| m.get(&vs))
            .copied()
            .ok_or_else(|| fail(format!("no {} quote for '{}'", vs, id)))?;
        Decimal::from_f64_retain(px).ok_or_else(|| fail(format!("unrepresentable price {}", px)))
    }
}

// Placeholder quotes for common non-crypto tickers; not market data.
static REFERENCE_PRICES: Lazy<HashMap<&'static str, Decimal>> = Lazy::new(|| {
    HashMap::from([
        ("PETR4", Decimal::new(3850, 2)),
        ("VALE3", Decimal::new(6210, 2)),
        ("ITUB4", Decimal::new(3320, 2)),
        ("BBAS3", Decimal::new(2750, 2)),
        ("WEGE3", Decimal::new(4100, 2)),
        ("BOVA11", Decimal::new(12500, 2)),
        ("MXRF11", Decimal::new(1045, 2)),
        ("HGLG11", Decimal::new(16000, 2)),
        ("KNRI11", Decimal::new(14000, 2)),
        ("XPML11", Decimal::new(11000, 2)),
        ("AAPL", Decimal::new(19000, 2)),
        ("MSFT", Decimal::new(41500, 2)),
    ])
});

pub fn reference_price(ticker: &str) -> Option<Decimal> {
    REFERENCE_PRICES.get(ticker).copied()
}

/// Resolve the unit price for an asset. A failed live lookup is reported
/// as `Stale` and falls back to the last stored price when there is one.
pub fn resolve_quote(
    conn: &Connection,
    asset: &Asset,
    feed: Option<&dyn PriceFeed>,
    currency: &str,
) -> Result<Quote> {
    let stored = latest_price(conn, asset.id)?;
    if asset.r#type == AssetType::Crypto {
        if let Some(feed) = feed {
            match feed.unit_price(asset, currency) {
                Ok(px) => {
                    store_price(conn, asset.id, &Utc::now().to_rfc3339(), px, "coingecko")?;
                    return Ok(Quote {
                        price: Some(px),
                        status: PriceStatus::Live,
                    });
                }
                Err(err) => {
                    log::warn!("{}; using last known value", err);
                    return Ok(Quote {
                        price: stored,
                        status: PriceStatus::Stale,
                    });
                }
            }
        }
    }
    if let Some(px) = stored {
        return Ok(Quote {
            price: Some(px),
            status: PriceStatus::Stored,
        });
    }
    match asset.r#type {
        AssetType::Fixed => Ok(Quote {
            price: None,
            status: PriceStatus::CostBasis,
        }),
        AssetType::Stock | AssetType::Fii => match reference_price(&asset.ticker) {
            Some(px) => Ok(Quote {
                price: Some(px),
                status: PriceStatus::Reference,
            }),
            None => {
                log::warn!("no price source for {}; valuing at cost", asset.ticker);
                Ok(Quote {
                    price: None,
                    status: PriceStatus::Stale,
                })
            }
        },
        AssetType::Crypto => {
            log::warn!("no stored price for {}; run with --live", asset.ticker);
            Ok(Quote {
                price: None,
                status: PriceStatus::Stale,
            })
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Valuation {
    pub ticker: String,
    pub r#type: AssetType,
    pub quantity: Decimal,
    pub invested_amount: Decimal,
    pub unit_price: Option<Decimal>,
    pub market_value: Decimal,
    pub profit: Decimal,
    pub yield_percent: Decimal,
    pub status: PriceStatus,
}

/// (market − invested) / invested × 100, or 0 with nothing invested or
/// when the ratio is not representable.
pub fn yield_percent(market_value: Decimal, invested: Decimal) -> Decimal {
    if invested.is_zero() {
        return Decimal::ZERO;
    }
    market_value
        .checked_sub(invested)
        .and_then(|p| p.checked_div(invested))
        .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or_else(|| {
            log::warn!("yield of {} over {} is out of range", market_value, invested);
            Decimal::ZERO
        })
}

pub fn valuate(asset: &Asset, quote: &Quote) -> Valuation {
    let priced = quote.price.and_then(|px| px.checked_mul(asset.quantity));
    let (market_value, unit_price, status) = match (priced, quote.price) {
        (Some(v), _) => (v, quote.price, quote.status),
        (None, None) => (asset.invested_amount, None, quote.status),
        (None, Some(px)) => {
            log::warn!(
                "{} x {} is out of range; valuing {} at cost",
                px,
                asset.quantity,
                asset.ticker
            );
            (asset.invested_amount, None, PriceStatus::Stale)
        }
    };
    Valuation {
        ticker: asset.ticker.clone(),
        r#type: asset.r#type,
        quantity: asset.quantity,
        invested_amount: asset.invested_amount,
        unit_price,
        market_value,
        profit: market_value - asset.invested_amount,
        yield_percent: yield_percent(market_value, asset.invested_amount).round_dp(2),
        status,
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PortfolioTotals {
    pub invested_amount: Decimal,
    pub market_value: Decimal,
    pub profit: Decimal,
    pub yield_percent: Decimal,
    pub stale_positions: usize,
}

pub fn portfolio_totals(vals: &[Valuation]) -> PortfolioTotals {
    let invested: Decimal = vals.iter().map(|v| v.invested_amount).sum();
    let market: Decimal = vals.iter().map(|v| v.market_value).sum();
    PortfolioTotals {
        invested_amount: invested,
        market_value: market,
        profit: market - invested,
        yield_percent: yield_percent(market, invested).round_dp(2),
        stale_positions: vals
            .iter()
            .filter(|v| v.status == PriceStatus::Stale)
            .count(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReport {
    pub currency: String,
    pub positions: Vec<Valuation>,
    pub totals: PortfolioTotals,
}

pub fn value_portfolio(
    conn: &Connection,
    feed: Option<&dyn PriceFeed>,
    currency: &str,
) -> Result<PortfolioReport> {
    let positions = load_assets(conn)?
        .iter()
        .filter(|a| !a.quantity.is_zero() || !a.invested_amount.is_zero())
        .map(|a| resolve_quote(conn, a, feed, currency).map(|q| valuate(a, &q)))
        .collect::<Result<Vec<_>>>()?;
    let totals = portfolio_totals(&positions);
    log::debug!(
        "valued {} position(s), {} stale",
        positions.len(),
        totals.stale_positions
    );
    Ok(PortfolioReport {
        currency: currency.to_string(),
        positions,
        totals,
    })
}

fn value(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let prefs = Preferences::load(conn)?;
    let live = if flag(sub, "live") {
        Some(CoinGecko::new()?)
    } else {
        None
    };
    let report = value_portfolio(
        conn,
        live.as_ref().map(|f| f as &dyn PriceFeed),
        &prefs.base_currency,
    )?;
    if maybe_print_json(flag(sub, "json"), false, &report)? {
        return Ok(());
    }
    let mut rows: Vec<Vec<String>> = report
        .positions
        .iter()
        .map(|v| {
            vec![
                v.ticker.clone(),
                v.r#type.to_string(),
                format!("{:.4}", v.quantity),
                v.unit_price
                    .map(|p| prefs.money(&p))
                    .unwrap_or_else(|| "-".into()),
                prefs.money(&v.invested_amount),
                prefs.money(&v.market_value),
                prefs.percent(&v.yield_percent),
                v.status.label().to_string(),
            ]
        })
        .collect();
    let t = &report.totals;
    rows.push(vec![
        "Total".into(),
        String::new(),
        String::new(),
        String::new(),
        prefs.money(&t.invested_amount),
        prefs.money(&t.market_value),
        prefs.percent(&t.yield_percent),
        if t.stale_positions > 0 {
            format!("{} stale", t.stale_positions)
        } else {
            String::new()
        },
    ]);
    println!(
        "{}",
        pretty_table(
            &["Ticker", "Type", "Qty", "Price", "Invested", "Value", "Yield", "Source"],
            rows
        )
    );
    Ok(())
}
