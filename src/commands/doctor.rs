// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::cards::all_invoice_statuses;
use crate::commands::goals::{goal_progress, load_goals};
use crate::commands::portfolio::{latest_price, load_assets, reference_price};
use crate::models::AssetType;
use crate::settings::Preferences;
use crate::utils::{local_date, pretty_table};
use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use rust_decimal::Decimal;

/// Collect (issue, detail) pairs describing inconsistent or degraded data.
pub fn diagnose(conn: &Connection, prefs: &Preferences) -> Result<Vec<(String, String)>> {
    let mut issues = Vec::new();
    let today = Utc::now().with_timezone(&prefs.utc_offset).date_naive();

    // dates that no report can bucket
    let mut stmt = conn.prepare("SELECT id, date FROM transactions ORDER BY id")?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let id: i64 = r.get(0)?;
        let date: String = r.get(1)?;
        if local_date(&date, &prefs.utc_offset).is_err() {
            issues.push(("bad_date".into(), format!("transaction {} '{}'", id, date)));
        }
    }
    if !issues.is_empty() {
        // invoice and goal checks need parseable rows
        return Ok(issues);
    }

    for s in all_invoice_statuses(conn, today)? {
        if s.available_limit < Decimal::ZERO {
            issues.push((
                "card_over_limit".into(),
                format!("{} invoice {} > limit {}", s.card, s.current_invoice, s.limit_amount),
            ));
        }
    }

    for g in load_goals(conn)? {
        if goal_progress(&g, today).overdue {
            issues.push(("goal_overdue".into(), g.name));
        }
    }

    for a in load_assets(conn)? {
        let has_source = match a.r#type {
            AssetType::Fixed => true,
            // without a cached quote crypto is only priced with --live
            AssetType::Crypto => latest_price(conn, a.id)?.is_some(),
            AssetType::Stock | AssetType::Fii => {
                reference_price(&a.ticker).is_some() || latest_price(conn, a.id)?.is_some()
            }
        };
        if !has_source {
            issues.push(("no_price_source".into(), a.ticker));
        }
    }
    Ok(issues)
}

pub fn handle(conn: &Connection) -> Result<()> {
    let prefs = Preferences::load(conn)?;
    let rows: Vec<Vec<String>> = diagnose(conn, &prefs)?
        .into_iter()
        .map(|(issue, detail)| vec![issue, detail])
        .collect();
    if rows.is_empty() {
        println!("✅ doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
