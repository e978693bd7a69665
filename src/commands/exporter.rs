// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::required;
use anyhow::{Result, anyhow};
use rusqlite::Connection;
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => export_transactions(conn, sub),
        _ => Ok(()),
    }
}

type ExportRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    bool,
);

fn export_transactions(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = required(sub, "format")?.to_lowercase();
    let out = required(sub, "out")?;
    if fmt != "csv" && fmt != "json" {
        return Err(anyhow!("Unknown format: {} (use csv|json)", fmt));
    }

    let mut stmt = conn.prepare(
        "SELECT t.date, t.description, t.type, t.amount, c.name AS category, k.name AS card,
                t.installment_number, t.installment_total, t.is_paid
         FROM transactions t
         LEFT JOIN categories c ON t.category_id=c.id
         LEFT JOIN credit_cards k ON t.credit_card_id=k.id
         ORDER BY t.date, t.id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, Option<String>>(4)?,
            r.get::<_, Option<String>>(5)?,
            r.get::<_, Option<i64>>(6)?,
            r.get::<_, Option<i64>>(7)?,
            r.get::<_, bool>(8)?,
        ))
    })?;
    let rows: Vec<ExportRow> = rows.collect::<rusqlite::Result<_>>()?;

    if fmt == "csv" {
        let mut wtr = csv::Writer::from_path(out)?;
        wtr.write_record([
            "date",
            "description",
            "type",
            "amount",
            "category",
            "card",
            "installment_number",
            "installment_total",
            "is_paid",
        ])?;
        for (d, desc, typ, amt, cat, card, num, total, paid) in rows {
            wtr.write_record([
                d,
                desc,
                typ,
                amt,
                cat.unwrap_or_default(),
                card.unwrap_or_default(),
                num.map(|n| n.to_string()).unwrap_or_default(),
                total.map(|n| n.to_string()).unwrap_or_default(),
                paid.to_string(),
            ])?;
        }
        wtr.flush()?;
    } else {
        let items: Vec<_> = rows
            .into_iter()
            .map(|(d, desc, typ, amt, cat, card, num, total, paid)| {
                json!({
                    "date": d, "description": desc, "type": typ, "amount": amt,
                    "category": cat, "card": card,
                    "installment_number": num, "installment_total": total, "is_paid": paid
                })
            })
            .collect();
        std::fs::write(out, serde_json::to_string_pretty(&items)?)?;
    }
    log::info!("exported transactions as {} to {}", fmt, out);
    println!("Exported transactions to {}", out);
    Ok(())
}
