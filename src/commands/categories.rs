// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::FinError;
use crate::models::{Category, TxType};
use crate::settings::Preferences;
use crate::utils::{optional, parse_decimal, pretty_table, required, stored_decimal};
use anyhow::Result;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = required(sub, "name")?;
            let typ: TxType = required(sub, "type")?.parse()?;
            let budget = match optional(sub, "budget") {
                Some(raw) => parse_decimal(raw)?,
                None => Decimal::ZERO,
            };
            conn.execute(
                "INSERT INTO categories(name, type, budget) VALUES (?1, ?2, ?3)",
                params![name, typ.as_str(), budget.to_string()],
            )?;
            log::info!("category '{}' added", name);
            println!("Added category '{}' ({}, budget {})", name, typ, budget);
        }
        Some(("list", _)) => {
            let prefs = Preferences::load(conn)?;
            let data = load_categories(conn)?
                .into_iter()
                .map(|c| vec![c.name, c.r#type.to_string(), prefs.money(&c.budget)])
                .collect();
            println!(
                "{}",
                pretty_table(&["Category", "Type", "Monthly Budget"], data)
            );
        }
        Some(("rm", sub)) => {
            let name = required(sub, "name")?;
            let n = conn.execute("DELETE FROM categories WHERE name=?1", params![name])?;
            if n == 0 {
                return Err(FinError::NotFound {
                    kind: "Category",
                    name: name.to_string(),
                }
                .into());
            }
            println!("Removed category '{}'", name);
        }
        _ => {}
    }
    Ok(())
}

pub fn load_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name, type, budget FROM categories ORDER BY name")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, name, typ, budget) = row?;
        out.push(Category {
            r#type: typ.parse()?,
            budget: stored_decimal(&budget, "category budget")?,
            id,
            name,
        });
    }
    Ok(out)
}
