// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::categories::load_categories;
use crate::commands::reports::BalanceMode;
use crate::commands::transactions::{TxFilter, load_transactions};
use crate::models::{Category, Transaction, TxType};
use crate::settings::Preferences;
use crate::utils::{
    flag, id_for_category, local_date, maybe_print_json, optional, parse_decimal, parse_month,
    parse_year, pretty_table, required, stored_decimal,
};
use anyhow::{Context, Result};
use chrono::{Datelike, FixedOffset};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

pub const UNCATEGORIZED: &str = "(uncategorized)";

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => set(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("plan", sub)) => plan(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn set(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let cat = required(sub, "category")?;
    let amount = parse_decimal(required(sub, "amount")?)?;
    let cat_id = id_for_category(conn, cat)?;
    match optional(sub, "month") {
        Some(raw) => {
            let (y, m) = parse_month(raw)?;
            let month = format!("{}-{:02}", y, m);
            conn.execute(
                "INSERT INTO budgets(month, category_id, amount) VALUES (?1,?2,?3)
                 ON CONFLICT(month, category_id) DO UPDATE SET amount=excluded.amount",
                params![month, cat_id, amount.to_string()],
            )?;
            println!("Budget set for {} / {} = {}", month, cat, amount);
        }
        None => {
            conn.execute(
                "UPDATE categories SET budget=?1 WHERE id=?2",
                params![amount.to_string(), cat_id],
            )?;
            println!("Monthly budget for {} = {}", cat, amount);
        }
    }
    log::info!("budget for '{}' updated", cat);
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let prefs = Preferences::load(conn)?;
    let mut sql = String::from(
        "SELECT b.month, c.name, b.amount FROM budgets b JOIN categories c ON b.category_id=c.id",
    );
    let month = match optional(sub, "month") {
        Some(raw) => {
            let (y, m) = parse_month(raw)?;
            Some(format!("{}-{:02}", y, m))
        }
        None => None,
    };
    if month.is_some() {
        sql.push_str(" WHERE b.month=?1 ORDER BY c.name");
    } else {
        sql.push_str(" ORDER BY b.month DESC, c.name");
    }
    let mut stmt = conn.prepare(&sql)?;
    let mut cur = match &month {
        Some(m) => stmt.query(params![m])?,
        None => stmt.query([])?,
    };
    let mut data = Vec::new();
    while let Some(r) = cur.next()? {
        let amount: String = r.get(2)?;
        data.push(vec![
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            prefs.money(&stored_decimal(&amount, "budget amount")?),
        ]);
    }
    println!("{}", pretty_table(&["Month", "Category", "Budget"], data));
    Ok(())
}

/// Month overrides keyed by (category id, month index 0..12).
pub fn load_overrides(conn: &Connection, year: i32) -> Result<HashMap<(i64, usize), Decimal>> {
    let mut stmt = conn.prepare(
        "SELECT category_id, month, amount FROM budgets WHERE substr(month,1,4)=?1",
    )?;
    let rows = stmt.query_map(params![format!("{:04}", year)], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
        ))
    })?;
    let mut out = HashMap::new();
    for row in rows {
        let (cat, month, amount) = row?;
        let (_, m) = parse_month(&month).with_context(|| format!("Invalid budget month '{}'", month))?;
        out.insert((cat, (m - 1) as usize), stored_decimal(&amount, "budget amount")?);
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PlanCell {
    pub planned: Decimal,
    pub realized: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanRow {
    pub category: String,
    pub r#type: TxType,
    pub months: [PlanCell; 12],
    pub planned_total: Decimal,
    pub realized_total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanFooter {
    pub month: String,
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetPlan {
    pub year: i32,
    pub rows: Vec<PlanRow>,
    pub footer: Vec<PlanFooter>,
}

/// Planned vs realized per category and month. Rows whose planned and
/// realized totals are both zero are left out.
pub fn planning_grid(
    categories: &[Category],
    overrides: &HashMap<(i64, usize), Decimal>,
    txs: &[Transaction],
    year: i32,
    offset: &FixedOffset,
) -> Result<BudgetPlan> {
    // categorized rows are keyed by id; untagged ones by type so incomes and
    // expenses never share a row
    let mut realized: HashMap<(Option<i64>, Option<TxType>), [Decimal; 12]> = HashMap::new();
    let mut footer = [(Decimal::ZERO, Decimal::ZERO); 12];
    for t in txs {
        let d = local_date(&t.date, offset)
            .with_context(|| format!("Transaction {} has an unusable date", t.id))?;
        if d.year() != year {
            continue;
        }
        let idx = d.month0() as usize;
        // transactions pointing at a deleted category count as uncategorized
        let key = match t
            .category_id
            .filter(|id| categories.iter().any(|c| c.id == *id))
        {
            Some(id) => (Some(id), None),
            None => (None, Some(t.r#type)),
        };
        realized.entry(key).or_insert([Decimal::ZERO; 12])[idx] += t.amount;
        match t.r#type {
            TxType::Income => footer[idx].0 += t.amount,
            TxType::Expense => footer[idx].1 += t.amount,
        }
    }

    let mut rows = Vec::new();
    for c in categories {
        let real = realized.get(&(Some(c.id), None)).copied().unwrap_or([Decimal::ZERO; 12]);
        let mut months = [PlanCell::default(); 12];
        for (i, cell) in months.iter_mut().enumerate() {
            cell.planned = overrides.get(&(c.id, i)).copied().unwrap_or(c.budget);
            cell.realized = real[i];
        }
        rows.push(plan_row(c.name.clone(), c.r#type, months));
    }
    for typ in [TxType::Income, TxType::Expense] {
        if let Some(real) = realized.get(&(None, Some(typ))) {
            let mut months = [PlanCell::default(); 12];
            for (cell, r) in months.iter_mut().zip(real.iter()) {
                cell.realized = *r;
            }
            rows.push(plan_row(UNCATEGORIZED.to_string(), typ, months));
        }
    }
    rows.retain(|r| !(r.planned_total.is_zero() && r.realized_total.is_zero()));

    let footer = footer
        .iter()
        .enumerate()
        .map(|(i, (income, expense))| PlanFooter {
            month: format!("{}-{:02}", year, i + 1),
            income: *income,
            expense: *expense,
            balance: BalanceMode::FloorAtZero.apply(*income, *expense),
        })
        .collect();
    Ok(BudgetPlan { year, rows, footer })
}

fn plan_row(category: String, r#type: TxType, months: [PlanCell; 12]) -> PlanRow {
    PlanRow {
        planned_total: months.iter().map(|c| c.planned).sum(),
        realized_total: months.iter().map(|c| c.realized).sum(),
        category,
        r#type,
        months,
    }
}

fn plan(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let prefs = Preferences::load(conn)?;
    let year = parse_year(required(sub, "year")?)?;
    let categories = load_categories(conn)?;
    let overrides = load_overrides(conn, year)?;
    let txs = load_transactions(conn, &TxFilter::default())?;
    let grid = planning_grid(&categories, &overrides, &txs, year, &prefs.utc_offset)?;
    if maybe_print_json(flag(sub, "json"), false, &grid)? {
        return Ok(());
    }

    let mut headers = vec!["Category".to_string()];
    headers.extend((1..=12).map(|m| format!("{:02}", m)));
    headers.push("Total".into());
    let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();

    let cell = |c: &PlanCell| format!("{} / {}", prefs.money(&c.planned), prefs.money(&c.realized));
    let mut rows: Vec<Vec<String>> = grid
        .rows
        .iter()
        .map(|r| {
            let label = if r.category == UNCATEGORIZED {
                format!("{} {}", r.category, r.r#type.as_str().to_lowercase())
            } else {
                r.category.clone()
            };
            let mut row = vec![label];
            row.extend(r.months.iter().map(cell));
            row.push(cell(&PlanCell {
                planned: r.planned_total,
                realized: r.realized_total,
            }));
            row
        })
        .collect();
    let mut balance_row = vec!["Balance".to_string()];
    balance_row.extend(grid.footer.iter().map(|f| prefs.money(&f.balance)));
    balance_row.push(String::new());
    rows.push(balance_row);

    println!("Planned / realized for {}", year);
    println!("{}", pretty_table(&header_refs, rows));
    Ok(())
}
