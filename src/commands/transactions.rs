// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::FinError;
use crate::models::{Transaction, TxType};
use crate::settings::Preferences;
use crate::utils::{
    flag, id_for_card, id_for_category, local_date, maybe_print_json, optional, parse_date,
    parse_decimal, parse_month, pretty_table, required, stored_decimal,
};
use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Months, NaiveDate};
use rusqlite::{Connection, params};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => {
            let id: i64 = required(sub, "id")?
                .parse()
                .context("Transaction id must be an integer")?;
            let n = conn.execute("DELETE FROM transactions WHERE id=?1", params![id])?;
            if n == 0 {
                return Err(FinError::NotFound {
                    kind: "Transaction",
                    name: id.to_string(),
                }
                .into());
            }
            println!("Removed transaction {}", id);
        }
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub r#type: TxType,
    pub category_id: Option<i64>,
    pub credit_card_id: Option<i64>,
    pub installments: u32,
    pub is_paid: bool,
}

/// Split `amount` into `n` shares of whole cents; the first share absorbs
/// the rounding remainder so the shares always sum to `amount`.
pub fn split_installments(amount: Decimal, n: u32) -> Vec<Decimal> {
    if n <= 1 {
        return vec![amount];
    }
    let share = (amount / Decimal::from(n)).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let first = amount - share * Decimal::from(n - 1);
    let mut out = Vec::with_capacity(n as usize);
    out.push(first);
    out.extend(std::iter::repeat_n(share, (n - 1) as usize));
    out
}

/// Insert a transaction, expanding installments into monthly rows.
/// All rows are written in one SQLite transaction.
pub fn insert_transaction(conn: &mut Connection, new: &NewTransaction) -> Result<Vec<i64>> {
    if new.amount <= Decimal::ZERO {
        return Err(FinError::InvalidInput(format!(
            "amount must be positive, got {}",
            new.amount
        ))
        .into());
    }
    if new.installments == 0 {
        return Err(FinError::InvalidInput("installments must be at least 1".into()).into());
    }
    if let Some(cat) = new.category_id {
        let cat_type: String = conn.query_row(
            "SELECT type FROM categories WHERE id=?1",
            params![cat],
            |r| r.get(0),
        )?;
        let cat_type: TxType = cat_type.parse()?;
        if cat_type != new.r#type {
            return Err(FinError::InvalidInput(format!(
                "category is {} but transaction is {}",
                cat_type, new.r#type
            ))
            .into());
        }
    }

    let shares = split_installments(new.amount, new.installments);
    if shares.iter().any(|s| *s <= Decimal::ZERO) {
        return Err(FinError::InvalidInput(format!(
            "amount {} is too small for {} installments",
            new.amount, new.installments
        ))
        .into());
    }
    let numbered = new.installments > 1;
    let tx = conn.transaction()?;
    let mut ids = Vec::with_capacity(shares.len());
    {
        let mut insert = tx.prepare_cached(
            "INSERT INTO transactions(date, description, amount, type, category_id, credit_card_id,
                                      installment_number, installment_total, is_paid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for (i, share) in shares.iter().enumerate() {
            let date = new
                .date
                .checked_add_months(Months::new(i as u32))
                .ok_or_else(|| anyhow!("Installment {} date out of range", i + 1))?;
            let (number, total) = if numbered {
                (Some(i as u32 + 1), Some(new.installments))
            } else {
                (None, None)
            };
            insert.execute(params![
                date.to_string(),
                new.description,
                share.to_string(),
                new.r#type.as_str(),
                new.category_id,
                new.credit_card_id,
                number,
                total,
                new.is_paid,
            ])?;
            ids.push(tx.last_insert_rowid());
        }
    }
    tx.commit()?;
    log::info!(
        "recorded {} {} row(s) for '{}'",
        ids.len(),
        new.r#type,
        new.description
    );
    Ok(ids)
}

fn add(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = parse_date(required(sub, "date")?)?;
    let description = required(sub, "description")?.to_string();
    let amount = parse_decimal(required(sub, "amount")?)?;
    let typ: TxType = required(sub, "type")?.parse()?;
    let category_id = match optional(sub, "category") {
        Some(c) => Some(id_for_category(conn, c)?),
        None => None,
    };
    let credit_card_id = match optional(sub, "card") {
        Some(c) => Some(id_for_card(conn, c)?),
        None => None,
    };
    let installments = sub.get_one::<u32>("installments").copied().unwrap_or(1);
    let new = NewTransaction {
        date,
        description,
        amount,
        r#type: typ,
        category_id,
        credit_card_id,
        installments,
        is_paid: flag(sub, "paid"),
    };
    let ids = insert_transaction(conn, &new)?;
    if ids.len() > 1 {
        println!(
            "Recorded {} {} in {} installments from {} ('{}')",
            typ,
            amount,
            ids.len(),
            date,
            new.description
        );
    } else {
        println!(
            "Recorded {} {} on {} ('{}')",
            typ, amount, date, new.description
        );
    }
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let prefs = Preferences::load(conn)?;
    let data = query_rows(conn, sub, &prefs)?;
    if !maybe_print_json(flag(sub, "json"), flag(sub, "jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                let amount = match r.amount.parse::<Decimal>() {
                    Ok(d) => prefs.money(&d),
                    Err(_) => r.amount.clone(),
                };
                vec![
                    r.id.to_string(),
                    r.date.clone(),
                    r.description.clone(),
                    r.r#type.clone(),
                    amount,
                    r.category.clone(),
                    r.card.clone(),
                    r.installment.clone(),
                    if r.paid { "yes".into() } else { "no".into() },
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "ID",
                    "Date",
                    "Description",
                    "Type",
                    "Amount",
                    "Category",
                    "Card",
                    "Inst.",
                    "Paid"
                ],
                rows,
            )
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct TransactionRow {
    pub id: i64,
    pub date: String,
    pub description: String,
    pub r#type: String,
    pub amount: String,
    pub category: String,
    pub card: String,
    pub installment: String,
    pub paid: bool,
}

pub fn query_rows(
    conn: &Connection,
    sub: &clap::ArgMatches,
    prefs: &Preferences,
) -> Result<Vec<TransactionRow>> {
    let mut sql = String::from(
        "SELECT t.id, t.date, t.description, t.type, t.amount, c.name, k.name,
                t.installment_number, t.installment_total, t.is_paid
         FROM transactions t
         LEFT JOIN categories c ON t.category_id=c.id
         LEFT JOIN credit_cards k ON t.credit_card_id=k.id
         WHERE 1=1",
    );
    let mut params_vec: Vec<String> = Vec::new();

    if let Some(typ) = optional(sub, "type") {
        let typ: TxType = typ.parse()?;
        sql.push_str(" AND t.type=?");
        params_vec.push(typ.as_str().into());
    }
    if let Some(cat) = optional(sub, "category") {
        sql.push_str(" AND c.name=?");
        params_vec.push(cat.into());
    }
    if let Some(card) = optional(sub, "card") {
        sql.push_str(" AND k.name=?");
        params_vec.push(card.into());
    }
    if flag(sub, "unpaid") {
        sql.push_str(" AND t.is_paid=0");
    }
    sql.push_str(" ORDER BY t.date DESC, t.id DESC");

    // month filtering happens after the local-date shift
    let month = match optional(sub, "month") {
        Some(m) => Some(parse_month(m)?),
        None => None,
    };
    let limit = sub.get_one::<usize>("limit").copied();

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params_vec.iter()))?;

    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        let date: String = r.get(1)?;
        if let Some((y, mo)) = month {
            let d = local_date(&date, &prefs.utc_offset)?;
            if d.year() != y || d.month() != mo {
                continue;
            }
        }
        let number: Option<u32> = r.get(7)?;
        let total: Option<u32> = r.get(8)?;
        data.push(TransactionRow {
            id: r.get(0)?,
            date,
            description: r.get(2)?,
            r#type: r.get(3)?,
            amount: r.get(4)?,
            category: r.get::<_, Option<String>>(5)?.unwrap_or_default(),
            card: r.get::<_, Option<String>>(6)?.unwrap_or_default(),
            installment: match (number, total) {
                (Some(n), Some(t)) => format!("{}/{}", n, t),
                _ => String::new(),
            },
            paid: r.get(9)?,
        });
        if limit.is_some_and(|l| data.len() >= l) {
            break;
        }
    }
    Ok(data)
}

#[derive(Debug, Default, Clone)]
pub struct TxFilter {
    pub r#type: Option<TxType>,
    pub category_id: Option<i64>,
    pub credit_card_id: Option<i64>,
    pub unpaid_only: bool,
}

pub fn load_transactions(conn: &Connection, filter: &TxFilter) -> Result<Vec<Transaction>> {
    let mut sql = String::from(
        "SELECT id, date, description, amount, type, category_id, credit_card_id,
                installment_number, installment_total, is_paid
         FROM transactions WHERE 1=1",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    if let Some(t) = filter.r#type {
        sql.push_str(" AND type=?");
        args.push(Box::new(t.as_str()));
    }
    if let Some(c) = filter.category_id {
        sql.push_str(" AND category_id=?");
        args.push(Box::new(c));
    }
    if let Some(c) = filter.credit_card_id {
        sql.push_str(" AND credit_card_id=?");
        args.push(Box::new(c));
    }
    if filter.unpaid_only {
        sql.push_str(" AND is_paid=0");
    }
    sql.push_str(" ORDER BY date, id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, Option<i64>>(5)?,
            r.get::<_, Option<i64>>(6)?,
            r.get::<_, Option<u32>>(7)?,
            r.get::<_, Option<u32>>(8)?,
            r.get::<_, bool>(9)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, date, description, amount, typ, category_id, credit_card_id, num, total, paid) =
            row?;
        out.push(Transaction {
            amount: stored_decimal(&amount, &format!("amount of transaction {}", id))?,
            r#type: typ.parse()?,
            id,
            date,
            description,
            category_id,
            credit_card_id,
            installment_number: num,
            installment_total: total,
            is_paid: paid,
        });
    }
    log::debug!("loaded {} transaction(s)", out.len());
    Ok(out)
}
