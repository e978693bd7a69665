// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Credit cards: invoice computation, billing cycles and settlement.

use crate::commands::transactions::{TxFilter, load_transactions};
use crate::error::FinError;
use crate::models::{CreditCard, Transaction, TxType};
use crate::settings::Preferences;
use crate::utils::{
    clamp_day, flag, id_for_card, local_date, maybe_print_json, optional, parse_date,
    parse_decimal, pretty_table, required, shift_month, stored_decimal,
};
use anyhow::{Context, Result};
use chrono::{Datelike, FixedOffset, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => {
            let name = required(sub, "name")?;
            let id = id_for_card(conn, name)?;
            conn.execute("DELETE FROM credit_cards WHERE id=?1", params![id])?;
            println!("Removed card '{}'", name);
        }
        Some(("invoice", sub)) => invoice(conn, sub)?,
        Some(("pay", sub)) => pay(conn, sub)?,
        Some(("payments", sub)) => payments(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let name = required(sub, "name")?;
    let limit = parse_decimal(required(sub, "limit")?)?;
    if limit < Decimal::ZERO {
        return Err(FinError::InvalidInput(format!("limit must not be negative, got {}", limit)).into());
    }
    let closing_day = sub.get_one::<u32>("closing_day").copied().unwrap_or(1);
    let due_day = sub.get_one::<u32>("due_day").copied().unwrap_or(10);
    let color = optional(sub, "color");
    conn.execute(
        "INSERT INTO credit_cards(name, limit_amount, closing_day, due_day, color)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, limit.to_string(), closing_day, due_day, color],
    )?;
    log::info!("card '{}' added", name);
    println!(
        "Added card '{}' (limit {}, closes on {}, due on {})",
        name, limit, closing_day, due_day
    );
    Ok(())
}

pub fn load_cards(conn: &Connection) -> Result<Vec<CreditCard>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, limit_amount, closing_day, due_day, color FROM credit_cards ORDER BY name",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, u32>(3)?,
            r.get::<_, u32>(4)?,
            r.get::<_, Option<String>>(5)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, name, limit, closing_day, due_day, color) = row?;
        out.push(CreditCard {
            limit_amount: stored_decimal(&limit, &format!("limit of card {}", name))?,
            id,
            name,
            closing_day,
            due_day,
            color,
        });
    }
    Ok(out)
}

pub fn load_card(conn: &Connection, name: &str) -> Result<CreditCard> {
    let id = id_for_card(conn, name)?;
    load_cards(conn)?
        .into_iter()
        .find(|c| c.id == id)
        .ok_or_else(|| {
            FinError::NotFound {
                kind: "Card",
                name: name.to_string(),
            }
            .into()
        })
}

/// Sum of unpaid expenses. Paid rows and incomes (refunds) do not count.
pub fn current_invoice<'a, I>(txs: I) -> Decimal
where
    I: IntoIterator<Item = &'a Transaction>,
{
    txs.into_iter()
        .filter(|t| t.r#type == TxType::Expense && !t.is_paid)
        .map(|t| t.amount)
        .sum()
}

/// Invoice as a percentage of the limit, unclamped. `None` for a zero limit
/// or when the ratio is not representable.
pub fn usage_ratio(invoice: Decimal, limit: Decimal) -> Option<Decimal> {
    if limit.is_zero() {
        return None;
    }
    invoice.checked_div(limit)?.checked_mul(HUNDRED)
}

/// Usage percentage as displayed: always within [0, 100].
pub fn display_usage(invoice: Decimal, limit: Decimal) -> Decimal {
    match usage_ratio(invoice, limit) {
        Some(raw) => raw.clamp(Decimal::ZERO, HUNDRED),
        None if invoice > Decimal::ZERO => HUNDRED,
        None => Decimal::ZERO,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BillingCycle {
    pub closing: NaiveDate,
    pub due: NaiveDate,
}

/// Next closing date on or after `today` and the due date that follows it.
pub fn billing_cycle(closing_day: u32, due_day: u32, today: NaiveDate) -> Result<BillingCycle> {
    let this_close = clamp_day(today.year(), today.month(), closing_day)?;
    let closing = if today <= this_close {
        this_close
    } else {
        let (y, m) = shift_month(today.year(), today.month(), 1)?;
        clamp_day(y, m, closing_day)?
    };
    let (dy, dm) = if due_day > closing_day {
        (closing.year(), closing.month())
    } else {
        shift_month(closing.year(), closing.month(), 1)?
    };
    Ok(BillingCycle {
        closing,
        due: clamp_day(dy, dm, due_day)?,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceStatus {
    pub card: String,
    pub color: Option<String>,
    pub limit_amount: Decimal,
    pub current_invoice: Decimal,
    pub usage_ratio: Option<Decimal>,
    pub usage_percent: Decimal,
    pub available_limit: Decimal,
    pub unpaid_transactions: usize,
    pub cycle: BillingCycle,
}

pub fn invoice_status(
    card: &CreditCard,
    txs: &[Transaction],
    today: NaiveDate,
) -> Result<InvoiceStatus> {
    let own: Vec<&Transaction> = txs
        .iter()
        .filter(|t| t.credit_card_id == Some(card.id))
        .collect();
    let invoice = current_invoice(own.iter().copied());
    let unpaid = own
        .iter()
        .filter(|t| t.r#type == TxType::Expense && !t.is_paid)
        .count();
    Ok(InvoiceStatus {
        card: card.name.clone(),
        color: card.color.clone(),
        limit_amount: card.limit_amount,
        current_invoice: invoice,
        usage_ratio: usage_ratio(invoice, card.limit_amount).map(|r| r.round_dp(2)),
        usage_percent: display_usage(invoice, card.limit_amount).round_dp(2),
        available_limit: card.limit_amount - invoice,
        unpaid_transactions: unpaid,
        cycle: billing_cycle(card.closing_day, card.due_day, today)?,
    })
}

pub fn all_invoice_statuses(conn: &Connection, today: NaiveDate) -> Result<Vec<InvoiceStatus>> {
    let cards = load_cards(conn)?;
    let txs = load_transactions(
        conn,
        &TxFilter {
            r#type: Some(TxType::Expense),
            unpaid_only: true,
            ..TxFilter::default()
        },
    )?;
    cards
        .iter()
        .map(|c| invoice_status(c, &txs, today))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub success: bool,
    pub message: String,
    pub card: String,
    pub paid_on: NaiveDate,
    pub amount: Decimal,
    pub transactions: usize,
}

/// Mark every unpaid expense of the card dated on or before `paid_on` as
/// paid and record the payment. Either every affected row is updated and
/// the payment recorded, or nothing changes.
pub fn settle_invoice(
    conn: &mut Connection,
    card_id: i64,
    paid_on: NaiveDate,
    offset: &FixedOffset,
) -> Result<Settlement> {
    let tx = conn.transaction()?;
    let card: String = tx
        .query_row(
            "SELECT name FROM credit_cards WHERE id=?1",
            params![card_id],
            |r| r.get(0),
        )
        .optional()?
        .ok_or_else(|| FinError::NotFound {
            kind: "Card",
            name: card_id.to_string(),
        })?;

    let mut due = Vec::new();
    {
        let mut stmt = tx.prepare(
            "SELECT id, date, amount FROM transactions
             WHERE credit_card_id=?1 AND type='EXPENSE' AND is_paid=0
             ORDER BY date, id",
        )?;
        let rows = stmt.query_map(params![card_id], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (id, date, amount) = row?;
            if local_date(&date, offset)? <= paid_on {
                due.push((id, stored_decimal(&amount, &format!("amount of transaction {}", id))?));
            }
        }
    }

    if due.is_empty() {
        // dropping `tx` rolls back
        return Err(FinError::NothingToSettle(card).into());
    }

    let amount: Decimal = due.iter().map(|(_, a)| *a).sum();
    {
        let mut mark = tx.prepare_cached("UPDATE transactions SET is_paid=1 WHERE id=?1 AND is_paid=0")?;
        for (id, _) in &due {
            let n = mark.execute(params![id])?;
            if n != 1 {
                return Err(anyhow::anyhow!("Transaction {} changed during settlement", id));
            }
        }
    }
    tx.execute(
        "INSERT INTO invoice_payments(card_id, paid_on, amount, transactions) VALUES (?1, ?2, ?3, ?4)",
        params![card_id, paid_on.to_string(), amount.to_string(), due.len() as i64],
    )?;
    tx.commit().context("Commit invoice settlement")?;

    log::info!(
        "settled {} transaction(s) totalling {} on card '{}'",
        due.len(),
        amount,
        card
    );
    Ok(Settlement {
        success: true,
        message: format!("Paid {} across {} transaction(s)", amount.round_dp(2), due.len()),
        card,
        paid_on,
        amount,
        transactions: due.len(),
    })
}

fn today_local(prefs: &Preferences) -> NaiveDate {
    Utc::now().with_timezone(&prefs.utc_offset).date_naive()
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let prefs = Preferences::load(conn)?;
    let statuses = all_invoice_statuses(conn, today_local(&prefs))?;
    if !maybe_print_json(flag(sub, "json"), false, &statuses)? {
        let rows = statuses.iter().map(|s| status_row(s, &prefs)).collect();
        println!(
            "{}",
            pretty_table(
                &["Card", "Limit", "Invoice", "Usage", "Available", "Closes", "Due"],
                rows
            )
        );
    }
    Ok(())
}

fn status_row(s: &InvoiceStatus, prefs: &Preferences) -> Vec<String> {
    vec![
        s.card.clone(),
        prefs.money(&s.limit_amount),
        prefs.money(&s.current_invoice),
        prefs.percent(&s.usage_percent),
        prefs.money(&s.available_limit),
        s.cycle.closing.to_string(),
        s.cycle.due.to_string(),
    ]
}

fn invoice(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let prefs = Preferences::load(conn)?;
    let card = load_card(conn, required(sub, "name")?)?;
    let txs = load_transactions(
        conn,
        &TxFilter {
            credit_card_id: Some(card.id),
            r#type: Some(TxType::Expense),
            unpaid_only: true,
            ..TxFilter::default()
        },
    )?;
    let status = invoice_status(&card, &txs, today_local(&prefs))?;
    if maybe_print_json(flag(sub, "json"), false, &status)? {
        return Ok(());
    }
    println!(
        "{}",
        pretty_table(
            &["Card", "Limit", "Invoice", "Usage", "Available", "Closes", "Due"],
            vec![status_row(&status, &prefs)]
        )
    );
    if let Some(raw) = status.usage_ratio.filter(|r| *r > HUNDRED) {
        println!("Over limit: {} of the limit in use", prefs.percent(&raw));
    }
    let rows = txs
        .iter()
        .map(|t| {
            vec![
                t.date.clone(),
                t.description.clone(),
                match (t.installment_number, t.installment_total) {
                    (Some(n), Some(tot)) => format!("{}/{}", n, tot),
                    _ => String::new(),
                },
                prefs.money(&t.amount),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Date", "Description", "Inst.", "Amount"], rows)
    );
    Ok(())
}

fn pay(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let prefs = Preferences::load(conn)?;
    let card_id = id_for_card(conn, required(sub, "name")?)?;
    let paid_on = match optional(sub, "date") {
        Some(d) => parse_date(d)?,
        None => today_local(&prefs),
    };
    let settlement = settle_invoice(conn, card_id, paid_on, &prefs.utc_offset)?;
    if !maybe_print_json(flag(sub, "json"), false, &settlement)? {
        println!("{} ({} on {})", settlement.message, settlement.card, settlement.paid_on);
    }
    Ok(())
}

fn payments(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let prefs = Preferences::load(conn)?;
    let mut sql = String::from(
        "SELECT k.name, p.paid_on, p.amount, p.transactions
         FROM invoice_payments p JOIN credit_cards k ON p.card_id=k.id",
    );
    let card = optional(sub, "name");
    if card.is_some() {
        sql.push_str(" WHERE k.name=?1");
    }
    sql.push_str(" ORDER BY p.paid_on DESC, p.id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let mut cur = match card {
        Some(c) => stmt.query(params![c])?,
        None => stmt.query([])?,
    };
    let mut rows = Vec::new();
    while let Some(r) = cur.next()? {
        let amount: String = r.get(2)?;
        rows.push(vec![
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            prefs.money(&stored_decimal(&amount, "payment amount")?),
            r.get::<_, i64>(3)?.to_string(),
        ]);
    }
    println!(
        "{}",
        pretty_table(&["Card", "Paid On", "Amount", "Transactions"], rows)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn cycle_closes_this_month_when_before_closing_day() {
        let c = billing_cycle(25, 5, d(2024, 3, 10)).unwrap();
        assert_eq!(c.closing, d(2024, 3, 25));
        assert_eq!(c.due, d(2024, 4, 5));
    }

    #[test]
    fn cycle_rolls_over_after_closing_day() {
        let c = billing_cycle(3, 10, d(2024, 12, 4)).unwrap();
        assert_eq!(c.closing, d(2025, 1, 3));
        assert_eq!(c.due, d(2025, 1, 10));
    }

    #[test]
    fn cycle_clamps_short_months() {
        let c = billing_cycle(31, 31, d(2024, 2, 1)).unwrap();
        assert_eq!(c.closing, d(2024, 2, 29));
        assert_eq!(c.due, d(2024, 3, 31));
    }

    #[test]
    fn zero_limit_has_no_ratio() {
        assert_eq!(usage_ratio(Decimal::TEN, Decimal::ZERO), None);
        assert_eq!(display_usage(Decimal::TEN, Decimal::ZERO), HUNDRED);
        assert_eq!(display_usage(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
    }
}
