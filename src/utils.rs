// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveDate};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

use crate::error::FinError;

const UA: &str = concat!(
    "finplan/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/alphavelocity/finplan)"
);

pub fn http_client() -> Result<reqwest::blocking::Client> {
    let c = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .user_agent(UA)
        .build()?;
    Ok(c)
}

/// Fetch a trimmed string argument clap has already been told is required.
pub fn required<'a>(sub: &'a clap::ArgMatches, name: &str) -> Result<&'a str> {
    sub.get_one::<String>(name)
        .map(|s| s.trim())
        .ok_or_else(|| anyhow!("Missing required argument --{}", name))
}

pub fn optional<'a>(sub: &'a clap::ArgMatches, name: &str) -> Option<&'a str> {
    sub.get_one::<String>(name)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_month(s: &str) -> Result<(i32, u32)> {
    let d = NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .with_context(|| format!("Invalid month '{}', expected YYYY-MM", s))?;
    Ok((d.year(), d.month()))
}

pub fn parse_year(s: &str) -> Result<i32> {
    let y: i32 = s
        .trim()
        .parse()
        .with_context(|| format!("Invalid year '{}', expected YYYY", s))?;
    if !(1900..=9999).contains(&y) {
        return Err(anyhow!("Invalid year '{}', expected YYYY", s));
    }
    Ok(y)
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

/// Parse a value stored as TEXT, naming the column in the error.
pub fn stored_decimal(s: &str, what: &str) -> Result<Decimal> {
    Decimal::from_str_exact(s.trim()).with_context(|| format!("Invalid stored {} '{}'", what, s))
}

/// Parse a UTC offset such as `-03:00`, `+0530`, `Z` or `UTC`.
pub fn parse_offset(s: &str) -> Result<FixedOffset> {
    let raw = s.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| anyhow!("Invalid offset '{}'", s));
    }
    let (sign, rest) = match raw.chars().next() {
        Some('+') => (1, &raw[1..]),
        Some('-') => (-1, &raw[1..]),
        _ => return Err(anyhow!("Invalid UTC offset '{}', expected +HH:MM", s)),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(anyhow!("Invalid UTC offset '{}', expected +HH:MM", s));
    }
    let hours: i32 = digits[..2].parse()?;
    let minutes: i32 = digits[2..].parse()?;
    if hours > 14 || minutes > 59 {
        return Err(anyhow!("UTC offset '{}' out of range", s));
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| anyhow!("UTC offset '{}' out of range", s))
}

/// Calendar date of a stored transaction date as seen in `offset`.
/// Plain dates are already local; timestamps are shifted first.
pub fn local_date(raw: &str, offset: &FixedOffset) -> Result<NaiveDate> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    let dt = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid transaction date '{}'", raw))?;
    Ok(dt.with_timezone(offset).date_naive())
}

pub fn month_end(year: i32, month: u32) -> Result<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| anyhow!("Invalid month {}-{:02}", year, month))?;
    let next = first
        .checked_add_months(Months::new(1))
        .ok_or_else(|| anyhow!("Month {}-{:02} out of range", year, month))?;
    next.pred_opt()
        .ok_or_else(|| anyhow!("Month {}-{:02} out of range", year, month))
}

pub fn shift_month(year: i32, month: u32, by: u32) -> Result<(i32, u32)> {
    let d = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.checked_add_months(Months::new(by)))
        .ok_or_else(|| anyhow!("Month {}-{:02} out of range", year, month))?;
    Ok((d.year(), d.month()))
}

/// `day` of the given month, clamped to the month's last day.
pub fn clamp_day(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    let last = month_end(year, month)?;
    let d = day.clamp(1, last.day());
    NaiveDate::from_ymd_opt(year, month, d)
        .ok_or_else(|| anyhow!("Invalid date {}-{:02}-{:02}", year, month, d))
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

fn id_for(conn: &Connection, sql: &str, kind: &'static str, name: &str) -> Result<i64> {
    let mut stmt = conn.prepare_cached(sql)?;
    let id: Option<i64> = stmt.query_row(params![name], |r| r.get(0)).optional()?;
    id.ok_or_else(|| {
        FinError::NotFound {
            kind,
            name: name.to_string(),
        }
        .into()
    })
}

pub fn id_for_category(conn: &Connection, name: &str) -> Result<i64> {
    id_for(conn, "SELECT id FROM categories WHERE name=?1", "Category", name)
}

pub fn id_for_card(conn: &Connection, name: &str) -> Result<i64> {
    id_for(conn, "SELECT id FROM credit_cards WHERE name=?1", "Card", name)
}

pub fn id_for_asset(conn: &Connection, ticker: &str) -> Result<i64> {
    id_for(conn, "SELECT id FROM assets WHERE ticker=?1", "Asset", ticker)
}

pub fn id_for_goal(conn: &Connection, name: &str) -> Result<i64> {
    id_for(conn, "SELECT id FROM goals WHERE name=?1", "Goal", name)
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // arrays stream one element per line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

/// Flag lookup that tolerates subcommands which never declared the flag.
pub fn flag(sub: &clap::ArgMatches, name: &str) -> bool {
    matches!(sub.try_get_one::<bool>(name), Ok(Some(true)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_parse_in_common_spellings() {
        assert_eq!(parse_offset("-03:00").unwrap().local_minus_utc(), -3 * 3600);
        assert_eq!(parse_offset("+0530").unwrap().local_minus_utc(), 5 * 3600 + 1800);
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("03:00").is_err());
        assert!(parse_offset("+25:00").is_err());
    }

    #[test]
    fn local_date_shifts_timestamps_only() {
        let brt = parse_offset("-03:00").unwrap();
        assert_eq!(
            local_date("2024-02-01", &brt).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
        assert_eq!(
            local_date("2024-02-01T01:00:00Z", &brt).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
        );
        assert!(local_date("01/02/2024", &brt).is_err());
    }

    #[test]
    fn month_end_handles_leap_years() {
        assert_eq!(month_end(2024, 2).unwrap().day(), 29);
        assert_eq!(month_end(2023, 2).unwrap().day(), 28);
        assert_eq!(month_end(2024, 12).unwrap().day(), 31);
        assert!(month_end(2024, 13).is_err());
    }

    #[test]
    fn clamp_day_caps_at_month_end() {
        assert_eq!(
            clamp_day(2024, 4, 31).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 30).unwrap()
        );
    }
}
