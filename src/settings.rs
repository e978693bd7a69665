// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! User preferences persisted in the `settings` table.
//!
//! Preferences are read once per command into a [`Preferences`] value and
//! handed to the report code explicitly.

use anyhow::{Result, anyhow};
use chrono::{FixedOffset, Offset, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::utils::{get_setting, parse_offset};

pub const BASE_CURRENCY: &str = "base_currency";
pub const UTC_OFFSET: &str = "utc_offset";
pub const PRIVACY_MODE: &str = "privacy_mode";

pub const KEYS: [&str; 3] = [BASE_CURRENCY, UTC_OFFSET, PRIVACY_MODE];

const MASK: &str = "•••••";

#[derive(Debug, Clone, Serialize)]
pub struct Preferences {
    pub base_currency: String,
    #[serde(serialize_with = "serialize_offset")]
    pub utc_offset: FixedOffset,
    pub privacy_mode: bool,
}

fn serialize_offset<S: serde::Serializer>(o: &FixedOffset, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&o.to_string())
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            base_currency: "USD".to_string(),
            utc_offset: Utc.fix(),
            privacy_mode: false,
        }
    }
}

impl Preferences {
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut prefs = Preferences::default();
        if let Some(ccy) = get_setting(conn, BASE_CURRENCY)? {
            prefs.base_currency = ccy;
        }
        if let Some(off) = get_setting(conn, UTC_OFFSET)? {
            prefs.utc_offset = parse_offset(&off)?;
        }
        if let Some(p) = get_setting(conn, PRIVACY_MODE)? {
            prefs.privacy_mode = parse_bool(&p)?;
        }
        Ok(prefs)
    }

    /// Amount as shown in tables; masked under privacy mode.
    pub fn money(&self, d: &Decimal) -> String {
        if self.privacy_mode {
            MASK.to_string()
        } else {
            format!("{:.2}", d.round_dp(2))
        }
    }

    pub fn percent(&self, d: &Decimal) -> String {
        format!("{:.1}%", d.round_dp(1))
    }
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => Err(anyhow!("Invalid boolean '{}' (use on|off)", other)),
    }
}

/// Validate and normalise a preference before it is stored.
pub fn normalise(key: &str, value: &str) -> Result<String> {
    match key {
        BASE_CURRENCY => {
            let ccy = value.trim().to_uppercase();
            if ccy.len() != 3 || !ccy.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(anyhow!("Invalid currency code '{}'", value));
            }
            Ok(ccy)
        }
        UTC_OFFSET => Ok(parse_offset(value)?.to_string()),
        PRIVACY_MODE => Ok(parse_bool(value)?.to_string()),
        other => Err(anyhow!(
            "Unknown setting '{}' (known: {})",
            other,
            KEYS.join(", ")
        )),
    }
}

pub fn value_of(prefs: &Preferences, key: &str) -> Option<String> {
    match key {
        BASE_CURRENCY => Some(prefs.base_currency.clone()),
        UTC_OFFSET => Some(prefs.utc_offset.to_string()),
        PRIVACY_MODE => Some(prefs.privacy_mode.to_string()),
        _ => None,
    }
}
