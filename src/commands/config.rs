// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::settings::{KEYS, Preferences, normalise, value_of};
use crate::utils::{pretty_table, required, set_setting};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => {
            let key = required(sub, "key")?;
            let value = normalise(key, required(sub, "value")?)?;
            set_setting(conn, key, &value)?;
            log::info!("setting {} updated", key);
            println!("{} = {}", key, value);
        }
        Some(("get", sub)) => {
            let key = required(sub, "key")?;
            let prefs = Preferences::load(conn)?;
            let value = value_of(&prefs, key).ok_or_else(|| anyhow!("Unknown setting '{}'", key))?;
            println!("{}", value);
        }
        Some(("list", _)) => {
            let prefs = Preferences::load(conn)?;
            let rows = KEYS
                .iter()
                .map(|k| vec![k.to_string(), value_of(&prefs, k).unwrap_or_default()])
                .collect();
            println!("{}", pretty_table(&["Key", "Value"], rows));
        }
        _ => {}
    }
    Ok(())
}
