// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Failures callers need to tell apart. Everything else travels as
//! [`anyhow::Error`] with context attached.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FinError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Nothing to settle for card '{0}'")]
    NothingToSettle(String),
    #[error("Price lookup failed for {ticker}: {reason}")]
    PriceLookup { ticker: String, reason: String },
}
