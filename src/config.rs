// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Client configuration.
//!
//! Defaults suit a local backend. [`WalletConfig::from_env`] overrides them
//! from environment variables; the command-line binary applies its flags on
//! top.
//!
//! # Environment Variables
//!
//! - `CAMPUS_WALLET_API_URL`: backend base URL (default: `http://localhost:5001`)
//! - `CAMPUS_WALLET_TOKEN`: bearer token attached to every request
//! - `CAMPUS_WALLET_TIMEOUT_SECS`: request timeout in seconds (default: 10)
//! - `CAMPUS_WALLET_VENUE`: venue served by the terminal (default: `Mess 1`)
//! - `CAMPUS_WALLET_TOPUP_THRESHOLD`: projected balance below which a top-up is suggested (default: 50)
//! - `CAMPUS_WALLET_TOPUP_HOURS`: comma-separated anchor hours (default: `10,14,21`)
//! - `CAMPUS_WALLET_TOPUP_MIN_TX`: transactions in the trailing window required (default: 3)

use crate::base::Venue;
use crate::error::ConfigError;
use crate::projection::SmartTopUpPolicy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5001";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    pub api_base_url: String,
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub venue: Venue,
    /// How long the balance display takes to reach a new value.
    pub animation_duration: Duration,
    pub smart_top_up: SmartTopUpPolicy,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_token: None,
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(3),
            venue: Venue::default(),
            animation_duration: Duration::from_millis(600),
            smart_top_up: SmartTopUpPolicy::default(),
        }
    }
}

impl WalletConfig {
    /// Builds a configuration from the process environment.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is set but cannot be parsed or
    /// the resulting smart top-up policy is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("CAMPUS_WALLET_API_URL") {
            config.api_base_url = url;
        }
        config.auth_token = lookup("CAMPUS_WALLET_TOKEN").filter(|t| !t.is_empty());
        if let Some(secs) = lookup("CAMPUS_WALLET_TIMEOUT_SECS") {
            config.request_timeout =
                Duration::from_secs(parse_value("CAMPUS_WALLET_TIMEOUT_SECS", &secs)?);
        }
        if let Some(venue) = lookup("CAMPUS_WALLET_VENUE") {
            config.venue = Venue::new(venue);
        }
        if let Some(threshold) = lookup("CAMPUS_WALLET_TOPUP_THRESHOLD") {
            config.smart_top_up.low_balance_threshold =
                parse_value::<Decimal>("CAMPUS_WALLET_TOPUP_THRESHOLD", &threshold)?;
        }
        if let Some(hours) = lookup("CAMPUS_WALLET_TOPUP_HOURS") {
            config.smart_top_up.anchor_hours = hours
                .split(',')
                .map(|h| parse_value("CAMPUS_WALLET_TOPUP_HOURS", h.trim()))
                .collect::<Result<_, _>>()?;
        }
        if let Some(min_tx) = lookup("CAMPUS_WALLET_TOPUP_MIN_TX") {
            config.smart_top_up.min_recent_transactions =
                parse_value("CAMPUS_WALLET_TOPUP_MIN_TX", &min_tx)?;
        }

        config.smart_top_up.validate()?;
        Ok(config)
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
