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

//! Wallet projection engine.
//!
//! Loads what the student dashboard shows and decides whether to suggest a
//! top-up. The suggestion is a hint only; it never blocks spending or
//! topping up.
//!
//! A top-up is suggested when all of these hold:
//!
//! - the server's projected balance is below the threshold (default 50);
//! - the local hour is one of the anchor hours near the end of a meal window
//!   (default 10, 14 and 21);
//! - at least the minimum number of transactions (default 3) happened in the
//!   trailing window (default 24 hours);
//! - the server proposed a positive amount, which is shown as-is.

use crate::api::{ProjectionResult, TransactionRecord, WalletApi};
use crate::clock::SharedClock;
use crate::error::ConfigError;
use crate::meal::MealSlot;
use crate::redemption::format_rupees;
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Number of transactions kept for the recent-activity list.
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

/// Tunable thresholds for the smart top-up suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartTopUpPolicy {
    pub low_balance_threshold: Decimal,
    pub anchor_hours: Vec<u32>,
    pub min_recent_transactions: usize,
    pub velocity_window: Duration,
}

impl Default for SmartTopUpPolicy {
    fn default() -> Self {
        Self {
            low_balance_threshold: dec!(50),
            anchor_hours: vec![10, 14, 21],
            min_recent_transactions: 3,
            velocity_window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl SmartTopUpPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.low_balance_threshold < Decimal::ZERO {
            return Err(ConfigError::NegativeThreshold);
        }
        if let Some(&hour) = self.anchor_hours.iter().find(|&&h| h >= 24) {
            return Err(ConfigError::InvalidHour(hour));
        }
        Ok(())
    }

    pub fn decide(&self, signals: &TopUpSignals) -> SmartTopUpDecision {
        let low = signals.projected_balance < self.low_balance_threshold;
        let anchored = self.anchor_hours.contains(&signals.hour);
        let busy = signals.recent_transactions >= self.min_recent_transactions;

        match signals.suggestion_amount {
            Some(amount) if low && anchored && busy && amount > Decimal::ZERO => {
                SmartTopUpDecision::Suggest { amount }
            }
            _ => SmartTopUpDecision::Hidden,
        }
    }

    /// Transactions no older than the velocity window as of `now`.
    pub fn count_recent(&self, transactions: &[TransactionRecord], now: DateTime<Utc>) -> usize {
        let window = TimeDelta::from_std(self.velocity_window).unwrap_or(TimeDelta::MAX);
        let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        transactions
            .iter()
            .filter(|tx| tx.timestamp >= cutoff)
            .count()
    }
}

/// Inputs to the smart top-up rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopUpSignals {
    pub projected_balance: Decimal,
    pub suggestion_amount: Option<Decimal>,
    /// Local hour of day, 0..24.
    pub hour: u32,
    pub recent_transactions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SmartTopUpDecision {
    Hidden,
    Suggest { amount: Decimal },
}

impl SmartTopUpDecision {
    pub fn is_shown(&self) -> bool {
        matches!(self, SmartTopUpDecision::Suggest { .. })
    }

    pub fn amount(&self) -> Option<Decimal> {
        match self {
            SmartTopUpDecision::Suggest { amount } => Some(*amount),
            SmartTopUpDecision::Hidden => None,
        }
    }

    /// Amount as displayed on the nudge, e.g. `₹200`.
    pub fn label(&self) -> Option<String> {
        self.amount().map(format_rupees)
    }
}

/// Everything the student dashboard shows on activation.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    /// Authoritative balance; `None` if it could not be fetched.
    pub balance: Option<Decimal>,
    pub recent_activity: Vec<TransactionRecord>,
    pub recent_transaction_count: usize,
    pub meal_slot: MealSlot,
    pub projection: Option<ProjectionResult>,
    pub smart_top_up: SmartTopUpDecision,
}

pub struct ProjectionEngine {
    api: Arc<dyn WalletApi>,
    clock: SharedClock,
    policy: SmartTopUpPolicy,
}

impl ProjectionEngine {
    pub fn new(api: Arc<dyn WalletApi>, clock: SharedClock, policy: SmartTopUpPolicy) -> Self {
        Self { api, clock, policy }
    }

    pub fn policy(&self) -> &SmartTopUpPolicy {
        &self.policy
    }

    /// Loads the dashboard.
    ///
    /// Balance and history are fetched concurrently, then the projection.
    /// A failed fetch is logged and leaves its part empty; with no
    /// projection the suggestion stays hidden.
    pub async fn load(&self) -> Dashboard {
        let (balance, transactions) = tokio::join!(self.api.balance(), self.api.transactions());

        let balance = balance
            .inspect_err(|e| warn!(error = %e, "balance fetch failed"))
            .ok();
        let transactions = transactions
            .inspect_err(|e| warn!(error = %e, "transaction history fetch failed"))
            .unwrap_or_default();

        let projection = self
            .api
            .projection()
            .await
            .inspect_err(|e| warn!(error = %e, "projection fetch failed"))
            .ok();

        let hour = self.clock.local_hour();
        let recent_transaction_count = self.policy.count_recent(&transactions, self.clock.now_utc());

        let smart_top_up = projection
            .as_ref()
            .map(|p| {
                self.policy.decide(&TopUpSignals {
                    projected_balance: p.projected_balance,
                    suggestion_amount: p.suggestion_amount,
                    hour,
                    recent_transactions: recent_transaction_count,
                })
            })
            .unwrap_or(SmartTopUpDecision::Hidden);
        debug!(hour, recent_transaction_count, ?smart_top_up, "dashboard loaded");

        Dashboard {
            balance,
            recent_activity: transactions.into_iter().take(RECENT_ACTIVITY_LIMIT).collect(),
            recent_transaction_count,
            meal_slot: MealSlot::from_hour(hour),
            projection,
            smart_top_up,
        }
    }
}
