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

//! Request and response bodies exchanged with the wallet backend.

use crate::base::{TransactionId, UserId, Venue};
use crate::payload::QrPayload;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}

/// Server-computed forecast of the balance after the next meal.
///
/// Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub projected_balance: Decimal,
    /// How much the forecast can be trusted, in `[0, 1]`.
    pub confidence_score: f64,
    #[serde(default)]
    pub suggestion_amount: Option<Decimal>,
    #[serde(default)]
    pub next_meal_cost: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    /// Positive for credits, negative for meal deductions.
    pub amount: Decimal,
    pub transaction_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Rotating token a student presents for scanning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentToken {
    /// PNG image as a `data:` URL.
    pub qr_image: String,
    /// Unix timestamp (seconds) after which the token is refused.
    pub expires_at: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeductRequest {
    pub qr_payload: QrPayload,
    #[serde(with = "rust_decimal::serde::float")]
    pub meal_cost: Decimal,
    pub description: String,
    pub venue: Venue,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeductResponse {
    pub user_id: UserId,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub new_balance: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopUpSource {
    #[serde(rename = "self")]
    Student,
    Parent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopUpRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub source: TopUpSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopUpResponse {
    pub message: String,
    pub new_balance: Decimal,
}

/// Skipped-meal counts for one date, per slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct SkipCounts {
    pub breakfast: u32,
    pub lunch: u32,
    pub dinner: u32,
}

impl SkipCounts {
    pub fn total(&self) -> u32 {
        self.breakfast + self.lunch + self.dinner
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipDetail {
    pub id: u64,
    pub user_email: String,
    pub meal_slot: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Waste-intel panel data: who is skipping which meal on a given date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipSummary {
    pub date: NaiveDate,
    pub summary: SkipCounts,
    #[serde(default)]
    pub skips: Vec<SkipDetail>,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Backend timestamps are either RFC 3339 or naive ISO 8601 in UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(with_offset) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(with_offset.with_timezone(&Utc));
        }
        raw.parse::<NaiveDateTime>()
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
