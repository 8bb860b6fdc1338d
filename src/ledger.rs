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

//! Vendor session ledger.
//!
//! Running redemption counters for one terminal screen. The ledger only
//! grows: it is updated by successful redemptions and reset only by dropping
//! the terminal.
//!
//! # Example
//!
//! ```
//! use campus_wallet::SessionStats;
//! use rust_decimal_macros::dec;
//!
//! let stats = SessionStats::new();
//! assert_eq!(stats.count(), 0);
//! assert_eq!(stats.total(), dec!(0));
//! ```

use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Redemption count and amount collected during the current shift.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    count: u64,
    total: Decimal,
}

impl SessionStats {
    const DECIMAL_PRECISION: u32 = 2;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    /// Adds one successful redemption of `cost`.
    pub(crate) fn record(&mut self, cost: Decimal) {
        debug_assert!(cost >= Decimal::ZERO, "redeemed cost went negative: {cost}");
        self.count += 1;
        self.total += cost;
    }
}

impl Serialize for SessionStats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("SessionStats", 2)?;
        state.serialize_field("count", &self.count)?;
        state.serialize_field(
            "total",
            &self.total.round_dp(SessionStats::DECIMAL_PRECISION),
        )?;
        state.end()
    }
}
