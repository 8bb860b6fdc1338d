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

//! # Campus Wallet
//!
//! Client core for a campus meal wallet: QR redemption at vendor terminals and
//! balance projection with smart top-up hints on the student dashboard.
//!
//! ## Core Components
//!
//! - [`VendorTerminal`]: scans one QR code at a time and redeems it, keeping the shift's [`SessionStats`]
//! - [`ScanSession`]: camera state machine guaranteeing at most one redemption per scan
//! - [`RedemptionSubmitter`]: validates a payload and sends a single deduction
//! - [`ProjectionEngine`]: loads the dashboard and decides on a [`SmartTopUpDecision`]
//! - [`BalanceAnimator`]: eases the displayed balance toward the authoritative one
//! - [`WalletApi`]: backend calls, implemented over HTTP by [`HttpWalletApi`]
//!
//! ## Example
//!
//! ```
//! use campus_wallet::{MealSlot, SmartTopUpPolicy, TopUpSignals};
//! use rust_decimal_macros::dec;
//!
//! let policy = SmartTopUpPolicy::default();
//! let decision = policy.decide(&TopUpSignals {
//!     projected_balance: dec!(40),
//!     suggestion_amount: Some(dec!(200)),
//!     hour: 14,
//!     recent_transactions: 3,
//! });
//!
//! assert_eq!(decision.label().as_deref(), Some("₹200"));
//! assert_eq!(MealSlot::from_hour(14), MealSlot::Lunch);
//! ```
//!
//! ## Concurrency
//!
//! A terminal is driven by one task. Meal selection and venue are shared
//! handles so the vendor can change them while a scan is waiting for a code.

pub mod animator;
pub mod api;
mod base;
pub mod clock;
pub mod config;
pub mod decoder;
pub mod error;
mod ledger;
mod meal;
mod payload;
pub mod projection;
pub mod qr;
mod redemption;
mod session;
mod terminal;

pub use animator::BalanceAnimator;
pub use api::{HttpWalletApi, WalletApi};
pub use base::{TransactionId, UserId, Venue};
pub use clock::{Clock, SharedClock, SystemClock};
pub use config::WalletConfig;
pub use ledger::SessionStats;
pub use meal::{MealSelection, MealSlot, MealType, SharedSelection};
pub use payload::QrPayload;
pub use projection::{Dashboard, ProjectionEngine, SmartTopUpDecision, SmartTopUpPolicy, TopUpSignals};
pub use redemption::{format_rupees, Receipt, RedemptionSubmitter};
pub use session::{ScanGuard, ScanSession, ScanState};
pub use terminal::{ScanReport, SharedVenue, VendorTerminal};
