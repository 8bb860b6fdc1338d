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

//! Wallet backend access.
//!
//! [`WalletApi`] is the seam between the core and the REST backend. The
//! production implementation is [`HttpWalletApi`]; tests substitute their own.

mod client;
mod types;

pub use client::{HttpWalletApi, GENERIC_FAILURE};
pub use types::*;

use crate::error::ApiError;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

#[async_trait]
pub trait WalletApi: Send + Sync {
    /// `GET wallet/balance`
    async fn balance(&self) -> Result<Decimal, ApiError>;

    /// `GET wallet/projection`
    async fn projection(&self) -> Result<ProjectionResult, ApiError>;

    /// `GET transactions`, newest first.
    async fn transactions(&self) -> Result<Vec<TransactionRecord>, ApiError>;

    /// `GET qr/generate`
    async fn generate_token(&self) -> Result<PaymentToken, ApiError>;

    /// `POST meal/deduct`
    async fn deduct(&self, request: &DeductRequest) -> Result<DeductResponse, ApiError>;

    /// `GET meal/skips/upcoming?date=`
    async fn upcoming_skips(&self, date: NaiveDate) -> Result<SkipSummary, ApiError>;

    /// `POST wallet/topup`
    async fn top_up(&self, request: &TopUpRequest) -> Result<TopUpResponse, ApiError>;
}
