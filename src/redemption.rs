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

//! Redemption submitter.
//!
//! Turns one scanned payload and the vendor's current meal selection into a
//! single deduction request. The payload is checked for well-formed JSON
//! before anything is sent. Outcomes:
//!
//! | Outcome | Ledger | Reported as |
//! |---------|--------|-------------|
//! | Malformed payload | unchanged | [`RedemptionError::InvalidPayload`], no request sent |
//! | Backend accepts | `count + 1`, `total + cost` | [`Receipt`] |
//! | Backend declines | unchanged | [`RedemptionError::Rejected`] with the backend's reason |
//! | No response | unchanged | [`RedemptionError::Network`] |
//!
//! Nothing is retried; the vendor re-scans if needed.

use crate::api::{DeductRequest, WalletApi};
use crate::base::{UserId, Venue};
use crate::error::RedemptionError;
use crate::ledger::SessionStats;
use crate::meal::{MealSelection, MealType};
use crate::payload::QrPayload;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Confirmation of a successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub user_id: UserId,
    pub meal_type: MealType,
    pub amount: Decimal,
    pub venue: Venue,
}

impl Receipt {
    /// Confirmation line shown to the vendor.
    pub fn message(&self) -> String {
        format!("Payment of {} successful.", format_rupees(self.amount))
    }
}

/// Formats an amount as `₹70` or `₹72.5`.
pub fn format_rupees(amount: Decimal) -> String {
    format!("₹{}", amount.normalize())
}

pub struct RedemptionSubmitter {
    api: Arc<dyn WalletApi>,
}

impl RedemptionSubmitter {
    pub fn new(api: Arc<dyn WalletApi>) -> Self {
        Self { api }
    }

    /// Submits one redemption and records it in `stats` on success.
    ///
    /// # Errors
    ///
    /// See the module table. `stats` is only touched on success.
    pub async fn submit(
        &self,
        scanned: &str,
        selection: MealSelection,
        venue: &Venue,
        stats: &mut SessionStats,
    ) -> Result<Receipt, RedemptionError> {
        let qr_payload = QrPayload::parse(scanned)?;
        let cost = selection.cost();

        let request = DeductRequest {
            qr_payload,
            meal_cost: cost,
            description: selection.meal_type().name().to_string(),
            venue: venue.clone(),
        };

        match self.api.deduct(&request).await {
            Ok(response) => {
                stats.record(cost);
                info!(
                    user_id = %response.user_id,
                    meal = %selection.meal_type(),
                    %cost,
                    %venue,
                    "redemption accepted"
                );
                Ok(Receipt {
                    user_id: response.user_id,
                    meal_type: selection.meal_type(),
                    amount: cost,
                    venue: venue.clone(),
                })
            }
            Err(e) => {
                let error = RedemptionError::from(e);
                warn!(error = %error, %venue, "redemption failed");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable in-memory backend.

    use super::*;
    use crate::api::*;
    use crate::error::ApiError;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    pub struct MockApi {
        pub deduct_requests: Mutex<Vec<DeductRequest>>,
        pub deduct_responses: Mutex<VecDeque<Result<DeductResponse, ApiError>>>,
        pub balance: Mutex<Option<Result<Decimal, ApiError>>>,
        pub projection: Mutex<Option<Result<ProjectionResult, ApiError>>>,
        pub transactions: Mutex<Option<Result<Vec<TransactionRecord>, ApiError>>>,
        pub skips: Mutex<Option<Result<SkipSummary, ApiError>>>,
        pub skip_dates: Mutex<Vec<NaiveDate>>,
    }

    impl MockApi {
        pub fn accepting(user_id: u64) -> Self {
            let api = Self::default();
            api.push_deduct(Ok(DeductResponse {
                user_id: UserId(user_id),
                message: Some("Payment successful".into()),
                new_balance: None,
            }));
            api
        }

        pub fn rejecting(status: u16, message: &str) -> Self {
            let api = Self::default();
            api.push_deduct(Err(ApiError::Rejected {
                status,
                message: message.into(),
            }));
            api
        }

        pub fn push_deduct(&self, response: Result<DeductResponse, ApiError>) {
            self.deduct_responses.lock().push_back(response);
        }

        pub fn deduct_count(&self) -> usize {
            self.deduct_requests.lock().len()
        }

        fn scripted<T: Clone>(slot: &Mutex<Option<Result<T, ApiError>>>) -> Result<T, ApiError> {
            slot.lock()
                .clone()
                .unwrap_or_else(|| Err(ApiError::Transport("not scripted".into())))
        }
    }

    #[async_trait]
    impl WalletApi for MockApi {
        async fn balance(&self) -> Result<Decimal, ApiError> {
            Self::scripted(&self.balance)
        }

        async fn projection(&self) -> Result<ProjectionResult, ApiError> {
            Self::scripted(&self.projection)
        }

        async fn transactions(&self) -> Result<Vec<TransactionRecord>, ApiError> {
            Self::scripted(&self.transactions)
        }

        async fn generate_token(&self) -> Result<PaymentToken, ApiError> {
            Err(ApiError::Transport("not scripted".into()))
        }

        async fn deduct(&self, request: &DeductRequest) -> Result<DeductResponse, ApiError> {
            self.deduct_requests.lock().push(request.clone());
            self.deduct_responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Transport("connection reset".into())))
        }

        async fn upcoming_skips(&self, date: NaiveDate) -> Result<SkipSummary, ApiError> {
            self.skip_dates.lock().push(date);
            Self::scripted(&self.skips)
        }

        async fn top_up(&self, _request: &TopUpRequest) -> Result<TopUpResponse, ApiError> {
            Err(ApiError::Transport("not scripted".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockApi;
    use super::*;
    use crate::error::ApiError;
    use rust_decimal_macros::dec;

    const TOKEN: &str = r#"{"user_id": 12, "expires": 1900000000}"#;

    #[tokio::test]
    async fn success_updates_ledger() {
        let api = Arc::new(MockApi::accepting(12));
        let submitter = RedemptionSubmitter::new(api.clone());
        let mut stats = SessionStats::new();

        let receipt = submitter
            .submit(
                TOKEN,
                MealSelection::preset(MealType::Lunch),
                &Venue::new("Mess 2"),
                &mut stats,
            )
            .await
            .unwrap();

        assert_eq!(receipt.user_id, UserId(12));
        assert_eq!(receipt.message(), "Payment of ₹70 successful.");
        assert_eq!(stats.count(), 1);
        assert_eq!(stats.total(), dec!(70));

        let requests = api.deduct_requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].meal_cost, dec!(70));
        assert_eq!(requests[0].description, "Lunch");
        assert_eq!(requests[0].venue.as_str(), "Mess 2");
        assert_eq!(requests[0].qr_payload.as_json()["user_id"], 12);
    }

    #[tokio::test]
    async fn malformed_payload_never_reaches_backend() {
        let api = Arc::new(MockApi::accepting(1));
        let submitter = RedemptionSubmitter::new(api.clone());
        let mut stats = SessionStats::new();

        let result = submitter
            .submit(
                "hello vendor",
                MealSelection::default(),
                &Venue::default(),
                &mut stats,
            )
            .await;

        assert!(matches!(result, Err(RedemptionError::InvalidPayload(_))));
        assert_eq!(api.deduct_count(), 0);
        assert_eq!(stats, SessionStats::new());
    }

    #[tokio::test]
    async fn rejection_is_verbatim_and_leaves_ledger() {
        let api = Arc::new(MockApi::rejecting(400, "Insufficient balance"));
        let submitter = RedemptionSubmitter::new(api);
        let mut stats = SessionStats::new();

        let result = submitter
            .submit(TOKEN, MealSelection::default(), &Venue::default(), &mut stats)
            .await;

        assert_eq!(
            result,
            Err(RedemptionError::Rejected {
                reason: "Insufficient balance".into()
            })
        );
        assert_eq!(stats.count(), 0);
    }

    #[tokio::test]
    async fn network_failure_is_not_retried() {
        let api = Arc::new(MockApi::default());
        api.push_deduct(Err(ApiError::Transport("timed out".into())));
        let submitter = RedemptionSubmitter::new(api.clone());
        let mut stats = SessionStats::new();

        let result = submitter
            .submit(TOKEN, MealSelection::default(), &Venue::default(), &mut stats)
            .await;

        assert!(matches!(result, Err(RedemptionError::Network(_))));
        assert_eq!(api.deduct_count(), 1);
        assert_eq!(stats.total(), Decimal::ZERO);
    }

    #[test]
    fn rupee_formatting_drops_trailing_zeros() {
        assert_eq!(format_rupees(dec!(200.00)), "₹200");
        assert_eq!(format_rupees(dec!(72.50)), "₹72.5");
    }
}
