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

//! HTTP client for the wallet backend.

use super::types::*;
use super::WalletApi;
use crate::config::WalletConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::CACHE_CONTROL;
use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Message shown when a failed response carries no reason of its own.
pub const GENERIC_FAILURE: &str = "Transaction failed.";

/// [`WalletApi`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpWalletApi {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpWalletApi {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidConfig`] when the HTTP client cannot be built.
    pub fn new(config: &WalletConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ApiError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<R, ApiError> {
        let request = self
            .client
            .get(self.url(path))
            .query(query)
            .header(CACHE_CONTROL, "no-cache");
        self.send(path, self.authorized(request)).await
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let request = self.client.post(self.url(path)).json(body);
        self.send(path, self.authorized(request)).await
    }

    async fn send<R: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<R, ApiError> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                ApiError::Transport(format!("cannot connect to {}", self.base_url))
            } else {
                ApiError::from(e)
            }
        })?;
        debug!(path, status = response.status().as_u16(), "wallet API response");
        Self::decode(response).await
    }

    async fn decode<R: DeserializeOwned>(response: Response) -> Result<R, ApiError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<R>()
                .await
                .map_err(|e| ApiError::Parse(e.to_string()));
        }

        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        Err(ApiError::Rejected {
            status: status.as_u16(),
            message: body
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        })
    }
}

#[async_trait]
impl WalletApi for HttpWalletApi {
    async fn balance(&self) -> Result<Decimal, ApiError> {
        let response: BalanceResponse = self.get("wallet/balance", &[]).await?;
        Ok(response.balance)
    }

    async fn projection(&self) -> Result<ProjectionResult, ApiError> {
        self.get("wallet/projection", &[]).await
    }

    async fn transactions(&self) -> Result<Vec<TransactionRecord>, ApiError> {
        self.get("transactions", &[]).await
    }

    async fn generate_token(&self) -> Result<PaymentToken, ApiError> {
        self.get("qr/generate", &[]).await
    }

    async fn deduct(&self, request: &DeductRequest) -> Result<DeductResponse, ApiError> {
        self.post("meal/deduct", request).await
    }

    async fn upcoming_skips(&self, date: NaiveDate) -> Result<SkipSummary, ApiError> {
        self.get("meal/skips/upcoming", &[("date", date.to_string())])
            .await
    }

    async fn top_up(&self, request: &TopUpRequest) -> Result<TopUpResponse, ApiError> {
        self.post("wallet/topup", request).await
    }
}
