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

//! Scanned QR payloads.
//!
//! A payload is opaque to the client: it is parsed as JSON so it can be
//! forwarded as structured data, and nothing else is checked. Expiry, owner,
//! and reuse are decided by the backend.

use crate::error::RedemptionError;
use serde::Serialize;
use serde_json::Value;

/// Decoded QR content, parsed as JSON and forwarded unmodified.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QrPayload(Value);

impl QrPayload {
    /// Parses scanned text.
    ///
    /// # Errors
    ///
    /// Returns [`RedemptionError::InvalidPayload`] when `text` is not
    /// well-formed JSON.
    pub fn parse(text: &str) -> Result<Self, RedemptionError> {
        serde_json::from_str(text)
            .map(QrPayload)
            .map_err(|e| RedemptionError::InvalidPayload(e.to_string()))
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }
}
