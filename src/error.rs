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

//! Error types for scanning, redemption, and wallet API access.
//!
//! Device and decode errors stay inside the scanning core. Business
//! rejections and transport failures are handed to the presentation layer as
//! values and never abort a terminal session.

use crate::session::ScanState;
use thiserror::Error;

/// Camera failures. Terminal to the current scan attempt, recoverable by retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The user or platform refused camera access
    #[error("camera permission denied")]
    PermissionDenied,

    /// No camera matches the requested facing mode
    #[error("no camera available")]
    NotFound,

    /// Another session already holds the camera
    #[error("camera is busy")]
    Busy,

    /// The frame stream ended while the scanner was active
    #[error("camera disconnected")]
    Disconnected,

    /// Stopping the capture failed; the handle is still considered released
    #[error("failed to stop camera: {0}")]
    StopFailed(String),
}

/// Symbol decoding failures.
///
/// Transient for continuous scanning (the frame is skipped), terminal for a
/// single still-image attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Image bytes could not be read as a picture at all
    #[error("unreadable image: {0}")]
    UnreadableImage(String),

    /// A symbol was located but its content could not be recovered
    #[error("frame decode failed: {0}")]
    Frame(String),
}

/// Wallet backend failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The backend answered with a non-success status
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request never produced a response
    #[error("network error: {0}")]
    Transport(String),

    /// A success response did not have the expected shape
    #[error("unexpected response: {0}")]
    Parse(String),

    /// The client could not be built from the given configuration
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Redemption failures as reported to the vendor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedemptionError {
    /// Scanned text is not well-formed JSON; nothing was sent
    #[error("invalid QR payload: {0}")]
    InvalidPayload(String),

    /// Meal cost is negative
    #[error("invalid meal cost (must not be negative)")]
    InvalidCost,

    /// The backend declined the redemption; `reason` is its message verbatim
    #[error("{reason}")]
    Rejected { reason: String },

    /// The deduction request did not complete
    #[error("transaction failed: {0}")]
    Network(String),
}

impl From<ApiError> for RedemptionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected { message, .. } => RedemptionError::Rejected { reason: message },
            other => RedemptionError::Network(other.to_string()),
        }
    }
}

/// Illegal use of the scan session state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("cannot {action} while {from:?}")]
    InvalidTransition {
        from: ScanState,
        action: &'static str,
    },
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("anchor hour {0} is outside 0..24")]
    InvalidHour(u32),

    #[error("low balance threshold must not be negative")]
    NegativeThreshold,
}
