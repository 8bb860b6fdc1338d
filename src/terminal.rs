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

//! Vendor terminal.
//!
//! Wires the scan session, the redemption submitter and the shift ledger
//! together for one terminal screen. Each terminal owns its own ledger, so
//! two terminals in one process never share counters.

use crate::api::{SkipSummary, WalletApi, GENERIC_FAILURE};
use crate::base::Venue;
use crate::clock::SharedClock;
use crate::decoder::{decode_upload, Camera, ContinuousScan, Detection, SymbolDecoder};
use crate::error::{ApiError, DeviceError, RedemptionError, ScanError};
use crate::ledger::SessionStats;
use crate::meal::SharedSelection;
use crate::redemption::{Receipt, RedemptionSubmitter};
use crate::session::{ScanSession, ScanState};
use chrono::{NaiveDate, TimeDelta};
use parking_lot::RwLock;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a scan or upload ended, ready to show to the vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanReport {
    Redeemed(Receipt),
    /// The backend declined; `reason` is its message verbatim.
    Rejected { reason: String },
    InvalidPayload(String),
    NoSymbol,
    NetworkFailure(String),
    CameraUnavailable(String),
    Cancelled,
}

impl ScanReport {
    pub fn is_success(&self) -> bool {
        matches!(self, ScanReport::Redeemed(_))
    }

    /// Status line for the vendor.
    pub fn message(&self) -> String {
        match self {
            ScanReport::Redeemed(receipt) => receipt.message(),
            ScanReport::Rejected { reason } => reason.clone(),
            ScanReport::InvalidPayload(_) => "Invalid QR code.".to_string(),
            ScanReport::NoSymbol => "No QR code found in image.".to_string(),
            ScanReport::NetworkFailure(_) => GENERIC_FAILURE.to_string(),
            ScanReport::CameraUnavailable(reason) => format!("Camera unavailable: {reason}"),
            ScanReport::Cancelled => "Scan cancelled.".to_string(),
        }
    }
}

impl From<Result<Receipt, RedemptionError>> for ScanReport {
    fn from(outcome: Result<Receipt, RedemptionError>) -> Self {
        match outcome {
            Ok(receipt) => ScanReport::Redeemed(receipt),
            Err(RedemptionError::Rejected { reason }) => ScanReport::Rejected { reason },
            Err(RedemptionError::InvalidPayload(detail)) => ScanReport::InvalidPayload(detail),
            Err(RedemptionError::Network(detail)) => ScanReport::NetworkFailure(detail),
            Err(e @ RedemptionError::InvalidCost) => ScanReport::InvalidPayload(e.to_string()),
        }
    }
}

/// Venue the terminal is serving, changeable while a scan runs.
#[derive(Debug, Clone, Default)]
pub struct SharedVenue(Arc<RwLock<Venue>>);

impl SharedVenue {
    pub fn new(venue: Venue) -> Self {
        Self(Arc::new(RwLock::new(venue)))
    }

    pub fn set(&self, venue: Venue) {
        *self.0.write() = venue;
    }

    pub fn get(&self) -> Venue {
        self.0.read().clone()
    }
}

pub struct VendorTerminal {
    camera: Option<Arc<dyn Camera>>,
    decoder: Arc<dyn SymbolDecoder>,
    api: Arc<dyn WalletApi>,
    clock: SharedClock,
    session: ScanSession,
    checkout: Checkout,
}

/// Submission side of the terminal, kept apart from the session so a scan
/// can hold its session guard while redeeming.
struct Checkout {
    submitter: RedemptionSubmitter,
    stats: SessionStats,
    selection: SharedSelection,
    venue: SharedVenue,
}

impl Checkout {
    async fn redeem(&mut self, payload: &str) -> ScanReport {
        // Meal and venue as they are at detection time.
        let selection = self.selection.snapshot();
        let venue = self.venue.get();
        self.submitter
            .submit(payload, selection, &venue, &mut self.stats)
            .await
            .into()
    }
}

impl VendorTerminal {
    /// A terminal without a camera; uploads and waste intel still work.
    pub fn new(
        decoder: Arc<dyn SymbolDecoder>,
        api: Arc<dyn WalletApi>,
        clock: SharedClock,
        venue: Venue,
    ) -> Self {
        Self {
            camera: None,
            decoder,
            checkout: Checkout {
                submitter: RedemptionSubmitter::new(Arc::clone(&api)),
                stats: SessionStats::new(),
                selection: SharedSelection::default(),
                venue: SharedVenue::new(venue),
            },
            api,
            clock,
            session: ScanSession::new(),
        }
    }

    pub fn with_camera(mut self, camera: Arc<dyn Camera>) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Handle for changing the meal while a scan is running.
    pub fn selection(&self) -> SharedSelection {
        self.checkout.selection.clone()
    }

    pub fn venue(&self) -> SharedVenue {
        self.checkout.venue.clone()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.checkout.stats
    }

    pub fn state(&self) -> ScanState {
        self.session.state()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.session.last_error()
    }

    /// Releases the camera and returns the session to `Idle`.
    pub fn cancel(&mut self) {
        self.session.cancel();
    }

    /// Runs one scan: launch, wait for a payload, stop the camera, submit.
    ///
    /// `cancel` resolving before a payload is detected aborts the scan and
    /// releases the camera. Once a payload is detected the submission runs to
    /// completion. The session ends `Idle`, or `Error` if the camera could
    /// not be used; both allow another scan.
    ///
    /// Dropping the returned future has the same effect as `cancel`, at any
    /// point. A submission already in flight is abandoned with it.
    ///
    /// # Errors
    ///
    /// Only [`ScanError`] for an illegal state transition, which a terminal
    /// driven solely through this method never produces.
    pub async fn scan(&mut self, cancel: impl Future<Output = ()>) -> Result<ScanReport, ScanError> {
        tokio::pin!(cancel);
        let mut session = self.session.guard();
        session.launch()?;

        let Some(camera) = self.camera.as_ref().map(Arc::clone) else {
            return camera_lost(&mut session, DeviceError::NotFound);
        };
        let decoder = Arc::clone(&self.decoder);
        let started = tokio::select! {
            biased;
            _ = &mut cancel => None,
            started = ContinuousScan::start(camera.as_ref(), decoder) => Some(started),
        };
        let scan = match started {
            None => return Ok(cancelled(&mut session)),
            Some(Ok(scan)) => scan.on_frame_error(|e| debug!(error = %e, "frame skipped")),
            Some(Err(e)) => return camera_lost(&mut session, e),
        };
        session.camera_ready(scan)?;

        let payload = loop {
            let candidate = tokio::select! {
                biased;
                _ = &mut cancel => None,
                candidate = session.next_candidate() => Some(candidate),
            };
            match candidate {
                None => return Ok(cancelled(&mut session)),
                Some(Ok(Some(text))) => {
                    if let Some(payload) = session.detect(text) {
                        break payload;
                    }
                }
                Some(Ok(None)) => return camera_lost(&mut session, DeviceError::Disconnected),
                Some(Err(e)) => return camera_lost(&mut session, e),
            }
        };

        session.stop_camera()?;
        let report = self.checkout.redeem(&payload).await;
        session.settle()?;
        Ok(report)
    }

    /// Redeems a QR code from an uploaded picture. Decoded once; the camera
    /// is not involved.
    pub async fn redeem_image(&mut self, path: &Path) -> ScanReport {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read image");
                return ScanReport::NoSymbol;
            }
        };

        match decode_upload(Arc::clone(&self.decoder), bytes).await {
            Ok(Detection::Found(payload)) => self.checkout.redeem(&payload).await,
            Ok(Detection::NotFound) => ScanReport::NoSymbol,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "image decode failed");
                ScanReport::NoSymbol
            }
        }
    }

    /// Skips reported for `date`, tomorrow by default.
    pub async fn waste_intel(&self, date: Option<NaiveDate>) -> Result<SkipSummary, ApiError> {
        let date = date.unwrap_or_else(|| {
            let today = self.clock.now_utc().date_naive();
            today.checked_add_signed(TimeDelta::days(1)).unwrap_or(today)
        });
        let summary = self.api.upcoming_skips(date).await?;
        info!(%date, total = summary.summary.total(), "waste intel loaded");
        Ok(summary)
    }
}

fn cancelled(session: &mut ScanSession) -> ScanReport {
    session.cancel();
    ScanReport::Cancelled
}

fn camera_lost(session: &mut ScanSession, error: DeviceError) -> Result<ScanReport, ScanError> {
    let reason = error.to_string();
    session.camera_failed(error)?;
    Ok(ScanReport::CameraUnavailable(reason))
}
