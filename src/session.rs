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

//! Scan session controller.
//!
//! One session per terminal screen, driving the camera through:
//!
//! ```text
//!  Idle ──launch──► Initializing ──camera ready──► Active ──payload──► Decoding
//!   ▲                    │                           │                    │
//!   │              camera failed               stream ended          stop camera
//!   │                    ▼                           ▼                    ▼
//!   │                  Error ◄───────────────────────┘                Cooldown
//!   │                    │ launch (retry)                                 │
//!   │                    └──────► Initializing                            │
//!   └───────────────────────────── settle ────────────────────────────────┘
//!
//!  cancel: any state ──► Idle, camera released first
//! ```
//!
//! The `Active → Decoding` transition sets a consumption latch. Payloads that
//! arrive after it, before the camera has physically stopped, are discarded,
//! so a session produces at most one redemption attempt.

use crate::decoder::ContinuousScan;
use crate::error::{DeviceError, ScanError};
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScanState {
    Idle,
    Initializing,
    Active,
    Decoding,
    Cooldown,
    Error,
}

/// State of the terminal's scanner.
#[derive(Debug)]
pub struct ScanSession {
    state: ScanState,
    camera: Option<ContinuousScan>,
    last_error: Option<String>,
    consumed: bool,
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            state: ScanState::Idle,
            camera: None,
            last_error: None,
            consumed: false,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    /// `Idle | Error → Initializing`. The caller then acquires the camera.
    pub fn launch(&mut self) -> Result<(), ScanError> {
        match self.state {
            ScanState::Idle | ScanState::Error => {
                self.state = ScanState::Initializing;
                self.last_error = None;
                self.consumed = false;
                debug!("scanner launching");
                Ok(())
            }
            from => Err(ScanError::InvalidTransition {
                from,
                action: "launch",
            }),
        }
    }

    /// `Initializing → Active` with the running scan.
    ///
    /// If the session left `Initializing` in the meantime the scan is stopped
    /// immediately and an error is returned.
    pub fn camera_ready(&mut self, scan: ContinuousScan) -> Result<(), ScanError> {
        if self.state != ScanState::Initializing {
            stop_quietly(scan);
            return Err(ScanError::InvalidTransition {
                from: self.state,
                action: "activate camera",
            });
        }
        self.camera = Some(scan);
        self.state = ScanState::Active;
        debug!("scanner active");
        Ok(())
    }

    /// `Initializing | Active → Error`, releasing any camera held.
    pub fn camera_failed(&mut self, error: DeviceError) -> Result<(), ScanError> {
        match self.state {
            ScanState::Initializing | ScanState::Active => {
                self.release_camera();
                warn!(error = %error, "camera unavailable");
                self.last_error = Some(error.to_string());
                self.state = ScanState::Error;
                Ok(())
            }
            from => Err(ScanError::InvalidTransition {
                from,
                action: "report camera failure",
            }),
        }
    }

    /// Waits for the next payload from the running scan.
    ///
    /// `Ok(None)` when there is no running scan or it already produced its payload.
    pub async fn next_candidate(&mut self) -> Result<Option<String>, DeviceError> {
        match self.camera.as_mut() {
            Some(scan) if self.state == ScanState::Active => scan.next_payload().await,
            _ => Ok(None),
        }
    }

    /// `Active → Decoding` for the first payload of this session.
    ///
    /// Returns the payload to submit, or `None` when the session is not
    /// accepting payloads or one was already consumed.
    pub fn detect(&mut self, payload: String) -> Option<String> {
        if self.state != ScanState::Active || self.consumed {
            debug!(state = ?self.state, "discarding payload");
            return None;
        }
        self.consumed = true;
        self.state = ScanState::Decoding;
        Some(payload)
    }

    /// `Decoding → Cooldown`, stopping the camera. Stop failures are logged.
    pub fn stop_camera(&mut self) -> Result<(), ScanError> {
        if self.state != ScanState::Decoding {
            return Err(ScanError::InvalidTransition {
                from: self.state,
                action: "stop camera",
            });
        }
        self.release_camera();
        self.state = ScanState::Cooldown;
        Ok(())
    }

    /// `Cooldown → Idle` once the submission has settled. The camera stays off.
    pub fn settle(&mut self) -> Result<(), ScanError> {
        if self.state != ScanState::Cooldown {
            return Err(ScanError::InvalidTransition {
                from: self.state,
                action: "settle",
            });
        }
        self.state = ScanState::Idle;
        Ok(())
    }

    /// Any state → `Idle`. The camera is released before this returns.
    pub fn cancel(&mut self) {
        self.release_camera();
        if self.state != ScanState::Idle {
            debug!(from = ?self.state, "scan cancelled");
        }
        self.state = ScanState::Idle;
    }

    /// Borrows the session for one scan. If the guard is dropped while the
    /// scan is still in progress, the session is cancelled.
    pub fn guard(&mut self) -> ScanGuard<'_> {
        ScanGuard { session: self }
    }

    /// True while a scan is between `launch` and its final `Idle` or `Error`.
    pub fn in_progress(&self) -> bool {
        !matches!(self.state, ScanState::Idle | ScanState::Error)
    }

    fn release_camera(&mut self) {
        if let Some(scan) = self.camera.take() {
            stop_quietly(scan);
        }
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Session borrowed by a running scan.
///
/// A scan future dropped mid-way (timeout, outer `select!`, aborted task)
/// drops this guard, which releases the camera and returns to `Idle`.
#[derive(Debug)]
pub struct ScanGuard<'a> {
    session: &'a mut ScanSession,
}

impl Deref for ScanGuard<'_> {
    type Target = ScanSession;

    fn deref(&self) -> &ScanSession {
        self.session
    }
}

impl DerefMut for ScanGuard<'_> {
    fn deref_mut(&mut self) -> &mut ScanSession {
        self.session
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        if self.session.in_progress() {
            debug!(state = ?self.session.state, "scan abandoned");
            self.session.cancel();
        }
    }
}

fn stop_quietly(scan: ContinuousScan) {
    if let Err(e) = scan.stop() {
        warn!(error = %e, "camera stop failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::testing::{text_frame, MockCamera, TextDecoder};
    use crate::decoder::SymbolDecoder;
    use std::sync::Arc;

    fn decoder() -> Arc<dyn SymbolDecoder> {
        Arc::new(TextDecoder)
    }

    async fn active_session(camera: &MockCamera) -> ScanSession {
        let mut session = ScanSession::new();
        session.launch().unwrap();
        let scan = ContinuousScan::start(camera, decoder()).await.unwrap();
        session.camera_ready(scan).unwrap();
        session
    }

    #[test]
    fn starts_idle() {
        let session = ScanSession::new();
        assert_eq!(session.state(), ScanState::Idle);
        assert!(!session.has_camera());
        assert_eq!(session.last_error(), None);
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let camera = MockCamera::with_frames(vec![text_frame("{}")]);
        let mut session = active_session(&camera).await;
        assert_eq!(session.state(), ScanState::Active);

        let text = session.next_candidate().await.unwrap().unwrap();
        assert_eq!(session.detect(text), Some("{}".to_string()));
        assert_eq!(session.state(), ScanState::Decoding);

        session.stop_camera().unwrap();
        assert_eq!(session.state(), ScanState::Cooldown);
        assert_eq!(camera.active_count(), 0);

        session.settle().unwrap();
        assert_eq!(session.state(), ScanState::Idle);
        assert_eq!(camera.acquisition_count(), 1);
    }

    #[tokio::test]
    async fn second_payload_is_discarded() {
        let camera = MockCamera::with_frames(vec![]);
        let mut session = active_session(&camera).await;

        assert!(session.detect("first".into()).is_some());
        assert!(session.detect("second".into()).is_none());
        assert_eq!(session.state(), ScanState::Decoding);
    }

    #[tokio::test]
    async fn payload_after_stop_is_discarded() {
        let camera = MockCamera::with_frames(vec![]);
        let mut session = active_session(&camera).await;

        session.detect("first".into()).unwrap();
        session.stop_camera().unwrap();
        assert!(session.detect("late".into()).is_none());
        session.settle().unwrap();
        assert!(session.detect("idle".into()).is_none());
    }

    #[test]
    fn payload_while_initializing_is_discarded() {
        let mut session = ScanSession::new();
        session.launch().unwrap();
        assert!(session.detect("early".into()).is_none());
        assert_eq!(session.state(), ScanState::Initializing);
    }

    #[test]
    fn camera_failure_is_retryable() {
        let mut session = ScanSession::new();
        session.launch().unwrap();
        session.camera_failed(DeviceError::PermissionDenied).unwrap();

        assert_eq!(session.state(), ScanState::Error);
        assert_eq!(session.last_error(), Some("camera permission denied"));

        session.launch().unwrap();
        assert_eq!(session.state(), ScanState::Initializing);
        assert_eq!(session.last_error(), None);
    }

    #[tokio::test]
    async fn cancel_releases_camera_from_every_state() {
        use ScanState::*;

        for target in [Idle, Initializing, Active, Decoding, Cooldown, Error] {
            let camera = MockCamera::with_frames(vec![]);
            let mut session = ScanSession::new();
            if target != Idle {
                session.launch().unwrap();
            }
            if matches!(target, Active | Decoding | Cooldown | Error) {
                let scan = ContinuousScan::start(&camera, decoder()).await.unwrap();
                session.camera_ready(scan).unwrap();
            }
            if matches!(target, Decoding | Cooldown) {
                session.detect("{}".into()).unwrap();
            }
            if target == Cooldown {
                session.stop_camera().unwrap();
            }
            if target == Error {
                session.camera_failed(DeviceError::Disconnected).unwrap();
            }
            assert_eq!(session.state(), target);

            session.cancel();

            assert_eq!(session.state(), Idle, "cancelled from {target:?}");
            assert_eq!(camera.active_count(), 0, "cancelled from {target:?}");
            assert!(!session.has_camera());
        }
    }

    #[tokio::test]
    async fn dropped_guard_cancels_scan_in_progress() {
        let (camera, _frames) = MockCamera::live();
        let mut session = ScanSession::new();
        {
            let mut guard = session.guard();
            guard.launch().unwrap();
            let scan = ContinuousScan::start(&camera, decoder()).await.unwrap();
            guard.camera_ready(scan).unwrap();
            assert_eq!(camera.active_count(), 1);
        }

        assert_eq!(session.state(), ScanState::Idle);
        assert_eq!(camera.active_count(), 0);
        session.launch().unwrap();
    }

    #[test]
    fn dropped_guard_keeps_finished_states() {
        let mut session = ScanSession::new();
        {
            let mut guard = session.guard();
            guard.launch().unwrap();
            guard.camera_failed(DeviceError::PermissionDenied).unwrap();
        }
        assert_eq!(session.state(), ScanState::Error);
        assert_eq!(session.last_error(), Some("camera permission denied"));
    }

    #[tokio::test]
    async fn late_camera_after_cancel_is_released() {
        let camera = MockCamera::with_frames(vec![]);
        let mut session = ScanSession::new();
        session.launch().unwrap();
        let scan = ContinuousScan::start(&camera, decoder()).await.unwrap();

        session.cancel();
        let result = session.camera_ready(scan);

        assert!(matches!(result, Err(ScanError::InvalidTransition { .. })));
        assert_eq!(camera.active_count(), 0);
        assert_eq!(session.state(), ScanState::Idle);
    }

    #[tokio::test]
    async fn stop_failure_is_not_fatal() {
        let camera = MockCamera::with_frames(vec![]).failing_stop();
        let mut session = active_session(&camera).await;

        session.detect("{}".into()).unwrap();
        session.stop_camera().unwrap();
        assert_eq!(session.state(), ScanState::Cooldown);
        assert_eq!(camera.active_count(), 0);
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut session = ScanSession::new();
        assert_eq!(
            session.stop_camera(),
            Err(ScanError::InvalidTransition {
                from: ScanState::Idle,
                action: "stop camera"
            })
        );
        assert!(session.settle().is_err());
        session.launch().unwrap();
        assert!(session.launch().is_err());
    }

    #[tokio::test]
    async fn dropping_session_releases_camera() {
        let camera = MockCamera::with_frames(vec![]);
        let session = active_session(&camera).await;
        assert_eq!(camera.active_count(), 1);
        drop(session);
        assert_eq!(camera.active_count(), 0);
    }
}
