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

//! Decoder adapter.
//!
//! Turns camera frames or a single still image into "found this payload"
//! results. Two entry points:
//!
//! - [`ContinuousScan`]: owns the camera through a [`CameraHandle`], decodes
//!   frames as they arrive, and yields at most one payload per start. Frames
//!   that fail to decode are skipped.
//! - [`decode_still`]: decodes one uploaded image. An image without a symbol
//!   is [`Detection::NotFound`], not an error. [`decode_upload`] does the
//!   same on the blocking pool.
//!
//! Frame and image decoding never runs on the async workers.
//!
//! The camera is released when the scan is stopped, when the handle is
//! dropped on an error or cancellation path, and when its owner is torn down.

use crate::error::{DecodeError, DeviceError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// 8-bit greyscale image, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    luma: Vec<u8>,
}

impl Frame {
    /// Returns `None` when `luma` does not hold exactly `width * height` pixels.
    pub fn new(width: u32, height: u32, luma: Vec<u8>) -> Option<Self> {
        let expected = (width as usize).checked_mul(height as usize)?;
        (luma.len() == expected).then_some(Self {
            width,
            height,
            luma,
        })
    }

    /// Decodes an encoded picture (PNG, JPEG) into a greyscale frame.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, DecodeError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| DecodeError::UnreadableImage(e.to_string()))?
            .to_luma8();
        let (width, height) = image.dimensions();
        Ok(Self {
            width,
            height,
            luma: image.into_raw(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    /// Brightness at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width as usize || y >= self.height as usize {
            return None;
        }
        self.luma.get(y * self.width as usize + x).copied()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Outcome of looking for a symbol in one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Found(String),
    NotFound,
}

/// Locates and reads a QR symbol in a frame.
pub trait SymbolDecoder: Send + Sync {
    fn decode(&self, frame: &Frame) -> Result<Detection, DecodeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Rear,
    Front,
}

/// Capture device able to hand out an exclusive frame stream.
#[async_trait]
pub trait Camera: Send + Sync {
    async fn acquire(&self, facing: Facing) -> Result<Box<dyn FrameSource>, DeviceError>;
}

/// Live frame stream from an acquired camera.
#[async_trait]
pub trait FrameSource: Send {
    /// Next captured frame, or `None` once capture has ended.
    async fn next_frame(&mut self) -> Option<Frame>;

    /// Stops capture and gives the device back. Called exactly once.
    fn stop(&mut self) -> Result<(), DeviceError>;
}

/// Exclusive ownership of an acquired camera.
///
/// Releasing is explicit through [`release`](CameraHandle::release) and also
/// happens on drop, so every exit path gives the device back.
pub struct CameraHandle {
    source: Option<Box<dyn FrameSource>>,
}

impl CameraHandle {
    pub async fn acquire(camera: &dyn Camera, facing: Facing) -> Result<Self, DeviceError> {
        let source = camera.acquire(facing).await?;
        debug!(?facing, "camera acquired");
        Ok(Self {
            source: Some(source),
        })
    }

    async fn next_frame(&mut self) -> Option<Frame> {
        match self.source.as_mut() {
            Some(source) => source.next_frame().await,
            None => None,
        }
    }

    /// Stops capture now.
    ///
    /// The handle counts as released even if the device reports a failure.
    pub fn release(mut self) -> Result<(), DeviceError> {
        self.stop_source()
    }

    fn stop_source(&mut self) -> Result<(), DeviceError> {
        match self.source.take() {
            Some(mut source) => {
                debug!("camera released");
                source.stop()
            }
            None => Ok(()),
        }
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop_source() {
            warn!(error = %e, "camera stop failed during teardown");
        }
    }
}

impl fmt::Debug for CameraHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraHandle")
            .field("active", &self.source.is_some())
            .finish()
    }
}

type FrameErrorHook = Box<dyn FnMut(&DecodeError) + Send>;

/// Continuous camera decoding that yields at most one payload.
///
/// Once a payload has been returned, frames still arriving before the camera
/// stops are discarded.
pub struct ContinuousScan {
    camera: CameraHandle,
    decoder: Arc<dyn SymbolDecoder>,
    delivered: bool,
    frame_errors: u64,
    on_frame_error: Option<FrameErrorHook>,
}

impl ContinuousScan {
    /// Acquires the rear camera and prepares to decode its frames.
    pub async fn start(
        camera: &dyn Camera,
        decoder: Arc<dyn SymbolDecoder>,
    ) -> Result<Self, DeviceError> {
        let camera = CameraHandle::acquire(camera, Facing::Rear).await?;
        Ok(Self {
            camera,
            decoder,
            delivered: false,
            frame_errors: 0,
            on_frame_error: None,
        })
    }

    /// Observes frames that failed to decode. They are skipped either way.
    pub fn on_frame_error(mut self, hook: impl FnMut(&DecodeError) + Send + 'static) -> Self {
        self.on_frame_error = Some(Box::new(hook));
        self
    }

    /// Waits for the first decodable payload.
    ///
    /// Returns `Ok(None)` if a payload was already produced by this scan.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Disconnected`] if the frame stream ends first.
    pub async fn next_payload(&mut self) -> Result<Option<String>, DeviceError> {
        if self.delivered {
            return Ok(None);
        }

        while let Some(frame) = self.camera.next_frame().await {
            match decode_off_thread(Arc::clone(&self.decoder), frame).await {
                Ok(Detection::Found(text)) => {
                    self.delivered = true;
                    return Ok(Some(text));
                }
                Ok(Detection::NotFound) => {}
                Err(e) => {
                    self.frame_errors += 1;
                    debug!(error = %e, "skipping undecodable frame");
                    if let Some(hook) = self.on_frame_error.as_mut() {
                        hook(&e);
                    }
                }
            }
        }

        Err(DeviceError::Disconnected)
    }

    /// Number of frames skipped because they failed to decode.
    pub fn frame_errors(&self) -> u64 {
        self.frame_errors
    }

    /// Stops the camera.
    pub fn stop(self) -> Result<(), DeviceError> {
        self.camera.release()
    }
}

impl fmt::Debug for ContinuousScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuousScan")
            .field("camera", &self.camera)
            .field("delivered", &self.delivered)
            .field("frame_errors", &self.frame_errors)
            .finish()
    }
}

/// Decodes one uploaded image.
///
/// # Errors
///
/// [`DecodeError`] when the bytes are not a readable picture or a located
/// symbol cannot be read. No symbol at all is `Ok(Detection::NotFound)`.
pub fn decode_still(decoder: &dyn SymbolDecoder, image: &[u8]) -> Result<Detection, DecodeError> {
    let frame = Frame::from_encoded(image)?;
    decoder.decode(&frame)
}

/// [`decode_still`] on the blocking pool, leaving the async workers free.
pub async fn decode_upload(
    decoder: Arc<dyn SymbolDecoder>,
    image: Vec<u8>,
) -> Result<Detection, DecodeError> {
    tokio::task::spawn_blocking(move || decode_still(decoder.as_ref(), &image))
        .await
        .map_err(|e| DecodeError::Frame(format!("decoder task failed: {e}")))?
}

async fn decode_off_thread(
    decoder: Arc<dyn SymbolDecoder>,
    frame: Frame,
) -> Result<Detection, DecodeError> {
    tokio::task::spawn_blocking(move || decoder.decode(&frame))
        .await
        .map_err(|e| DecodeError::Frame(format!("decoder task failed: {e}")))?
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory camera and decoder for exercising the scanning pipeline.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Encodes `text` as a 1-pixel-high frame that [`TextDecoder`] reads back.
    pub fn text_frame(text: &str) -> Frame {
        let bytes = text.as_bytes().to_vec();
        Frame::new(bytes.len() as u32, 1, bytes).unwrap()
    }

    pub fn blank_frame() -> Frame {
        Frame::new(0, 0, Vec::new()).unwrap()
    }

    /// Treats frame bytes as UTF-8 payload text. Empty frames hold no symbol;
    /// invalid UTF-8 is a decode error.
    #[derive(Debug, Default)]
    pub struct TextDecoder;

    impl SymbolDecoder for TextDecoder {
        fn decode(&self, frame: &Frame) -> Result<Detection, DecodeError> {
            if frame.luma().is_empty() {
                return Ok(Detection::NotFound);
            }
            String::from_utf8(frame.luma().to_vec())
                .map(Detection::Found)
                .map_err(|e| DecodeError::Frame(e.to_string()))
        }
    }

    #[derive(Debug, Clone)]
    pub enum Script {
        Frames(Vec<Frame>),
        /// Frames pushed by the test through the sender.
        Live(Arc<parking_lot::Mutex<Option<mpsc::UnboundedReceiver<Frame>>>>),
        Deny(DeviceError),
        /// Acquisition never completes.
        Hang,
    }

    /// Camera that counts outstanding acquisitions.
    #[derive(Debug, Clone)]
    pub struct MockCamera {
        pub active: Arc<AtomicUsize>,
        pub acquisitions: Arc<AtomicUsize>,
        pub last_facing: Arc<parking_lot::Mutex<Option<Facing>>>,
        script: Script,
        fail_stop: bool,
    }

    impl MockCamera {
        pub fn with_frames(frames: Vec<Frame>) -> Self {
            Self::scripted(Script::Frames(frames))
        }

        pub fn live() -> (Self, mpsc::UnboundedSender<Frame>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let camera = Self::scripted(Script::Live(Arc::new(parking_lot::Mutex::new(Some(rx)))));
            (camera, tx)
        }

        pub fn denying(error: DeviceError) -> Self {
            Self::scripted(Script::Deny(error))
        }

        pub fn hanging() -> Self {
            Self::scripted(Script::Hang)
        }

        pub fn failing_stop(mut self) -> Self {
            self.fail_stop = true;
            self
        }

        fn scripted(script: Script) -> Self {
            Self {
                active: Arc::new(AtomicUsize::new(0)),
                acquisitions: Arc::new(AtomicUsize::new(0)),
                last_facing: Arc::new(parking_lot::Mutex::new(None)),
                script,
                fail_stop: false,
            }
        }

        pub fn active_count(&self) -> usize {
            self.active.load(Ordering::SeqCst)
        }

        pub fn acquisition_count(&self) -> usize {
            self.acquisitions.load(Ordering::SeqCst)
        }
    }

    enum Feed {
        Queue(VecDeque<Frame>),
        Channel(mpsc::UnboundedReceiver<Frame>),
    }

    struct MockSource {
        feed: Feed,
        active: Arc<AtomicUsize>,
        fail_stop: bool,
    }

    #[async_trait]
    impl FrameSource for MockSource {
        async fn next_frame(&mut self) -> Option<Frame> {
            match &mut self.feed {
                Feed::Queue(frames) => frames.pop_front(),
                Feed::Channel(rx) => rx.recv().await,
            }
        }

        fn stop(&mut self) -> Result<(), DeviceError> {
            self.active.fetch_sub(1, Ordering::SeqCst);
            if self.fail_stop {
                Err(DeviceError::StopFailed("track already ended".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Camera for MockCamera {
        async fn acquire(&self, facing: Facing) -> Result<Box<dyn FrameSource>, DeviceError> {
            *self.last_facing.lock() = Some(facing);
            if matches!(self.script, Script::Hang) {
                return std::future::pending().await;
            }
            let feed = match &self.script {
                Script::Frames(frames) => Feed::Queue(frames.iter().cloned().collect()),
                Script::Live(rx) => Feed::Channel(rx.lock().take().ok_or(DeviceError::Busy)?),
                Script::Deny(error) => return Err(error.clone()),
                Script::Hang => unreachable!(),
            };
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
            self.active.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockSource {
                feed,
                active: Arc::clone(&self.active),
                fail_stop: self.fail_stop,
            }))
        }
    }
}
