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

//! Bundled QR decoding and a file-backed camera.

use crate::decoder::{Camera, Detection, Facing, Frame, FrameSource, SymbolDecoder};
use crate::error::{DecodeError, DeviceError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// QR symbol decoder backed by `rqrr`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl SymbolDecoder for QrDecoder {
    fn decode(&self, frame: &Frame) -> Result<Detection, DecodeError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Detection::NotFound);
        }

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            frame.width() as usize,
            frame.height() as usize,
            |x, y| frame.pixel(x, y).unwrap_or(u8::MAX),
        );

        // A frame may contain several candidate grids; the first readable one wins.
        let mut last_error = None;
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_, content)) => return Ok(Detection::Found(content)),
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(DecodeError::Frame(format!("{e:?}"))),
            None => Ok(Detection::NotFound),
        }
    }
}

/// Camera that replays image files from a directory, in file name order.
///
/// Stands in for a capture device on terminals that have none. Only one
/// stream can be open at a time.
#[derive(Debug, Clone)]
pub struct ReplayCamera {
    dir: PathBuf,
    frame_interval: Duration,
    in_use: Arc<AtomicBool>,
}

impl ReplayCamera {
    /// Ten frames per second, like a typical scanner preview.
    pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            frame_interval: Self::DEFAULT_FRAME_INTERVAL,
            in_use: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    async fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, DeviceError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|_| DeviceError::NotFound)?;
        let mut paths = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "frame directory listing failed");
                    return Err(DeviceError::NotFound);
                }
            };
            match entry.file_type().await {
                Ok(kind) if kind.is_file() => paths.push(entry.path()),
                Ok(_) => {}
                Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping frame entry"),
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl Camera for ReplayCamera {
    async fn acquire(&self, facing: Facing) -> Result<Box<dyn FrameSource>, DeviceError> {
        // Reserve only after the last await so a dropped acquisition holds nothing.
        let paths = Self::list_frames(&self.dir).await?;
        if self
            .in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DeviceError::Busy);
        }
        debug!(dir = %self.dir.display(), frames = paths.len(), ?facing, "replay camera opened");

        Ok(Box::new(ReplaySource {
            paths: paths.into_iter(),
            frame_interval: self.frame_interval,
            started: false,
            in_use: Arc::clone(&self.in_use),
        }))
    }
}

struct ReplaySource {
    paths: std::vec::IntoIter<PathBuf>,
    frame_interval: Duration,
    started: bool,
    in_use: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSource for ReplaySource {
    async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            if self.started {
                tokio::time::sleep(self.frame_interval).await;
            }
            self.started = true;

            let path = self.paths.next()?;
            let loaded = match tokio::fs::read(&path).await {
                Ok(bytes) => tokio::task::spawn_blocking(move || Frame::from_encoded(&bytes))
                    .await
                    .unwrap_or_else(|e| Err(DecodeError::UnreadableImage(e.to_string()))),
                Err(e) => Err(DecodeError::UnreadableImage(e.to_string())),
            };
            match loaded {
                Ok(frame) => return Some(frame),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable frame file"),
            }
        }
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.in_use.store(false, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{decode_still, CameraHandle};
    use image::{GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    fn blank_png(size: u32) -> Vec<u8> {
        let image = GrayImage::from_pixel(size, size, Luma([255]));
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        png
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("campus-wallet-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn blank_image_has_no_symbol() {
        assert_eq!(decode_still(&QrDecoder, &blank_png(64)), Ok(Detection::NotFound));
    }

    #[test]
    fn empty_frame_has_no_symbol() {
        let frame = Frame::new(0, 0, Vec::new()).unwrap();
        assert_eq!(QrDecoder.decode(&frame), Ok(Detection::NotFound));
    }

    #[tokio::test]
    async fn replay_camera_reads_frames_in_name_order() {
        let dir = scratch_dir("replay");
        std::fs::write(dir.join("02.png"), blank_png(4)).unwrap();
        std::fs::write(dir.join("01.png"), blank_png(2)).unwrap();
        std::fs::write(dir.join("03.txt"), b"not a frame").unwrap();

        let camera = ReplayCamera::new(&dir).with_frame_interval(Duration::ZERO);
        let mut source = camera.acquire(Facing::Rear).await.unwrap();

        assert_eq!(source.next_frame().await.map(|f| f.width()), Some(2));
        assert_eq!(source.next_frame().await.map(|f| f.width()), Some(4));
        assert!(source.next_frame().await.is_none());
        source.stop().unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn replay_camera_skips_subdirectories() {
        let dir = scratch_dir("subdirs");
        std::fs::create_dir_all(dir.join("00-archive")).unwrap();
        std::fs::write(dir.join("00-archive").join("old.png"), blank_png(8)).unwrap();
        std::fs::write(dir.join("01.png"), blank_png(3)).unwrap();

        let camera = ReplayCamera::new(&dir).with_frame_interval(Duration::ZERO);
        let mut source = camera.acquire(Facing::Rear).await.unwrap();

        assert_eq!(source.next_frame().await.map(|f| f.width()), Some(3));
        assert!(source.next_frame().await.is_none());
        source.stop().unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn replay_camera_is_exclusive() {
        let dir = scratch_dir("exclusive");
        let camera = ReplayCamera::new(&dir);

        let handle = CameraHandle::acquire(&camera, Facing::Rear).await.unwrap();
        assert!(matches!(
            camera.acquire(Facing::Rear).await,
            Err(DeviceError::Busy)
        ));

        handle.release().unwrap();
        assert!(camera.acquire(Facing::Rear).await.is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_directory_is_not_found() {
        let camera = ReplayCamera::new("/nonexistent/campus-wallet-frames");
        assert!(matches!(
            camera.acquire(Facing::Rear).await,
            Err(DeviceError::NotFound)
        ));
        assert!(!camera.in_use.load(Ordering::Acquire));
    }
}
