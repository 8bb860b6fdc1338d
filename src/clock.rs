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

//! Clock abstraction for wall-clock hours and monotonic animation time.
//!
//! Production code reads the system clock; tests use [`ManualClock`] to pin
//! the local hour and advance time without sleeping.

use chrono::{DateTime, FixedOffset, Local, TimeDelta, Timelike, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time, used for trailing-window comparisons.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Hour of day (0..24) in the device's local time zone.
    fn local_hour(&self) -> u32;

    /// Monotonic instant for animation sampling.
    fn instant(&self) -> Instant;
}

pub type SharedClock = Arc<dyn Clock>;

/// Reads the operating system clocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn shared() -> SharedClock {
        Arc::new(Self)
    }
}

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_hour(&self) -> u32 {
        Local::now().hour()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

/// Controllable clock for tests.
///
/// Wall-clock time is held with a fixed UTC offset so the local hour is
/// deterministic. [`advance`](ManualClock::advance) moves both the wall clock
/// and the monotonic instant.
#[derive(Debug)]
pub struct ManualClock {
    wall: Mutex<DateTime<FixedOffset>>,
    base_instant: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new(wall: DateTime<FixedOffset>) -> Self {
        Self {
            wall: Mutex::new(wall),
            base_instant: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Clock pinned to `hour:00` local time on an arbitrary fixed date, UTC offset zero.
    pub fn at_hour(hour: u32) -> Self {
        let wall = DateTime::parse_from_rfc3339("2025-03-10T00:00:00+00:00")
            .unwrap_or_default()
            .with_hour(hour.min(23))
            .unwrap_or_default();
        Self::new(wall)
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::zero());
        let mut wall = self.wall.lock();
        *wall += delta;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.wall.lock().with_timezone(&Utc)
    }

    fn local_hour(&self) -> u32 {
        self.wall.lock().hour()
    }

    fn instant(&self) -> Instant {
        self.base_instant + *self.elapsed.lock()
    }
}
