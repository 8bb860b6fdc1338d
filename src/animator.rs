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

//! Balance presentation animator.
//!
//! Eases the displayed balance toward the latest authoritative value. The
//! displayed number is cosmetic; anything that computes with the balance
//! should read [`BalanceAnimator::authoritative`].

use rust_decimal::Decimal;
use std::time::{Duration, Instant};

pub const DEFAULT_DURATION: Duration = Duration::from_millis(600);

#[derive(Debug, Clone)]
pub struct BalanceAnimator {
    duration: Duration,
    from: Decimal,
    target: Decimal,
    started: Option<Instant>,
    displayed: Decimal,
}

impl BalanceAnimator {
    /// Starts at rest on `initial`.
    pub fn new(duration: Duration, initial: Decimal) -> Self {
        Self {
            duration,
            from: initial,
            target: initial,
            started: None,
            displayed: initial,
        }
    }

    pub fn authoritative(&self) -> Decimal {
        self.target
    }

    pub fn displayed(&self) -> Decimal {
        self.displayed
    }

    pub fn is_settled(&self) -> bool {
        self.started.is_none()
    }

    /// Animates from whatever is displayed now toward `target`.
    pub fn set_target(&mut self, target: Decimal, now: Instant) {
        self.from = self.displayed;
        self.target = target;
        if self.duration.is_zero() || self.from == target {
            self.displayed = target;
            self.started = None;
        } else {
            self.started = Some(now);
        }
    }

    /// Displayed value at `now`.
    ///
    /// Intermediate values are floored to whole units and stay between the
    /// start and the target. Once the duration has elapsed the target is
    /// shown exactly.
    pub fn sample(&mut self, now: Instant) -> Decimal {
        let Some(started) = self.started else {
            return self.displayed;
        };

        let elapsed = now.saturating_duration_since(started);
        if elapsed.is_zero() {
            return self.displayed;
        }
        if elapsed >= self.duration {
            self.displayed = self.target;
            self.started = None;
            return self.displayed;
        }

        let progress = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let eased = Decimal::try_from(ease_out_cubic(progress)).unwrap_or(Decimal::ONE);
        let (low, high) = if self.from <= self.target {
            (self.from, self.target)
        } else {
            (self.target, self.from)
        };

        let value = (self.from + (self.target - self.from) * eased)
            .floor()
            .clamp(low, high);

        // Samples never move back toward the start.
        self.displayed = if self.target >= self.from {
            value.max(self.displayed)
        } else {
            value.min(self.displayed)
        };
        self.displayed
    }
}

fn ease_out_cubic(t: f64) -> f64 {
    let inv = 1.0 - t.clamp(0.0, 1.0);
    1.0 - inv * inv * inv
}
