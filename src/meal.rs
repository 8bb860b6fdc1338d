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

//! Meal types, vendor meal selection, and wall-clock meal slots.

use crate::error::RedemptionError;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of meal a vendor charges for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    /// Preset price shown on the terminal's meal buttons.
    pub fn preset_cost(self) -> Decimal {
        match self {
            MealType::Breakfast => dec!(30),
            MealType::Lunch => dec!(70),
            MealType::Dinner => dec!(60),
            MealType::Snack => dec!(20),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
            MealType::Snack => "Snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Meal type and price the vendor is currently charging.
///
/// The cost is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MealSelection {
    meal_type: MealType,
    cost: Decimal,
}

impl MealSelection {
    pub fn new(meal_type: MealType, cost: Decimal) -> Result<Self, RedemptionError> {
        if cost < Decimal::ZERO {
            return Err(RedemptionError::InvalidCost);
        }
        Ok(Self { meal_type, cost })
    }

    /// Selection at the preset price for `meal_type`.
    pub fn preset(meal_type: MealType) -> Self {
        Self {
            meal_type,
            cost: meal_type.preset_cost(),
        }
    }

    pub fn meal_type(&self) -> MealType {
        self.meal_type
    }

    pub fn cost(&self) -> Decimal {
        self.cost
    }
}

impl Default for MealSelection {
    fn default() -> Self {
        Self::preset(MealType::Lunch)
    }
}

/// Meal selection shared between the vendor's controls and the terminal.
///
/// The terminal takes a [`snapshot`](SharedSelection::snapshot) at the moment a
/// payload is submitted, so changes made while the scanner is running apply
/// to that scan.
#[derive(Debug, Clone, Default)]
pub struct SharedSelection {
    inner: Arc<Mutex<MealSelection>>,
}

impl SharedSelection {
    pub fn new(selection: MealSelection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(selection)),
        }
    }

    /// Switches to `meal_type` at its preset price.
    pub fn select_preset(&self, meal_type: MealType) {
        *self.inner.lock() = MealSelection::preset(meal_type);
    }

    /// Adjusts the price while keeping the meal type.
    pub fn set_cost(&self, cost: Decimal) -> Result<(), RedemptionError> {
        let mut selection = self.inner.lock();
        *selection = MealSelection::new(selection.meal_type, cost)?;
        Ok(())
    }

    pub fn snapshot(&self) -> MealSelection {
        *self.inner.lock()
    }
}

/// Meal window derived from the local hour.
///
/// Display and nudge gating only; never sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Unknown,
}

impl MealSlot {
    /// `[7,11)` breakfast, `[11,15)` lunch, `[18,22)` dinner, otherwise unknown.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            7..=10 => MealSlot::Breakfast,
            11..=14 => MealSlot::Lunch,
            18..=21 => MealSlot::Dinner,
            _ => MealSlot::Unknown,
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MealSlot::Breakfast => "Breakfast",
            MealSlot::Lunch => "Lunch",
            MealSlot::Dinner => "Dinner",
            MealSlot::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}
