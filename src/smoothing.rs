/*
 * This file is part of Pifan.
 *
 * Copyright (C) 2025 Pifan contributors
 *
 * Pifan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Pifan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Pifan. If not, see <https://www.gnu.org/licenses/>.
 */

//! Exponential smoothing of the fan duty cycle.
//!
//! Each cycle moves the current duty a fixed fraction of the way toward the
//! target: `current += (target - current) * factor`. A step change in target is
//! ~63% absorbed after roughly `1 / factor` cycles.

use crate::curves::{DUTY_MAX, DUTY_MIN};

/// Duty cycle currently applied to the fan, owned by the control loop
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerState {
    pub current_duty_cycle: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSmoother {
    smoothing_factor: f64,
}

impl SpeedSmoother {
    /// `smoothing_factor` is clamped to 0..=1; NaN disables movement
    pub fn new(smoothing_factor: f64) -> Self {
        let smoothing_factor = if smoothing_factor.is_nan() { 0.0 } else { smoothing_factor.clamp(0.0, 1.0) };
        Self { smoothing_factor }
    }

    pub fn smoothing_factor(&self) -> f64 {
        self.smoothing_factor
    }

    /// Advance `current` one step toward `target` and return the new value,
    /// which is always within 0..=100.
    pub fn apply(&self, target: f64, current: &mut f64) -> f64 {
        let prev = if current.is_nan() { DUTY_MIN } else { current.clamp(DUTY_MIN, DUTY_MAX) };
        let next = prev + (target - prev) * self.smoothing_factor;

        // inf * 0 and NaN targets leave the state where it was
        *current = if next.is_nan() { prev } else { next.clamp(DUTY_MIN, DUTY_MAX) };
        *current
    }

    pub fn step(&self, target: f64, state: &mut ControllerState) -> f64 {
        self.apply(target, &mut state.current_duty_cycle)
    }
}
