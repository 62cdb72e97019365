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

//! Temperature to duty-cycle mapping.
//!
//! The curve is flat at 0% up to `temp_lower`, flat at 100% from `temp_upper`,
//! and linear in between.

use crate::config::FanConfig;

pub const DUTY_MIN: f64 = 0.0;
pub const DUTY_MAX: f64 = 100.0;

const FLOAT_EPSILON: f64 = 1e-9;

/// Target duty cycle (0..=100) for `temp_c` under `cfg`'s curve
pub fn target_duty_cycle(temp_c: f64, cfg: &FanConfig) -> f64 {
    interp_duty_percent(temp_c, cfg.temp_lower, cfg.temp_upper)
}

/// Linear ramp from 0% at `lower` to 100% at `upper`
pub fn interp_duty_percent(temp_c: f64, lower: f64, upper: f64) -> f64 {
    // Unknown temperature: run the fan
    if temp_c.is_nan() {
        return DUTY_MAX;
    }
    if temp_c <= lower {
        return DUTY_MIN;
    }
    if temp_c >= upper {
        return DUTY_MAX;
    }

    let temp_range = upper - lower;
    if temp_range < FLOAT_EPSILON {
        return DUTY_MAX;
    }
    let t = (temp_c - lower) / temp_range;
    (t * DUTY_MAX).clamp(DUTY_MIN, DUTY_MAX)
}
