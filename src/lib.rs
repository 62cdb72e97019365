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

//! Pifan - temperature-driven PWM fan controller for Raspberry Pi
//!
//! Samples the CPU thermal zone, maps the reading onto a linear fan curve,
//! smooths the result and drives a GPIO pin with software PWM.

pub mod config;
pub mod curves;
pub mod logger;
pub mod pwm;
pub mod sensor;
pub mod service;
pub mod signals;
pub mod smoothing;

#[cfg(test)]
pub mod test_utils;

pub use pf_error::{PifanError, Result};
