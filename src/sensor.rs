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

//! CPU temperature sensor.
//!
//! The kernel thermal zone reports millidegrees Celsius (e.g. 45000 = 45.0°C)
//! as the whole content of a sysfs file.

use std::fs;
use std::path::{Path, PathBuf};

use pf_error::{PifanError, Result};
use tracing::error;

pub const CPU_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

const MILLIDEGREE_DIVISOR: f64 = 1000.0;

/// Reading reported when the sensor cannot be read.
// TODO: a dead sensor currently spins the fan down; decide whether to fail hot instead.
pub const SENSOR_FAILURE_READING: f64 = 0.0;

/// Read a millidegree sysfs file and return degrees Celsius
pub fn read_temperature(path: &Path) -> Result<f64> {
    let content = fs::read_to_string(path).map_err(|e| PifanError::TemperatureRead {
        path: path.to_path_buf(),
        reason: format!("Failed to read: {}", e),
    })?;

    let millidegrees = content.trim().parse::<f64>().map_err(|e| PifanError::TemperatureRead {
        path: path.to_path_buf(),
        reason: format!("Failed to parse '{}': {}", content.trim(), e),
    })?;

    let celsius = millidegrees / MILLIDEGREE_DIVISOR;
    if !celsius.is_finite() {
        return Err(PifanError::TemperatureRead {
            path: path.to_path_buf(),
            reason: format!("Non-finite reading '{}'", content.trim()),
        });
    }
    Ok(celsius)
}

#[derive(Debug, Clone)]
pub struct TemperatureSensor {
    path: PathBuf,
}

impl TemperatureSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sample the sensor. Never fails: a read error is logged and
    /// [`SENSOR_FAILURE_READING`] is returned instead.
    pub fn read(&self) -> f64 {
        match read_temperature(&self.path) {
            Ok(t) => t,
            Err(e) => {
                error!(path = %self.path.display(), "Error reading temperature: {}", e);
                SENSOR_FAILURE_READING
            }
        }
    }
}

impl Default for TemperatureSensor {
    fn default() -> Self {
        Self::new(CPU_THERMAL_ZONE)
    }
}
