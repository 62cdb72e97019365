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

//! Persisted controller configuration.
//!
//! The configuration lives in a small JSON document. Missing keys fall back to
//! the built-in defaults one field at a time; a missing file is created with
//! the defaults; a corrupt file is a fatal error.

use std::env;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pf_error::{PifanError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "/opt/pi4-fan/config.json";

/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`]
pub const CONFIG_PATH_ENV: &str = "PIFAN_CONFIG";

fn default_fan_pin() -> u8 { 14 } // GPIO 14 (header pin 8)
fn default_temp_lower() -> f64 { 45.0 }
fn default_temp_upper() -> f64 { 75.0 }
fn default_pwm_frequency() -> u32 { 100 }
fn default_update_interval() -> f64 { 2.0 }
fn default_smoothing_factor() -> f64 { 0.1 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanConfig {
    /// BCM GPIO number driving the fan transistor
    pub fan_pin: u8,
    /// At or below this temperature (°C) the fan is off
    pub temp_lower: f64,
    /// At or above this temperature (°C) the fan runs at 100%
    pub temp_upper: f64,
    /// Software PWM frequency in Hz
    pub pwm_frequency: u32,
    /// Seconds between control cycles
    pub update_interval: f64,
    /// EMA weight of the new target, 0..=1 (lower = smoother)
    pub smoothing_factor: f64,
}

impl Default for FanConfig {
    fn default() -> Self {
        Self {
            fan_pin: default_fan_pin(),
            temp_lower: default_temp_lower(),
            temp_upper: default_temp_upper(),
            pwm_frequency: default_pwm_frequency(),
            update_interval: default_update_interval(),
            smoothing_factor: default_smoothing_factor(),
        }
    }
}

/// On-disk shape of the config: every field optional so a partial document
/// still parses. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct PartialConfig {
    pub fan_pin: Option<u8>,
    pub temp_lower: Option<f64>,
    pub temp_upper: Option<f64>,
    pub pwm_frequency: Option<u32>,
    pub update_interval: Option<f64>,
    pub smoothing_factor: Option<f64>,
}

impl FanConfig {
    /// Overwrite only the fields present in `partial`
    pub fn merged(self, partial: PartialConfig) -> Self {
        Self {
            fan_pin: partial.fan_pin.unwrap_or(self.fan_pin),
            temp_lower: partial.temp_lower.unwrap_or(self.temp_lower),
            temp_upper: partial.temp_upper.unwrap_or(self.temp_upper),
            pwm_frequency: partial.pwm_frequency.unwrap_or(self.pwm_frequency),
            update_interval: partial.update_interval.unwrap_or(self.update_interval),
            smoothing_factor: partial.smoothing_factor.unwrap_or(self.smoothing_factor),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.temp_lower.is_finite() {
            return Err(PifanError::invalid_config("temp_lower", "must be a finite number"));
        }
        if !self.temp_upper.is_finite() {
            return Err(PifanError::invalid_config("temp_upper", "must be a finite number"));
        }
        if self.temp_lower >= self.temp_upper {
            return Err(PifanError::invalid_config(
                "temp_upper",
                format!("must be greater than temp_lower ({} >= {})", self.temp_lower, self.temp_upper),
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing_factor) {
            return Err(PifanError::invalid_config("smoothing_factor", "must be within 0..=1"));
        }
        if self.pwm_frequency == 0 {
            return Err(PifanError::invalid_config("pwm_frequency", "must be greater than 0"));
        }
        if !self.update_interval.is_finite() || self.update_interval <= 0.0 {
            return Err(PifanError::invalid_config("update_interval", "must be a positive number of seconds"));
        }
        if Duration::try_from_secs_f64(self.update_interval).is_err() {
            return Err(PifanError::invalid_config(
                "update_interval",
                format!("{} seconds is too long", self.update_interval),
            ));
        }
        Ok(())
    }

    /// Sleep between cycles. Falls back to the default interval when
    /// `update_interval` cannot be represented as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.update_interval)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_update_interval()))
    }
}

pub fn default_config_path() -> PathBuf {
    match env::var(CONFIG_PATH_ENV) {
        Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

/// Load the configuration at `path`, creating it with defaults if absent.
pub fn load_config(path: &Path) -> Result<FanConfig> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("No config at {}, writing defaults", path.display());
            let defaults = FanConfig::default();
            write_config(path, &defaults)?;
            return Ok(defaults);
        }
        Err(source) => {
            return Err(PifanError::FileRead { path: path.to_path_buf(), source });
        }
    };

    let partial: PartialConfig = serde_json::from_str(&data)
        .map_err(|source| PifanError::ConfigParse { path: path.to_path_buf(), source })?;
    debug!(?partial, "Parsed config document");

    let cfg = FanConfig::default().merged(partial);
    cfg.validate()?;
    Ok(cfg)
}

pub fn write_config(path: &Path, cfg: &FanConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|source| PifanError::FileWrite { path: parent.to_path_buf(), source })?;
        }
    }
    let write_err = |source: io::Error| PifanError::FileWrite { path: path.to_path_buf(), source };
    let json = serde_json::to_string_pretty(cfg).map_err(|e| write_err(e.into()))?;
    fs::write(path, json).map_err(write_err)?;
    // Best-effort 0644 so the config stays readable to unprivileged users
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o644));
    Ok(())
}
