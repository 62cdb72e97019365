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

//! PWM fan output
//!
//! # Duty Cycle
//!
//! Duty is expressed as a percentage (0.0-100.0) everywhere in Pifan; the
//! GPIO backend converts it to the 0.0-1.0 fraction `rppal` expects.
//!
//! # Shutdown
//!
//! [`PwmActuator::shutdown`] stops the output and releases the pin. It only
//! touches hardware the first time it is called, and it also runs on drop, so
//! every exit path (signal, loop error, panic unwind) leaves the fan off and
//! the pin back in its original mode.

use pf_error::{PifanError, Result};
use rppal::gpio::{Gpio, OutputPin};
use tracing::{debug, info, warn};

use crate::curves::{DUTY_MAX, DUTY_MIN};

/// Hardware seam for the actuator
#[cfg_attr(test, mockall::automock)]
pub trait PwmBackend {
    /// Apply a duty cycle in percent (0.0-100.0)
    fn set_duty_cycle(&mut self, percent: f64) -> Result<()>;

    /// Stop PWM output and drive the pin low
    fn stop(&mut self) -> Result<()>;
}

/// Software PWM on a BCM-numbered GPIO pin
pub struct GpioPwm {
    pin_number: u8,
    frequency_hz: f64,
    pin: OutputPin,
}

impl GpioPwm {
    pub fn new(pin_number: u8, frequency_hz: u32) -> Result<Self> {
        let init_err = |e: rppal::gpio::Error| PifanError::PwmInit { pin: pin_number, reason: e.to_string() };

        let gpio = Gpio::new().map_err(init_err)?;
        let mut pin = gpio.get(pin_number).map_err(init_err)?.into_output_low();
        // Restore the pin's original mode when released
        pin.set_reset_on_drop(true);

        Ok(Self {
            pin_number,
            frequency_hz: f64::from(frequency_hz),
            pin,
        })
    }
}

impl PwmBackend for GpioPwm {
    fn set_duty_cycle(&mut self, percent: f64) -> Result<()> {
        self.pin
            .set_pwm_frequency(self.frequency_hz, percent / DUTY_MAX)
            .map_err(|e| PifanError::PwmWrite {
                pin: self.pin_number,
                reason: format!("Failed to set duty cycle {:.1}%: {}", percent, e),
            })
    }

    fn stop(&mut self) -> Result<()> {
        let result = self.pin.clear_pwm().map_err(|e| PifanError::PwmWrite {
            pin: self.pin_number,
            reason: format!("Failed to stop PWM: {}", e),
        });
        self.pin.set_low();
        result
    }
}

/// Owns the PWM backend for the lifetime of the controller
pub struct PwmActuator<B: PwmBackend> {
    pin: u8,
    backend: Option<B>,
    duty_cycle: f64,
}

impl PwmActuator<GpioPwm> {
    /// Configure `pin` for PWM output at `frequency_hz`, starting at 0%
    pub fn open(pin: u8, frequency_hz: u32) -> Result<Self> {
        let backend = GpioPwm::new(pin, frequency_hz)?;
        let actuator = Self::new(pin, backend)?;
        info!(pin, frequency_hz, "GPIO initialized");
        Ok(actuator)
    }
}

impl<B: PwmBackend> PwmActuator<B> {
    /// Wrap an already-configured backend and start it at 0% duty
    pub fn new(pin: u8, mut backend: B) -> Result<Self> {
        backend.set_duty_cycle(DUTY_MIN).map_err(|e| PifanError::PwmInit {
            pin,
            reason: format!("Failed to start PWM at 0%: {}", e),
        })?;
        Ok(Self {
            pin,
            backend: Some(backend),
            duty_cycle: DUTY_MIN,
        })
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Last duty cycle applied, 0 after shutdown
    pub fn duty_cycle(&self) -> f64 {
        self.duty_cycle
    }

    /// False once [`shutdown`](Self::shutdown) has run
    pub fn is_active(&self) -> bool {
        self.backend.is_some()
    }

    pub fn set_duty_cycle(&mut self, percent: f64) -> Result<()> {
        if !(DUTY_MIN..=DUTY_MAX).contains(&percent) {
            return Err(PifanError::InvalidPercentage { value: percent });
        }
        let backend = self.backend.as_mut().ok_or(PifanError::ActuatorReleased)?;
        backend.set_duty_cycle(percent)?;
        self.duty_cycle = percent;
        Ok(())
    }

    /// Stop the fan and release the pin. Safe to call any number of times.
    pub fn shutdown(&mut self) {
        let Some(mut backend) = self.backend.take() else {
            debug!(pin = self.pin, "PWM already released");
            return;
        };

        info!(pin = self.pin, "Cleaning up GPIO");
        if let Err(e) = backend.stop() {
            warn!(pin = self.pin, error = %e, "Failed to stop PWM cleanly");
        }
        self.duty_cycle = DUTY_MIN;
        // dropping the backend releases the pin
        drop(backend);
    }
}

impl<B: PwmBackend> Drop for PwmActuator<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
