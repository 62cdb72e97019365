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

//! Fan control loop
//!
//! Reads the CPU temperature, maps it to a target duty cycle, smooths it and
//! drives the PWM pin, once per `update_interval`.
//!
//! # Lifecycle
//! - **Starting**: config, GPIO and signal handlers; any failure aborts
//! - **Running**: one cycle, then a wait that a shutdown signal can cut short
//! - **Terminating**: the actuator is shut down exactly once, from this task,
//!   whether the loop ended on a signal or on an error

use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use pf_error::Result;
use tracing::{debug, error, info};

use crate::config::{self, FanConfig};
use crate::curves::target_duty_cycle;
use crate::pwm::{PwmActuator, PwmBackend};
use crate::sensor::TemperatureSensor;
use crate::signals::{ShutdownSignal, ShutdownSignals};
use crate::smoothing::{ControllerState, SpeedSmoother};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Running,
    Terminating,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Starting => write!(f, "starting"),
            Phase::Running => write!(f, "running"),
            Phase::Terminating => write!(f, "terminating"),
        }
    }
}

/// What one cycle read and applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub temperature: f64,
    pub target: f64,
    pub actual: f64,
}

pub struct ControlLoop<B: PwmBackend> {
    config: FanConfig,
    sensor: TemperatureSensor,
    smoother: SpeedSmoother,
    actuator: PwmActuator<B>,
    state: ControllerState,
    phase: Phase,
}

impl<B: PwmBackend> ControlLoop<B> {
    pub fn new(config: FanConfig, sensor: TemperatureSensor, actuator: PwmActuator<B>) -> Self {
        let smoother = SpeedSmoother::new(config.smoothing_factor);
        Self {
            config,
            sensor,
            smoother,
            actuator,
            state: ControllerState::default(),
            phase: Phase::Starting,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = %self.phase, to = %phase, "Control loop phase change");
        self.phase = phase;
    }

    /// Sample, map, smooth, actuate. Sensor faults are absorbed by the sensor;
    /// an error here means the actuator could not be driven.
    pub fn cycle(&mut self) -> Result<CycleReport> {
        let temperature = self.sensor.read();
        let target = target_duty_cycle(temperature, &self.config);
        let actual = self.smoother.step(target, &mut self.state);

        self.actuator.set_duty_cycle(actual)?;

        info!(
            temp_c = temperature,
            target_pct = target,
            actual_pct = actual,
            "Temp: {:.1}°C, Target PWM: {:.1}%, Actual PWM: {:.1}%",
            temperature, target, actual
        );
        Ok(CycleReport { temperature, target, actual })
    }

    /// Run until `shutdown` resolves or a cycle fails. The actuator is shut
    /// down before returning on either path.
    pub async fn run<F>(mut self, shutdown: F) -> Result<ShutdownSignal>
    where
        F: Future<Output = ShutdownSignal>,
    {
        tokio::pin!(shutdown);
        let interval = self.config.interval();

        self.enter(Phase::Running);
        info!(pin = self.actuator.pin(), ?interval, "Fan controller started");

        loop {
            if let Err(e) = self.cycle() {
                error!("Error in main loop: {}", e);
                self.terminate();
                return Err(e);
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                signal = &mut shutdown => {
                    info!(%signal, "Received {}, shutting down", signal);
                    self.terminate();
                    return Ok(signal);
                }
            }
        }
    }

    fn terminate(&mut self) {
        self.enter(Phase::Terminating);
        self.actuator.shutdown();
    }
}

/// Startup inputs for [`run_service`]
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub config_path: PathBuf,
    pub sensor: TemperatureSensor,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            config_path: config::default_config_path(),
            sensor: TemperatureSensor::default(),
        }
    }
}

/// Start the controller on real GPIO hardware and run it until SIGINT/SIGTERM.
pub async fn run_service(opts: ServiceOptions) -> Result<ShutdownSignal> {
    info!(phase = %Phase::Starting, config = %opts.config_path.display(), "Starting fan controller");

    let cfg = config::load_config(&opts.config_path)?;
    info!(
        fan_pin = cfg.fan_pin,
        temp_lower = cfg.temp_lower,
        temp_upper = cfg.temp_upper,
        pwm_frequency = cfg.pwm_frequency,
        update_interval = cfg.update_interval,
        smoothing_factor = cfg.smoothing_factor,
        "Configuration loaded"
    );

    let actuator = PwmActuator::open(cfg.fan_pin, cfg.pwm_frequency)?;
    // The actuator is dropped (and the pin released) if this fails
    let signals = ShutdownSignals::register()?;

    ControlLoop::new(cfg, opts.sensor, actuator).run(signals.recv()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pwm::MockPwmBackend;
    use crate::test_utils::test_utils::write_sensor_file;
    use mockall::predicate::{eq, gt};
    use pf_error::PifanError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    fn test_config(update_interval: f64) -> FanConfig {
        FanConfig { update_interval, ..FanConfig::default() }
    }

    /// Mock that accepts any duty cycle and counts `stop` calls
    fn counting_mock(stops: Arc<AtomicUsize>) -> MockPwmBackend {
        let mut mock = MockPwmBackend::new();
        mock.expect_set_duty_cycle().returning(|_| Ok(()));
        mock.expect_stop().returning(move || {
            stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        mock
    }

    #[test]
    fn test_cycle_at_midpoint() {
        let (_dir, path) = write_sensor_file("60000");
        let stops = Arc::new(AtomicUsize::new(0));
        let actuator = PwmActuator::new(14, counting_mock(stops)).unwrap();
        let mut control = ControlLoop::new(test_config(2.0), TemperatureSensor::new(&path), actuator);

        let report = control.cycle().unwrap();
        assert_eq!(report.temperature, 60.0);
        assert_eq!(report.target, 50.0);
        assert!((report.actual - 5.0).abs() < 1e-9);
        assert_eq!(control.state().current_duty_cycle, report.actual);
        assert_eq!(control.phase(), Phase::Starting);
    }

    #[test]
    fn test_cycle_applies_smoothed_value() {
        let (_dir, path) = write_sensor_file("90000");
        let mut mock = MockPwmBackend::new();
        mock.expect_set_duty_cycle().with(eq(0.0)).times(1).returning(|_| Ok(()));
        mock.expect_set_duty_cycle().with(eq(10.0)).times(1).returning(|_| Ok(()));
        mock.expect_stop().times(1).returning(|| Ok(()));

        let actuator = PwmActuator::new(14, mock).unwrap();
        let mut control = ControlLoop::new(test_config(2.0), TemperatureSensor::new(&path), actuator);
        let report = control.cycle().unwrap();
        assert_eq!(report.target, 100.0);
        assert_eq!(report.actual, 10.0);
    }

    #[test]
    fn test_sensor_failure_keeps_cycling() {
        let dir = TempDir::new().unwrap();
        let stops = Arc::new(AtomicUsize::new(0));
        let actuator = PwmActuator::new(14, counting_mock(stops.clone())).unwrap();
        let mut control = ControlLoop::new(
            test_config(2.0),
            TemperatureSensor::new(dir.path().join("no-such-zone")),
            actuator,
        );

        for _ in 0..3 {
            let report = control.cycle().unwrap();
            assert_eq!(report.temperature, 0.0);
            assert_eq!(report.target, 0.0);
            assert_eq!(report.actual, 0.0);
        }
        assert_eq!(stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_signal_mid_sleep_shuts_down_once() {
        let (_dir, path) = write_sensor_file("50000");
        let stops = Arc::new(AtomicUsize::new(0));
        let actuator = PwmActuator::new(14, counting_mock(stops.clone())).unwrap();
        // long interval: the loop is guaranteed to be sleeping when the signal lands
        let control = ControlLoop::new(test_config(3600.0), TemperatureSensor::new(&path), actuator);

        let (tx, rx) = oneshot::channel::<ShutdownSignal>();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(ShutdownSignal::Terminate);
        });
        let shutdown = async move { rx.await.unwrap_or(ShutdownSignal::Interrupt) };

        let outcome = tokio::time::timeout(Duration::from_secs(5), control.run(shutdown))
            .await
            .expect("loop did not stop on signal");
        assert_eq!(outcome.unwrap(), ShutdownSignal::Terminate);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_actuator_error_terminates_with_single_shutdown() {
        let (_dir, path) = write_sensor_file("70000");
        let mut mock = MockPwmBackend::new();
        mock.expect_set_duty_cycle().with(eq(0.0)).times(1).returning(|_| Ok(()));
        mock.expect_set_duty_cycle()
            .with(gt(0.0))
            .returning(|_| Err(PifanError::PwmWrite { pin: 14, reason: "pin vanished".into() }));
        mock.expect_stop().times(1).returning(|| Ok(()));

        let actuator = PwmActuator::new(14, mock).unwrap();
        let control = ControlLoop::new(test_config(0.01), TemperatureSensor::new(&path), actuator);

        let result = control.run(std::future::pending::<ShutdownSignal>()).await;
        assert!(matches!(result, Err(PifanError::PwmWrite { .. })));
    }

    #[tokio::test]
    async fn test_loop_keeps_cycling_until_signal() {
        let (_dir, path) = write_sensor_file("75000");
        let applied = Arc::new(AtomicUsize::new(0));
        let applied_in_mock = applied.clone();
        let mut mock = MockPwmBackend::new();
        mock.expect_set_duty_cycle().returning(move |_| {
            applied_in_mock.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        mock.expect_stop().times(1).returning(|| Ok(()));

        let actuator = PwmActuator::new(14, mock).unwrap();
        let control = ControlLoop::new(test_config(0.005), TemperatureSensor::new(&path), actuator);

        let (tx, rx) = oneshot::channel::<ShutdownSignal>();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = tx.send(ShutdownSignal::Interrupt);
        });
        let outcome = control
            .run(async move { rx.await.unwrap_or(ShutdownSignal::Interrupt) })
            .await
            .unwrap();

        assert_eq!(outcome, ShutdownSignal::Interrupt);
        // initial 0% plus several cycles
        assert!(applied.load(Ordering::SeqCst) > 3);
    }

    #[tokio::test]
    async fn test_run_service_corrupt_config_fails_before_running() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "not json").unwrap();

        let opts = ServiceOptions {
            config_path,
            sensor: TemperatureSensor::new(dir.path().join("temp")),
        };
        assert!(matches!(run_service(opts).await, Err(PifanError::ConfigParse { .. })));
    }

    #[tokio::test]
    async fn test_run_service_rejects_unrepresentable_interval_at_startup() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "update_interval": 1e20 }"#).unwrap();

        let opts = ServiceOptions {
            config_path,
            sensor: TemperatureSensor::new(dir.path().join("temp")),
        };
        match run_service(opts).await {
            Err(PifanError::InvalidConfig { field, .. }) => assert_eq!(field, "update_interval"),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }
}
