//! Control loop
//!
//! Samples telemetry, evaluates the fan law and commits the duty cycle at a
//! fixed interval until asked to stop.

use crate::domain::{FanLaw, FanSpeed, GpuSample};
use crate::error::ServiceError;
use crate::nvml::GpuDevice;
use crate::services::{FanActuator, TelemetryAggregator, Watchdog};

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Granularity of the interruptible sleep between ticks
const SLEEP_STEP: Duration = Duration::from_millis(100);

/// Loop timing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    /// Interval between control ticks
    pub interval: Duration,
    /// Longest a sample may take before the tick is discarded
    pub sample_timeout: Duration,
    /// Stop after this many ticks
    pub max_ticks: Option<u64>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            sample_timeout: Duration::from_secs(2),
            max_ticks: None,
        }
    }
}

/// Result of one successful tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// The sample the decision was made on
    pub sample: GpuSample,
    /// The duty cycle chosen by the fan law
    pub duty: FanSpeed,
    /// Whether the actuator accepted the command
    pub applied: bool,
}

/// Counters reported when the loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    /// Ticks attempted
    pub ticks: u64,
    /// Ticks whose sample failed or timed out
    pub skipped: u64,
    /// Ticks whose fan command was rejected
    pub actuator_failures: u64,
}

/// The fan controller for one GPU
pub struct Controller<D: GpuDevice> {
    telemetry: TelemetryAggregator<D>,
    law: FanLaw,
    actuator: Box<dyn FanActuator>,
    watchdog: Box<dyn Watchdog>,
    settings: LoopSettings,
    last_duty: Option<FanSpeed>,
    released: bool,
}

impl<D: GpuDevice> Controller<D> {
    /// Assemble a controller
    pub fn new(
        telemetry: TelemetryAggregator<D>,
        law: FanLaw,
        actuator: Box<dyn FanActuator>,
        watchdog: Box<dyn Watchdog>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            telemetry,
            law,
            actuator,
            watchdog,
            settings,
            last_duty: None,
            released: false,
        }
    }

    /// One pass of sample, decide, actuate
    ///
    /// A failed or slow sample fails the tick and nothing is sent to the
    /// fans. A rejected fan command is logged and reported through
    /// `TickReport::applied`; the next tick tries again.
    pub fn tick(&mut self) -> Result<TickReport, ServiceError> {
        let started = Instant::now();
        let sample = self.telemetry.sample()?;
        let elapsed = started.elapsed();
        if elapsed > self.settings.sample_timeout {
            return Err(ServiceError::SampleTimeout {
                elapsed_ms: elapsed.as_millis() as u64,
                timeout_ms: self.settings.sample_timeout.as_millis() as u64,
            });
        }

        let duty = self.law.evaluate(&sample);

        if self.last_duty != Some(duty) {
            match sample.memory_temperature() {
                Some(mem) => log::info!(
                    "core {} mem {} -> fan {}",
                    sample.core_temperature(),
                    mem,
                    duty
                ),
                None => log::info!("core {} -> fan {}", sample.core_temperature(), duty),
            }
        } else {
            log::debug!(
                "effective {} -> fan {}",
                sample.effective_temperature(),
                duty
            );
        }

        let applied = match self.actuator.set_fan_duty(duty) {
            Ok(()) => {
                self.last_duty = Some(duty);
                true
            }
            Err(e) => {
                log::warn!(
                    "{} actuator failed to set fan speed to {}: {}",
                    self.actuator.name(),
                    duty,
                    e
                );
                self.last_duty = None;
                false
            }
        };

        Ok(TickReport {
            sample,
            duty,
            applied,
        })
    }

    /// Run until `shutdown` is set or the tick limit is reached
    ///
    /// Fans are released to automatic control before returning.
    pub fn run(&mut self, shutdown: &AtomicBool) -> LoopSummary {
        let mut summary = LoopSummary::default();

        log::info!(
            "Fan control started: {} to {} (floor {}), every {:?} via {}",
            self.law.threshold(),
            self.law.max(),
            self.law.min_duty(),
            self.settings.interval,
            self.actuator.name()
        );
        self.watchdog.ready();

        while !shutdown.load(Ordering::SeqCst) {
            summary.ticks += 1;
            match self.tick() {
                Ok(report) if report.applied => self.watchdog.notify_alive(),
                Ok(_) => summary.actuator_failures += 1,
                Err(e) => {
                    log::warn!("Skipping control tick: {}", e);
                    summary.skipped += 1;
                }
            }

            if let Some(max) = self.settings.max_ticks {
                if summary.ticks >= max {
                    log::info!("Reached {} tick(s), exiting", max);
                    break;
                }
            }

            sleep_interruptible(self.settings.interval, shutdown);
        }

        self.shutdown();
        log::info!(
            "Fan control stopped after {} tick(s): {} skipped, {} actuator failure(s)",
            summary.ticks,
            summary.skipped,
            summary.actuator_failures
        );
        summary
    }

    /// Release the fans and the memory mapping; runs at most once
    pub fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        self.watchdog.stopping();
        if let Err(e) = self.actuator.release() {
            log::error!("Failed to return fans to automatic control: {}", e);
        }
        self.telemetry.close();
    }

    /// The fan law in effect
    pub fn law(&self) -> &FanLaw {
        &self.law
    }

    /// The loop timing in effect
    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// The telemetry aggregator
    pub fn telemetry(&self) -> &TelemetryAggregator<D> {
        &self.telemetry
    }
}

impl<D: GpuDevice> Drop for Controller<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sleep for `duration`, waking early once `shutdown` is set
fn sleep_interruptible(duration: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + duration;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep(SLEEP_STEP.min(deadline - now));
    }
}
