// SeismoNode: Seismic Monitor Task
//
// Cooperative sampling pipeline. Every tick it may read the MPU6050, keep the
// sample in history, turn threshold crossings into events, and push events
// and periodic status reports through a `Publisher`.

use crate::config::MonitorConfig;
use crate::drivers::imu::{CalibrationOffsets, Mpu6050, Thresholds};
use crate::error::SensorError;
use crate::events::{EventKind, SeismicEvent, SensorSample, StatusReport};
use crate::hal::{Clock, RegisterBus};
use crate::history::SampleHistory;
use crate::net::publish::{Endpoint, Publisher};

// ---------------------------------------------------------------------------
// Sensor health
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy)]
pub struct HealthState {
    initialized: bool,
    consecutive_errors: u32,
    max_errors: u32,
}

impl HealthState {
    pub fn new(max_errors: u32) -> Self {
        Self {
            initialized: false,
            consecutive_errors: 0,
            max_errors,
        }
    }

    /// The one health predicate: initialized and under half the error budget.
    pub fn is_ok(&self) -> bool {
        self.initialized && self.consecutive_errors < self.max_errors / 2
    }

    pub fn errors(&self) -> u32 {
        self.consecutive_errors
    }

    fn record_success(&mut self) {
        self.consecutive_errors = self.consecutive_errors.saturating_sub(1);
    }

    /// Returns true once the error budget is spent.
    fn record_failure(&mut self) -> bool {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.consecutive_errors >= self.max_errors
    }

    /// Partial reset: suspect, but not yet out of budget.
    fn degrade(&mut self) {
        self.consecutive_errors = self.max_errors / 2;
    }

    fn clear(&mut self) {
        self.consecutive_errors = 0;
    }
}

// ---------------------------------------------------------------------------
// Interval gate
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy)]
pub struct Cooldown {
    interval_ms: u64,
    last: Option<u64>,
}

impl Cooldown {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last: None,
        }
    }

    /// Like `new`, but the first window starts at `start` rather than open.
    pub fn starting_at(interval_ms: u64, start: u64) -> Self {
        Self {
            interval_ms,
            last: Some(start),
        }
    }

    pub fn is_ready(&self, now: u64) -> bool {
        match self.last {
            Some(last) => now.saturating_sub(last) >= self.interval_ms,
            None => true,
        }
    }

    /// Claim the slot if the window has elapsed.
    pub fn try_acquire(&mut self, now: u64) -> bool {
        let ready = self.is_ready(now);
        if ready {
            self.last = Some(now);
        }
        ready
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------
pub struct SeismicMonitor<B, C> {
    imu: Mpu6050<B, C>,
    config: MonitorConfig,
    history: SampleHistory,
    health: HealthState,
    sampling: Cooldown,
    event_gate: Cooldown,
    status_gate: Cooldown,
}

impl<B: RegisterBus, C: Clock> SeismicMonitor<B, C> {
    pub fn new(imu: Mpu6050<B, C>, config: MonitorConfig) -> Self {
        let imu = imu.with_thresholds(Thresholds {
            vibration: config.vibration_threshold,
            earthquake: config.earthquake_threshold,
        });
        Self {
            imu,
            history: SampleHistory::new(config.history_capacity),
            health: HealthState::new(config.max_consecutive_errors),
            sampling: Cooldown::new(config.sample_interval_ms),
            event_gate: Cooldown::new(config.event_cooldown_ms),
            status_gate: Cooldown::starting_at(config.status_interval_ms, 0),
            config,
        }
    }

    /// Bring up and calibrate the sensor. The node must be at rest.
    ///
    /// A failed calibration is tolerated: the monitor runs uncalibrated with
    /// the health counter at half budget.
    pub fn init(&mut self) -> Result<(), SensorError> {
        log::info!("Initialising seismic monitor");

        if let Err(e) = self.imu.initialize() {
            self.health.initialized = false;
            log::error!("MPU6050 init failed: {}", e);
            return Err(e);
        }

        if let Err(e) = self.imu.calibrate(self.config.calibration_samples) {
            log::warn!("Initial calibration failed, running uncalibrated: {}", e);
            self.health.degrade();
        }

        self.health.initialized = true;
        log::info!("Seismic monitor ready");
        Ok(())
    }

    /// Advance the pipeline to `now`. Returns the event detected on this tick,
    /// if any, whether or not it was published.
    pub fn tick<P: Publisher + ?Sized>(
        &mut self,
        now: u64,
        publisher: &mut P,
    ) -> Option<SeismicEvent> {
        let mut detected = None;

        if self.sampling.try_acquire(now) {
            detected = self.sample(now, publisher);
        }

        if publisher.is_online() && self.status_gate.try_acquire(now) {
            let body = self.status_report(now).to_json();
            if let Err(e) = publisher.publish(Endpoint::Status, &body) {
                log::warn!("Status report failed: {}", e);
            }
        }

        detected
    }

    fn sample<P: Publisher + ?Sized>(&mut self, now: u64, publisher: &mut P) -> Option<SeismicEvent> {
        let sample = match self.imu.read_sample() {
            Ok(sample) => sample,
            Err(e) => {
                self.on_read_failure(e);
                return None;
            }
        };

        self.health.record_success();
        self.history.push(sample);
        log::debug!(
            "Accel X={:.3} Y={:.3} Z={:.3} m/s² | Gyro X={:.2} Y={:.2} Z={:.2} °/s | Mag {:.3}",
            sample.accel_x,
            sample.accel_y,
            sample.accel_z,
            sample.gyro_x,
            sample.gyro_y,
            sample.gyro_z,
            sample.magnitude
        );

        if sample.magnitude <= self.config.vibration_threshold {
            return None;
        }

        let kind = self.imu.classify(sample.magnitude);
        let event = SeismicEvent {
            kind,
            sample,
            is_significant: kind == EventKind::Earthquake,
            detected_at: now,
        };
        log::info!("Event detected: {} (magnitude {:.2} m/s²)", kind, sample.magnitude);

        if publisher.is_online() {
            if self.event_gate.try_acquire(now) {
                let body = event.to_json(self.config.device_id);
                if let Err(e) = publisher.publish(Endpoint::Event, &body) {
                    log::warn!("Event report failed: {}", e);
                }
            } else {
                log::debug!("Event inside cooldown, not sent");
            }
        }

        Some(event)
    }

    fn on_read_failure(&mut self, err: SensorError) {
        let exhausted = self.health.record_failure();
        log::warn!(
            "Sensor read failed ({} consecutive): {}",
            self.health.errors(),
            err
        );

        if exhausted {
            log::warn!("Too many sensor errors, reinitialising");
            self.health.initialized = match self.imu.initialize() {
                Ok(()) => true,
                Err(e) => {
                    log::error!("Reinitialisation failed: {}", e);
                    false
                }
            };
            self.health.degrade();
        }
    }

    fn status_report(&self, now: u64) -> StatusReport<'static> {
        StatusReport {
            device_id: self.config.device_id,
            timestamp: now,
            sensor_ok: self.is_sensor_ok(),
            avg_magnitude: self.history.average_magnitude(self.config.average_window),
            buffer_count: self.history.len(),
            errors: self.health.errors(),
        }
    }

    /// Recalibrate on demand. Success clears the error counter.
    pub fn force_calibration(&mut self) -> Result<CalibrationOffsets, SensorError> {
        log::info!("Forced calibration requested");
        let offsets = self.imu.calibrate(self.config.calibration_samples)?;
        self.health.clear();
        Ok(offsets)
    }

    pub fn reset_error_count(&mut self) {
        self.health.clear();
        log::info!("Sensor error counter reset");
    }

    pub fn is_sensor_ok(&self) -> bool {
        self.health.is_ok()
    }

    pub fn health(&self) -> HealthState {
        self.health
    }

    pub fn buffer_count(&self) -> usize {
        self.history.len()
    }

    /// Magnitude of the newest sample, zero before the first one.
    pub fn current_magnitude(&self) -> f32 {
        self.history.latest().map_or(0.0, |s| s.magnitude)
    }

    pub fn latest_sample(&self) -> Option<SensorSample> {
        self.history.latest().copied()
    }

    pub fn sensor(&self) -> &Mpu6050<B, C> {
        &self.imu
    }

    pub fn sensor_mut(&mut self) -> &mut Mpu6050<B, C> {
        &mut self.imu
    }

    pub fn log_status(&self) {
        log::info!(
            "Monitor: initialised={} ok={} errors={}/{} buffer={}/{} mag={:.3} avg{}={:.3}",
            self.health.initialized,
            self.is_sensor_ok(),
            self.health.errors(),
            self.config.max_consecutive_errors,
            self.history.len(),
            self.history.capacity(),
            self.current_magnitude(),
            self.config.average_window,
            self.history.average_magnitude(self.config.average_window),
        );
    }
}
