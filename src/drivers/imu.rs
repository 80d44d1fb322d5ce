// SeismoNode: MPU6050 Motion Sensor Facade
//
// Register-level driver over any `RegisterBus`. Produces calibrated samples in
// physical units (m/s², °/s) and classifies acceleration magnitude.

use crate::config::*;
use crate::error::SensorError;
use crate::events::{EventKind, SensorSample};
use crate::hal::{Clock, RegisterBus};

// MPU6050 register addresses
pub const REG_PWR_MGMT_1: u8 = 0x6B;
pub const REG_ACCEL_CONFIG: u8 = 0x1C;
pub const REG_ACCEL_XOUT_H: u8 = 0x3B; // Start of 14-byte sensor burst
pub const REG_WHO_AM_I: u8 = 0x75;

/// 0x68 with AD0 low, 0x69 with AD0 high.
const WHO_AM_I_ACCEPTED: [u8; 2] = [0x68, 0x69];

/// Minimum share of good reads for a calibration run to count.
const CALIBRATION_MIN_VALID: f32 = 0.8;

/// Per-axis acceleration bias, m/s².
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CalibrationOffsets {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Detection thresholds, m/s². `vibration` must be below `earthquake`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub vibration: f32,
    pub earthquake: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            vibration: VIBRATION_THRESHOLD,
            earthquake: EARTHQUAKE_THRESHOLD,
        }
    }
}

/// Unscaled burst contents.
#[derive(Debug, Clone, Copy, Default)]
struct RawReading {
    accel: [i16; 3],
    gyro: [i16; 3],
}

pub struct Mpu6050<B, C> {
    bus: B,
    clock: C,
    offsets: CalibrationOffsets,
    thresholds: Thresholds,
}

impl<B: RegisterBus, C: Clock> Mpu6050<B, C> {
    pub fn new(bus: B, clock: C) -> Self {
        Self {
            bus,
            clock,
            offsets: CalibrationOffsets::default(),
            thresholds: Thresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn offsets(&self) -> CalibrationOffsets {
        self.offsets
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Read WHO_AM_I and report whether it names an MPU6050.
    pub fn is_connected(&mut self) -> bool {
        matches!(self.who_am_i(), Ok(id) if WHO_AM_I_ACCEPTED.contains(&id))
    }

    /// Wake the sensor, select ±2 g and verify its identity.
    pub fn initialize(&mut self) -> Result<(), SensorError> {
        // Wake up (clear SLEEP bit)
        self.bus.write_register(REG_PWR_MGMT_1, 0x00)?;
        self.clock.delay_ms(SENSOR_WAKE_SETTLE_MS);

        // Accelerometer: ±2 g
        self.bus.write_register(REG_ACCEL_CONFIG, 0x00)?;

        let id = self.who_am_i()?;
        if !WHO_AM_I_ACCEPTED.contains(&id) {
            return Err(SensorError::IdentityMismatch(id));
        }

        log::info!("MPU6050 initialised (±2g, ±250°/s, id 0x{:02x})", id);
        Ok(())
    }

    /// Average `samples` readings taken at rest and store them as offsets.
    ///
    /// The Z offset excludes gravity. Fewer than 80 % good reads fails and
    /// keeps the previous offsets.
    pub fn calibrate(&mut self, samples: usize) -> Result<CalibrationOffsets, SensorError> {
        log::info!("Calibrating with {} samples (keep the node still)", samples);

        let mut sum = [0.0f32; 3];
        let mut valid = 0usize;

        for _ in 0..samples {
            if let Ok(raw) = self.read_raw() {
                let [x, y, z] = raw.accel.map(accel_to_ms2);
                sum[0] += x;
                sum[1] += y;
                sum[2] += z - GRAVITY;
                valid += 1;
            }
            self.clock.delay_ms(CALIBRATION_SAMPLE_DELAY_MS);
        }

        if samples == 0 || (valid as f32) < samples as f32 * CALIBRATION_MIN_VALID {
            return Err(SensorError::InsufficientSamples {
                valid,
                attempted: samples,
            });
        }

        let n = valid as f32;
        self.offsets = CalibrationOffsets {
            x: sum[0] / n,
            y: sum[1] / n,
            z: sum[2] / n,
        };
        log::info!(
            "Calibration done: X={:.3} Y={:.3} Z={:.3} m/s²",
            self.offsets.x,
            self.offsets.y,
            self.offsets.z
        );
        Ok(self.offsets)
    }

    /// One burst read converted to a calibrated, timestamped sample.
    pub fn read_sample(&mut self) -> Result<SensorSample, SensorError> {
        let raw = self.read_raw()?;
        let [ax, ay, az] = raw.accel.map(accel_to_ms2);
        let [gx, gy, gz] = raw.gyro.map(|v| v as f32 / GYRO_SCALE_250);

        let accel_x = ax - self.offsets.x;
        let accel_y = ay - self.offsets.y;
        let accel_z = az - self.offsets.z;

        Ok(SensorSample {
            accel_x,
            accel_y,
            accel_z,
            gyro_x: gx,
            gyro_y: gy,
            gyro_z: gz,
            magnitude: (accel_x * accel_x + accel_y * accel_y + accel_z * accel_z).sqrt(),
            timestamp: self.clock.now_ms(),
        })
    }

    pub fn classify(&self, magnitude: f32) -> EventKind {
        classify(magnitude, self.thresholds)
    }

    fn who_am_i(&mut self) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.bus.read_registers(REG_WHO_AM_I, &mut buf)?;
        Ok(buf[0])
    }

    fn read_raw(&mut self) -> Result<RawReading, SensorError> {
        let mut raw = [0u8; 14];
        self.bus.read_registers(REG_ACCEL_XOUT_H, &mut raw)?;

        let word = |i: usize| i16::from_be_bytes([raw[i], raw[i + 1]]);
        Ok(RawReading {
            accel: [word(0), word(2), word(4)],
            // raw[6..8] = temperature, skipped
            gyro: [word(8), word(10), word(12)],
        })
    }
}

fn accel_to_ms2(raw: i16) -> f32 {
    raw as f32 / ACCEL_SCALE_2G * GRAVITY
}

/// `vibration <= m < earthquake` is a vibration, `m >= earthquake` an earthquake.
pub fn classify(magnitude: f32, thresholds: Thresholds) -> EventKind {
    if magnitude >= thresholds.earthquake {
        EventKind::Earthquake
    } else if magnitude >= thresholds.vibration {
        EventKind::Vibration
    } else {
        EventKind::Normal
    }
}
