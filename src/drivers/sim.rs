// SeismoNode: Simulated MPU6050
//
// Stands in for the I2C bus on the host build: answers WHO_AM_I and serves
// an at-rest acceleration vector with ±1 m/s² noise and the occasional jolt.

use crate::config::{ACCEL_SCALE_2G, GRAVITY};
use crate::drivers::imu::{REG_ACCEL_XOUT_H, REG_WHO_AM_I};
use crate::error::BusError;
use crate::hal::RegisterBus;

/// One in this many reads carries a jolt.
const JOLT_ODDS: u32 = 200;

/// Linear congruential generator, deterministic per seed.
#[derive(Debug, Clone)]
struct Lcg(u32);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        // low bits of an LCG cycle quickly
        self.0 >> 16
    }

    /// Uniform-ish value in [-1, 1).
    fn unit(&mut self) -> f32 {
        (self.next() % 1000) as f32 / 500.0 - 1.0
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedBus {
    rng: Lcg,
}

impl SimulatedBus {
    pub fn new(seed: u32) -> Self {
        Self { rng: Lcg(seed) }
    }

    fn next_accel(&mut self) -> [f32; 3] {
        let mut accel = [self.rng.unit(), self.rng.unit(), GRAVITY + self.rng.unit()];
        if self.rng.next() % JOLT_ODDS == 0 {
            let jolt = (self.rng.next() % 100) as f32 / 10.0; // 0..10 m/s²
            for axis in accel.iter_mut() {
                *axis += jolt;
            }
        }
        accel
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new(12_345)
    }
}

impl RegisterBus for SimulatedBus {
    fn write_register(&mut self, _reg: u8, _value: u8) -> Result<(), BusError> {
        Ok(())
    }

    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<(), BusError> {
        match start {
            REG_WHO_AM_I if !buf.is_empty() => {
                buf[0] = 0x68;
                Ok(())
            }
            REG_ACCEL_XOUT_H if buf.len() >= 14 => {
                buf.fill(0);
                for (i, a) in self.next_accel().iter().enumerate() {
                    let raw = (a / GRAVITY * ACCEL_SCALE_2G)
                        .clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                    buf[i * 2..i * 2 + 2].copy_from_slice(&raw.to_be_bytes());
                }
                Ok(())
            }
            other => Err(BusError(format!("register 0x{other:02x} not simulated"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::imu::Mpu6050;
    use crate::testing::ManualClock;

    #[test]
    fn simulated_sensor_initializes_and_reads_near_rest() {
        let mut imu = Mpu6050::new(SimulatedBus::default(), ManualClock::new());
        imu.initialize().unwrap();
        let calm = (0..500)
            .filter_map(|_| imu.read_sample().ok())
            .filter(|s| (s.magnitude - GRAVITY).abs() < 2.0)
            .count();
        assert!(calm > 450, "only {calm} calm samples");
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = SimulatedBus::new(7);
        let mut b = SimulatedBus::new(7);
        let (mut ra, mut rb) = ([0u8; 14], [0u8; 14]);
        for _ in 0..10 {
            a.read_registers(REG_ACCEL_XOUT_H, &mut ra).unwrap();
            b.read_registers(REG_ACCEL_XOUT_H, &mut rb).unwrap();
            assert_eq!(ra, rb);
        }
    }
}
