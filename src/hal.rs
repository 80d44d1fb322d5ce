// SeismoNode: Hardware seams
//
// The library never touches peripherals directly. The board module implements
// these traits for the ESP-IDF drivers; tests and the host build use fakes.

use std::time::{Duration, Instant};

use crate::error::{BusError, SerialError};

/// Byte-oriented UART link to the modem.
pub trait SerialPort {
    /// Write every byte of `bytes`.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// Block for at most `timeout` waiting for one byte.
    /// `Ok(None)` means nothing arrived in time.
    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, SerialError>;
}

/// Register-addressed sensor bus (I2C on the device).
pub trait RegisterBus {
    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), BusError>;

    /// Burst-read consecutive registers starting at `start` into `buf`.
    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<(), BusError>;
}

/// Monotonic time source.
pub trait Clock {
    fn now_ms(&self) -> u64;
    fn delay_ms(&self, ms: u32);
}

/// Milliseconds since the clock was created, backed by `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn delay_ms(&self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn delay_ms(&self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

impl<S: SerialPort + ?Sized> SerialPort for &mut S {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        (**self).write_all(bytes)
    }

    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, SerialError> {
        (**self).read_byte(timeout)
    }
}
