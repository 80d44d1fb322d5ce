// SeismoNode: Test Fakes
//
// In-crate fakes for the hardware seams.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::drivers::imu::{REG_ACCEL_XOUT_H, REG_WHO_AM_I};
use crate::error::{BridgeError, BusError, SerialError};
use crate::hal::{Clock, RegisterBus, SerialPort};
use crate::net::publish::{Endpoint, Publisher};

/// Route `log` output through the test harness; `RUST_LOG=trace` shows modem traffic.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Clock that only moves when told to (or when something delays on it).
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn delay_ms(&self, ms: u32) {
        self.advance(ms as u64);
    }
}

/// Serial port fed from a byte queue, with replies scripted per outbound write.
///
/// Script entries fire strictly in order: a write whose bytes start with the
/// front entry's trigger appends that entry's reply to the inbound queue.
#[derive(Debug, Default)]
pub struct ScriptedSerial {
    input: VecDeque<u8>,
    written: Vec<u8>,
    script: VecDeque<(Vec<u8>, Vec<u8>)>,
    byte_delay: Option<(ManualClock, u64)>,
}

impl ScriptedSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Each inbound byte takes `ms` of `clock` time to arrive.
    pub fn with_byte_delay(mut self, clock: ManualClock, ms: u64) -> Self {
        self.byte_delay = Some((clock, ms));
        self
    }

    pub fn on(mut self, trigger: &str, reply: &[u8]) -> Self {
        self.script.push_back((trigger.as_bytes().to_vec(), reply.to_vec()));
        self
    }

    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }

    /// Outbound traffic split on CR LF.
    pub fn lines(&self) -> Vec<String> {
        self.written_text()
            .split("\r\n")
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect()
    }

    pub fn clear_written(&mut self) {
        self.written.clear();
    }

    pub fn pending(&self) -> Vec<u8> {
        self.input.iter().copied().collect()
    }

    pub fn script_exhausted(&self) -> bool {
        self.script.is_empty()
    }
}

impl SerialPort for ScriptedSerial {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.written.extend_from_slice(bytes);
        let fire = matches!(self.script.front(), Some((trigger, _)) if bytes.starts_with(trigger));
        if fire {
            if let Some((_, reply)) = self.script.pop_front() {
                self.input.extend(reply);
            }
        }
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, SerialError> {
        if let Some((clock, ms)) = &self.byte_delay {
            let timeout_ms = timeout.as_millis() as u64;
            if self.input.is_empty() || *ms > timeout_ms {
                clock.advance(timeout_ms);
                return Ok(None);
            }
            clock.advance(*ms);
        }
        Ok(self.input.pop_front())
    }
}

/// MPU6050 register file backed by queued burst frames.
#[derive(Debug, Clone)]
pub struct FakeBus {
    pub who_am_i: u8,
    pub writes: Vec<(u8, u8)>,
    pub fail_writes: bool,
    frames: VecDeque<Option<[u8; 14]>>,
    default_frame: Option<[u8; 14]>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self {
            who_am_i: 0x68,
            writes: Vec::new(),
            fail_writes: false,
            frames: VecDeque::new(),
            default_frame: Some(raw_frame([0, 0, 16384], [0, 0, 0])),
        }
    }

    /// Next burst read returns this frame.
    pub fn queue(&mut self, accel: [i16; 3], gyro: [i16; 3]) {
        self.frames.push_back(Some(raw_frame(accel, gyro)));
    }

    /// Next burst read fails.
    pub fn queue_failure(&mut self) {
        self.frames.push_back(None);
    }

    /// What burst reads return once the queue is empty; `None` fails them.
    pub fn set_default(&mut self, frame: Option<([i16; 3], [i16; 3])>) {
        self.default_frame = frame.map(|(a, g)| raw_frame(a, g));
    }
}

impl Default for FakeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBus for FakeBus {
    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), BusError> {
        if self.fail_writes {
            return Err(BusError("nack".into()));
        }
        self.writes.push((reg, value));
        Ok(())
    }

    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<(), BusError> {
        match start {
            REG_WHO_AM_I => {
                buf[0] = self.who_am_i;
                Ok(())
            }
            REG_ACCEL_XOUT_H => {
                let frame = self.frames.pop_front().unwrap_or(self.default_frame);
                let frame = frame.ok_or_else(|| BusError("timeout".into()))?;
                buf.copy_from_slice(&frame[..buf.len()]);
                Ok(())
            }
            other => Err(BusError(format!("unexpected register 0x{other:02x}"))),
        }
    }
}

/// Big-endian burst layout: accel xyz, temperature, gyro xyz.
pub fn raw_frame(accel: [i16; 3], gyro: [i16; 3]) -> [u8; 14] {
    let mut raw = [0u8; 14];
    for (i, v) in accel.iter().enumerate() {
        raw[i * 2..i * 2 + 2].copy_from_slice(&v.to_be_bytes());
    }
    for (i, v) in gyro.iter().enumerate() {
        raw[8 + i * 2..8 + i * 2 + 2].copy_from_slice(&v.to_be_bytes());
    }
    raw
}

/// Publisher that records every accepted post.
#[derive(Debug, Clone)]
pub struct RecordingPublisher {
    pub online: bool,
    pub fail: bool,
    pub posts: Rc<RefCell<Vec<(Endpoint, String)>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            online: true,
            fail: false,
            posts: Rc::default(),
        }
    }

    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.posts.borrow().iter().filter(|(e, _)| *e == endpoint).count()
    }

    pub fn last(&self, endpoint: Endpoint) -> Option<String> {
        self.posts
            .borrow()
            .iter()
            .rev()
            .find(|(e, _)| *e == endpoint)
            .map(|(_, body)| body.clone())
    }
}

impl Default for RecordingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for RecordingPublisher {
    fn is_online(&self) -> bool {
        self.online
    }

    fn publish(&mut self, endpoint: Endpoint, body: &str) -> Result<(), BridgeError> {
        self.posts.borrow_mut().push((endpoint, body.to_owned()));
        if self.fail {
            return Err(BridgeError::NotAcknowledged { link: 4 });
        }
        Ok(())
    }
}
