// SeismoNode: Unsolicited Frame Detection
//
// Two things can arrive between requests: an inbound data frame
// (`+IPD,<id>,<len>:`) and the `ready` banner the ESP8266 prints after a
// reset. Both are matched in the same pass so a reboot is noticed no matter
// where it lands in the stream.

use crate::error::TransportError;
use crate::hal::{Clock, SerialPort};
use crate::modem::scanner::PendingToken;
use crate::modem::transport::AtTransport;

pub const FRAME_TAG: &[u8] = b"+IPD,";
pub const REBOOT_NOTICE: &[u8] = b"ready\r\n";

const ID_TERMINATOR: u8 = b',';
const LEN_TERMINATOR: u8 = b':';

/// Inbound descriptor for one request on one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionFrame {
    pub id: u8,
    pub len: usize,
}

/// Outcome of one detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    Frame(ConnectionFrame),
    Reboot,
    NoFrame,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Scanning,
    Id { value: u32, digits: usize },
    Len { id: u32, value: usize, digits: usize },
}

/// Per-byte detector state. Lives for a single pass only.
#[derive(Debug, Clone)]
pub struct FrameDetector {
    tag: PendingToken<'static>,
    reboot: PendingToken<'static>,
    phase: Phase,
}

impl FrameDetector {
    pub fn new() -> Self {
        Self {
            tag: PendingToken::new(FRAME_TAG),
            reboot: PendingToken::new(REBOOT_NOTICE),
            phase: Phase::Scanning,
        }
    }

    /// Feed one byte. `Some(NoFrame)` signals a protocol violation; the pass
    /// must end there.
    pub fn feed(&mut self, byte: u8) -> Option<FrameEvent> {
        match self.phase {
            Phase::Scanning => {
                if self.reboot.feed(byte) {
                    return Some(FrameEvent::Reboot);
                }
                if self.tag.feed(byte) {
                    self.phase = Phase::Id { value: 0, digits: 0 };
                }
                None
            }
            Phase::Id { value, digits } => match byte {
                ID_TERMINATOR if digits > 0 => {
                    self.phase = Phase::Len { id: value, value: 0, digits: 0 };
                    None
                }
                b'0'..=b'9' => match accumulate(value, byte) {
                    Some(value) => {
                        self.phase = Phase::Id { value, digits: digits + 1 };
                        None
                    }
                    None => Some(FrameEvent::NoFrame),
                },
                _ => Some(FrameEvent::NoFrame),
            },
            Phase::Len { id, value, digits } => match byte {
                LEN_TERMINATOR if digits > 0 => match u8::try_from(id) {
                    Ok(id) => Some(FrameEvent::Frame(ConnectionFrame { id, len: value })),
                    Err(_) => Some(FrameEvent::NoFrame),
                },
                b'0'..=b'9' => match accumulate(value as u32, byte) {
                    Some(value) => {
                        self.phase = Phase::Len { id, value: value as usize, digits: digits + 1 };
                        None
                    }
                    None => Some(FrameEvent::NoFrame),
                },
                _ => Some(FrameEvent::NoFrame),
            },
        }
    }
}

impl Default for FrameDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn accumulate(value: u32, digit: u8) -> Option<u32> {
    value.checked_mul(10)?.checked_add(u32::from(digit - b'0'))
}

impl<S: SerialPort, C: Clock> AtTransport<S, C> {
    /// Wait up to `timeout_ms` for a frame header or a reboot notice.
    /// A malformed header or a timeout mid-header both yield `NoFrame`.
    pub fn poll_frame(&mut self, timeout_ms: u64) -> Result<FrameEvent, TransportError> {
        let mut detector = FrameDetector::new();
        let deadline = self.deadline(timeout_ms);

        while let Some(byte) = self.next_byte(deadline)? {
            if let Some(event) = detector.feed(byte) {
                if event == FrameEvent::NoFrame {
                    log::debug!("malformed +IPD header, dropping");
                }
                return Ok(event);
            }
        }
        Ok(FrameEvent::NoFrame)
    }
}
