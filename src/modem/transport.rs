// SeismoNode: AT Transport
//
// Every wait is bounded by a deadline computed from the node clock; the
// remaining time is handed to the serial port as a blocking read timeout,
// so nothing here spins.

use std::time::Duration;

use crate::error::TransportError;
use crate::hal::{Clock, SerialPort};
use crate::modem::command::AtCommand;
use crate::modem::scanner::TokenScanner;

pub const CRLF: &[u8] = b"\r\n";
pub const OK: &[u8] = b"OK\r\n";
pub const ERROR: &[u8] = b"ERROR\r\n";
pub const FAIL: &[u8] = b"FAIL\r\n";
pub const NO_CHANGE: &[u8] = b"no change\r\n";
pub const ALREADY_CONNECTED: &[u8] = b"ALREADY CONNECTED\r\n";
pub const SEND_PROMPT: &[u8] = b">";
pub const SEND_OK: &[u8] = b"SEND OK\r\n";

/// Longest line the echo sink holds before flushing it anyway.
const ECHO_LINE_MAX: usize = 256;

/// Mirrors modem traffic into the log, one line at a time.
#[derive(Debug, Default)]
struct EchoSink {
    line: Vec<u8>,
}

impl EchoSink {
    fn mirror(&mut self, byte: u8) {
        match byte {
            b'\n' => self.flush(),
            b'\r' => {}
            _ => {
                self.line.push(byte);
                if self.line.len() >= ECHO_LINE_MAX {
                    self.flush();
                }
            }
        }
    }

    fn flush(&mut self) {
        if !self.line.is_empty() {
            log::trace!(target: "modem", "<< {}", String::from_utf8_lossy(&self.line));
            self.line.clear();
        }
    }
}

pub struct AtTransport<S, C> {
    serial: S,
    clock: C,
    echo: Option<EchoSink>,
}

impl<S: SerialPort, C: Clock> AtTransport<S, C> {
    pub fn new(serial: S, clock: C) -> Self {
        Self {
            serial,
            clock,
            echo: None,
        }
    }

    /// Enable or disable mirroring of received bytes to the `modem` log target.
    pub fn with_echo(mut self, enabled: bool) -> Self {
        self.echo = enabled.then(EchoSink::default);
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    /// Write `text` followed by CR LF.
    pub fn send_line(&mut self, text: &str) -> Result<(), TransportError> {
        self.serial.write_all(text.as_bytes())?;
        self.serial.write_all(CRLF)?;
        Ok(())
    }

    pub fn send_command(&mut self, command: &AtCommand<'_>) -> Result<(), TransportError> {
        if let AtCommand::JoinAccessPoint { ssid, .. } = command {
            log::debug!(target: "modem", ">> AT+CWJAP=\"{}\",***", ssid);
        } else {
            log::debug!(target: "modem", ">> {}", command);
        }
        self.send_line(&command.line())
    }

    /// Write payload bytes with no terminator.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.serial.write_all(bytes)?;
        Ok(())
    }

    /// Consume bytes until one of `tokens` (at most 8) completes.
    /// Returns its index, or `None` when `timeout_ms` elapses first.
    pub fn wait_for_any(
        &mut self,
        tokens: &[&[u8]],
        timeout_ms: u64,
    ) -> Result<Option<usize>, TransportError> {
        let mut scanner = TokenScanner::new(tokens);
        let deadline = self.deadline(timeout_ms);

        while let Some(byte) = self.next_byte(deadline)? {
            if let Some(index) = scanner.feed(byte) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    pub fn wait_for(&mut self, token: &[u8], timeout_ms: u64) -> Result<bool, TransportError> {
        Ok(self.wait_for_any(&[token], timeout_ms)?.is_some())
    }

    /// Read up to `max_len` bytes. The deadline is pushed forward on every
    /// byte, so only an idle gap of `idle_timeout_ms` ends the read early.
    pub fn read_bytes(
        &mut self,
        max_len: usize,
        idle_timeout_ms: u64,
    ) -> Result<Vec<u8>, TransportError> {
        let mut buf = Vec::with_capacity(max_len);
        while buf.len() < max_len {
            let deadline = self.deadline(idle_timeout_ms);
            match self.next_byte(deadline)? {
                Some(byte) => buf.push(byte),
                None => break,
            }
        }
        Ok(buf)
    }

    /// Discard input until the line has been quiet for `quiet_ms`.
    /// Returns the number of bytes thrown away.
    pub fn drain_quiet(&mut self, quiet_ms: u64) -> Result<usize, TransportError> {
        let mut discarded = 0;
        loop {
            let deadline = self.deadline(quiet_ms);
            if self.next_byte(deadline)?.is_none() {
                return Ok(discarded);
            }
            discarded += 1;
        }
    }

    /// Command/response handshake with a fixed number of attempts.
    ///
    /// Returns the index of the token the modem answered with; the caller
    /// decides which indices count as success. Only silence is retried.
    pub fn exchange(
        &mut self,
        command: &AtCommand<'_>,
        tokens: &[&[u8]],
        timeout_ms: u64,
        attempts: u32,
        backoff_ms: u32,
    ) -> Result<usize, TransportError> {
        for attempt in 1..=attempts.max(1) {
            self.send_command(command)?;
            if let Some(index) = self.wait_for_any(tokens, timeout_ms)? {
                return Ok(index);
            }
            if attempt < attempts {
                log::debug!("no reply to {} (attempt {}/{})", command_name(command), attempt, attempts);
                self.clock.delay_ms(backoff_ms);
            }
        }
        Err(TransportError::NoResponse {
            command: command_name(command),
        })
    }

    pub(crate) fn deadline(&self, timeout_ms: u64) -> u64 {
        self.clock.now_ms().saturating_add(timeout_ms)
    }

    /// Next byte before `deadline`, mirrored to the echo sink.
    pub(crate) fn next_byte(&mut self, deadline: u64) -> Result<Option<u8>, TransportError> {
        let now = self.clock.now_ms();
        if now >= deadline {
            return Ok(None);
        }
        let byte = self
            .serial
            .read_byte(Duration::from_millis(deadline - now))?;
        if let (Some(b), Some(echo)) = (byte, self.echo.as_mut()) {
            echo.mirror(b);
        }
        Ok(byte)
    }
}

/// Command text safe to put in logs and errors (credentials stripped).
pub(crate) fn command_name(command: &AtCommand<'_>) -> String {
    match command {
        AtCommand::JoinAccessPoint { .. } => "AT+CWJAP".to_string(),
        other => other.line(),
    }
}
