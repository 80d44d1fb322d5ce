// SeismoNode: ESP-IDF board glue
//
// Implements the hardware seams for the on-chip UART and I2C drivers and
// provides the diagnostic pass-through used when the modem cannot be brought
// up.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use esp_idf_hal::delay::TickType;
use esp_idf_hal::i2c::I2cDriver;
use esp_idf_hal::uart::{UartDriver, UartRxDriver, UartTxDriver};
use esp_idf_svc::sys::EspError;

use crate::config::*;
use crate::error::{BusError, SerialError};
use crate::hal::{RegisterBus, SerialPort};

fn ticks(timeout: Duration) -> u32 {
    TickType::from(timeout).ticks()
}

impl From<EspError> for SerialError {
    fn from(e: EspError) -> Self {
        SerialError(e.to_string())
    }
}

impl From<EspError> for BusError {
    fn from(e: EspError) -> Self {
        BusError(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// UART1 <-> ESP8266
// ---------------------------------------------------------------------------
impl SerialPort for UartDriver<'_> {
    fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), SerialError> {
        while !bytes.is_empty() {
            let n = self.write(bytes)?;
            bytes = &bytes[n..];
        }
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, SerialError> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte, ticks(timeout))? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }
}

// ---------------------------------------------------------------------------
// I2C0 <-> MPU6050
// ---------------------------------------------------------------------------
impl RegisterBus for I2cDriver<'_> {
    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), BusError> {
        self.write(I2C_ADDR_MPU6050, &[reg, value], I2C_TIMEOUT_TICKS)?;
        Ok(())
    }

    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.write_read(I2C_ADDR_MPU6050, &[start], buf, I2C_TIMEOUT_TICKS)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Diagnostic pass-through
// ---------------------------------------------------------------------------

/// Console lines go to the modem with CR LF; modem bytes go to the console.
/// Only returns if the UART itself fails.
pub fn diagnostic_bridge(uart: &mut UartDriver<'_>) -> anyhow::Result<()> {
    log::warn!("Diagnostic bridge active: console <-> ESP8266 at {} baud", UART_BAUD);
    let (tx, rx) = uart.split();

    let stop = AtomicBool::new(false);
    thread::scope(|s| {
        s.spawn(|| forward_console(tx, &stop));
        let result = echo_modem(rx);
        stop.store(true, Ordering::Relaxed);
        result
    })
}

fn forward_console(tx: &mut UartTxDriver<'_>, stop: &AtomicBool) {
    let stdin = std::io::stdin();
    let mut line = String::new();
    while !stop.load(Ordering::Relaxed) {
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => {
                // console VFS is non-blocking
                thread::sleep(Duration::from_millis(20));
                continue;
            }
            Ok(_) => {}
        }

        let command = line.trim_end_matches(['\r', '\n']);
        let sent = tx
            .write(command.as_bytes())
            .and_then(|_| tx.write(b"\r\n"));
        if let Err(e) = sent {
            log::error!("UART write failed: {}", e);
        }
    }
}

fn echo_modem(rx: &UartRxDriver<'_>) -> anyhow::Result<()> {
    let mut buf = [0u8; 128];
    let mut stdout = std::io::stdout();
    loop {
        let n = rx.read(&mut buf, ticks(Duration::from_millis(10)))?;
        if n > 0 {
            stdout.write_all(&buf[..n])?;
            stdout.flush()?;
        }
    }
}
