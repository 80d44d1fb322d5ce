// SeismoNode: seismic IoT node firmware
//
// An MPU6050 sampled on I2C feeds a vibration/earthquake detector; an ESP8266
// on UART, driven with AT commands, serves a small dashboard and posts events
// and status reports to a collector.

pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod hal;
pub mod history;
pub mod modem;
pub mod net;
pub mod tasks;

#[cfg(target_os = "espidf")]
pub mod board;

#[cfg(test)]
pub(crate) mod testing;
