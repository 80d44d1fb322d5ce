// SeismoNode: Hardware & System Configuration
// Target: ESP32 host MCU + ESP8266 (AT firmware) on UART1 + MPU6050 on I2C0

// ---------------------------------------------------------------------------
// UART link to the ESP8266 (GPIO4 TX -> ESP RX, GPIO5 RX <- ESP TX)
// ---------------------------------------------------------------------------
pub const UART_BAUD: u32 = 115_200;

// ---------------------------------------------------------------------------
// I2C Bus (GPIO6 SDA, GPIO7 SCL)
// ---------------------------------------------------------------------------
pub const I2C_ADDR_MPU6050: u8 = 0x68;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks
pub const I2C_BAUD_KHZ: u32 = 400;

// ---------------------------------------------------------------------------
// Wi-Fi (ESP8266 AT firmware), override at build time, see `NodeConfig::from_env`
// ---------------------------------------------------------------------------
pub const WIFI_SSID: &str = "seismonode";
pub const WIFI_PASS: &str = "seismonode";

// ---------------------------------------------------------------------------
// AT timing (milliseconds)
// ---------------------------------------------------------------------------
pub const AT_DISABLE_ECHO: bool = true; // ATE0
pub const AT_PROBE_ATTEMPTS: u32 = 10;
pub const AT_PROBE_TIMEOUT_MS: u64 = 300;
pub const AT_OK_TIMEOUT_MS: u64 = 500;
pub const AT_RETRY_ATTEMPTS: u32 = 3;
pub const AT_RETRY_BACKOFF_MS: u32 = 200;
pub const WIFI_JOIN_TIMEOUT_MS: u64 = 20_000;
pub const SEND_PROMPT_TIMEOUT_MS: u64 = 2000;
pub const SEND_ACK_TIMEOUT_MS: u64 = 3000;
pub const CONNECT_TIMEOUT_MS: u64 = 5000;
pub const CLOSE_TIMEOUT_MS: u64 = 1000;
pub const BOOT_DRAIN_MS: u64 = 100;
pub const STATUS_DRAIN_MS: u64 = 300;
pub const RESPONSE_DRAIN_MS: u64 = 2000;
pub const REQUEST_READ_TIMEOUT_MS: u64 = 3000;
pub const FRAME_POLL_TIMEOUT_MS: u64 = 100; // short: interleaves HTTP with sampling
pub const LOG_MODEM_TRAFFIC: bool = true;

// ---------------------------------------------------------------------------
// HTTP server
// ---------------------------------------------------------------------------
pub const HTTP_PORT: u16 = 80;
pub const SERVER_IDLE_TIMEOUT_S: u16 = 10;
pub const REQ_BUFFER_SIZE: usize = 1024;
pub const OUTBOUND_LINK_ID: u8 = 4; // highest link id in CIPMUX=1 mode

// ---------------------------------------------------------------------------
// Collector API
// ---------------------------------------------------------------------------
pub const API_HOST: &str = "collector.local";
pub const API_PORT: u16 = 80;
pub const API_ENDPOINT: &str = "/api/earthquake";
pub const STATUS_ENDPOINT: &str = "/api/pico/status";
pub const DEVICE_ID: &str = "seismonode_01";

// ---------------------------------------------------------------------------
// Detection thresholds (m/s², magnitude includes gravity)
// ---------------------------------------------------------------------------
pub const VIBRATION_THRESHOLD: f32 = 12.0;
pub const EARTHQUAKE_THRESHOLD: f32 = 15.0;

// ---------------------------------------------------------------------------
// Pipeline timing (milliseconds) and sizes
// ---------------------------------------------------------------------------
pub const SENSOR_READ_INTERVAL_MS: u64 = 100;
pub const API_SEND_INTERVAL_MS: u64 = 5000;
pub const STATUS_SEND_INTERVAL_MS: u64 = 30_000;
pub const STATUS_LOG_INTERVAL_MS: u64 = 60_000;
pub const HISTORY_CAPACITY: usize = 50;
pub const STATUS_AVERAGE_WINDOW: usize = 10;
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;
pub const CALIBRATION_SAMPLES: usize = 100;
pub const CALIBRATION_SAMPLE_DELAY_MS: u32 = 10;
pub const SENSOR_WAKE_SETTLE_MS: u32 = 100;

// ---------------------------------------------------------------------------
// MPU6050 Sensor Scale Factors
// ---------------------------------------------------------------------------
pub const GRAVITY: f32 = 9.81;
pub const ACCEL_SCALE_2G: f32 = 16384.0; // LSB/g   at ±2 g
pub const GYRO_SCALE_250: f32 = 131.0; // LSB/°/s at ±250 °/s

// ---------------------------------------------------------------------------
// Typed configuration
// ---------------------------------------------------------------------------

/// Station credentials handed to `AT+CWJAP`.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub ssid: &'static str,
    pub password: &'static str,
    pub join_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: WIFI_SSID,
            password: WIFI_PASS,
            join_timeout_ms: WIFI_JOIN_TIMEOUT_MS,
        }
    }
}

/// Inbound HTTP server settings.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    pub port: u16,
    pub idle_timeout_s: u16,
    pub request_buffer_size: usize,
    pub poll_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: HTTP_PORT,
            idle_timeout_s: SERVER_IDLE_TIMEOUT_S,
            request_buffer_size: REQ_BUFFER_SIZE,
            poll_timeout_ms: FRAME_POLL_TIMEOUT_MS,
        }
    }
}

/// Remote collector the node reports to.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub host: &'static str,
    pub port: u16,
    pub event_path: &'static str,
    pub status_path: &'static str,
    pub link_id: u8,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: API_HOST,
            port: API_PORT,
            event_path: API_ENDPOINT,
            status_path: STATUS_ENDPOINT,
            link_id: OUTBOUND_LINK_ID,
        }
    }
}

/// Sampling, detection and reporting parameters for the seismic monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub device_id: &'static str,
    pub vibration_threshold: f32,
    pub earthquake_threshold: f32,
    pub sample_interval_ms: u64,
    pub event_cooldown_ms: u64,
    pub status_interval_ms: u64,
    pub history_capacity: usize,
    pub average_window: usize,
    pub max_consecutive_errors: u32,
    pub calibration_samples: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            device_id: DEVICE_ID,
            vibration_threshold: VIBRATION_THRESHOLD,
            earthquake_threshold: EARTHQUAKE_THRESHOLD,
            sample_interval_ms: SENSOR_READ_INTERVAL_MS,
            event_cooldown_ms: API_SEND_INTERVAL_MS,
            status_interval_ms: STATUS_SEND_INTERVAL_MS,
            history_capacity: HISTORY_CAPACITY,
            average_window: STATUS_AVERAGE_WINDOW,
            max_consecutive_errors: MAX_CONSECUTIVE_ERRORS,
            calibration_samples: CALIBRATION_SAMPLES,
        }
    }
}

/// Master node configuration
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub server: ServerConfig,
    pub collector: CollectorConfig,
    pub monitor: MonitorConfig,
}

impl NodeConfig {
    /// Defaults with compile-time overrides:
    ///
    /// ```bash
    /// export WIFI_SSID="YourNetworkName"
    /// export WIFI_PASSWORD="YourPassword"
    /// export API_HOST="192.168.1.100"
    /// export DEVICE_ID="basement_node"
    /// cargo build --release
    /// ```
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ssid) = option_env!("WIFI_SSID") {
            config.network.ssid = ssid;
        }
        if let Some(password) = option_env!("WIFI_PASSWORD") {
            config.network.password = password;
        }
        if let Some(host) = option_env!("API_HOST") {
            config.collector.host = host;
        }
        if let Some(device_id) = option_env!("DEVICE_ID") {
            config.monitor.device_id = device_id;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_ordered() {
        let cfg = MonitorConfig::default();
        assert!(cfg.vibration_threshold < cfg.earthquake_threshold);
        // a node at rest must not read as vibrating
        assert!(cfg.vibration_threshold > GRAVITY);
    }

    #[test]
    fn outbound_link_is_a_valid_mux_id() {
        assert!(CollectorConfig::default().link_id <= 4);
    }
}
