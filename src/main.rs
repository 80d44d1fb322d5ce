// SeismoNode: Firmware Entry Point
//
// Device boot sequence:
//   1. Bring up logging, UART1 (ESP8266) and I2C0 (MPU6050).
//   2. Initialise and calibrate the sensor (keep the node still).
//   3. Bring the modem up: probe, join Wi-Fi, arm the HTTP server.
//   4. Run the service loop.
//
// If the modem never answers, or its server cannot be re-armed after a
// reboot, the node drops into a console <-> modem pass-through for debugging.
//
// On the host the same pipeline runs against a simulated sensor and logs the
// payloads it would have posted.

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use esp_idf_hal::gpio::AnyIOPin;
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::prelude::*;
    use esp_idf_hal::uart::{config::Config, UartDriver};

    use seismonode::board;
    use seismonode::config::*;
    use seismonode::drivers::imu::Mpu6050;
    use seismonode::hal::SystemClock;
    use seismonode::modem::transport::AtTransport;
    use seismonode::net::bridge::HttpBridge;
    use seismonode::tasks::monitor::SeismicMonitor;
    use seismonode::tasks::service::Node;

    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("SeismoNode firmware starting");

    let config = NodeConfig::from_env();
    let clock = SystemClock::new();

    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;

    let mut uart = UartDriver::new(
        peripherals.uart1,
        peripherals.pins.gpio4, // TX -> ESP8266 RX
        peripherals.pins.gpio5, // RX <- ESP8266 TX
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &Config::new().baudrate(UART_BAUD.into()),
    )?;

    let i2c_config = I2cConfig::new().baudrate(I2C_BAUD_KHZ.kHz().into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio6, // SDA
        peripherals.pins.gpio7, // SCL
        &i2c_config,
    )?;

    // ---- Sensor -----------------------------------------------------------
    let mut monitor = SeismicMonitor::new(Mpu6050::new(i2c, clock), config.monitor.clone());
    if let Err(e) = monitor.init() {
        // keep serving; the dashboard reports the sensor offline
        log::error!("Sensor unavailable: {}", e);
    }

    // ---- Modem ------------------------------------------------------------
    let transport = AtTransport::new(&mut uart, clock).with_echo(LOG_MODEM_TRAFFIC);
    let mut bridge = HttpBridge::new(transport, &config);
    if let Err(e) = bridge.begin() {
        log::error!("ESP8266 bring-up failed: {}", e);
        drop(bridge);
        return board::diagnostic_bridge(&mut uart);
    }

    // ---- Service loop -----------------------------------------------------
    let mut node = Node::new(monitor, bridge, clock);
    let fatal = node.run();
    log::error!("Falling back to diagnostic bridge: {}", fatal);
    drop(node);
    board::diagnostic_bridge(&mut uart)
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    use std::thread;
    use std::time::Duration;

    use seismonode::config::*;
    use seismonode::drivers::imu::Mpu6050;
    use seismonode::drivers::sim::SimulatedBus;
    use seismonode::hal::{Clock, SystemClock};
    use seismonode::net::publish::LogPublisher;
    use seismonode::tasks::monitor::SeismicMonitor;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("SeismoNode host simulation (Ctrl-C to stop)");

    let config = NodeConfig::from_env();
    let clock = SystemClock::new();

    let imu = Mpu6050::new(SimulatedBus::default(), clock);
    let mut monitor = SeismicMonitor::new(imu, config.monitor.clone());
    monitor.init()?;

    let mut publisher = LogPublisher::default();
    let mut last_log = 0;
    loop {
        let now = clock.now_ms();
        monitor.tick(now, &mut publisher);

        if now.saturating_sub(last_log) >= STATUS_LOG_INTERVAL_MS {
            monitor.log_status();
            log::info!("{} payloads published (dry run)", publisher.sent);
            last_log = now;
        }
        thread::sleep(Duration::from_millis(config.monitor.sample_interval_ms));
    }
}
