// SeismoNode: Service Loop
//
// Single-threaded main loop. One pass = monitor tick, snapshot push, one
// bridge poll. The bridge is lent to the monitor as its publisher for the
// duration of the tick, so sensor reporting and HTTP serving never interleave
// AT commands.

use crate::config::STATUS_LOG_INTERVAL_MS;
use crate::error::BridgeError;
use crate::hal::{Clock, RegisterBus, SerialPort};
use crate::net::bridge::{HttpBridge, PollOutcome};
use crate::tasks::monitor::{Cooldown, SeismicMonitor};

pub struct Node<B, S, C> {
    monitor: SeismicMonitor<B, C>,
    bridge: HttpBridge<S, C>,
    clock: C,
    status_log: Cooldown,
}

impl<B: RegisterBus, S: SerialPort, C: Clock> Node<B, S, C> {
    pub fn new(monitor: SeismicMonitor<B, C>, bridge: HttpBridge<S, C>, clock: C) -> Self {
        Self {
            monitor,
            bridge,
            clock,
            status_log: Cooldown::starting_at(STATUS_LOG_INTERVAL_MS, 0),
        }
    }

    pub fn monitor(&self) -> &SeismicMonitor<B, C> {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut SeismicMonitor<B, C> {
        &mut self.monitor
    }

    pub fn bridge(&self) -> &HttpBridge<S, C> {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut HttpBridge<S, C> {
        &mut self.bridge
    }

    /// One pass of the loop. An error means the modem rebooted and its
    /// server could not be brought back.
    pub fn run_once(&mut self, now: u64) -> Result<PollOutcome, BridgeError> {
        self.monitor.tick(now, &mut self.bridge);

        let sample = self.monitor.latest_sample().unwrap_or_default();
        self.bridge
            .set_sensor_snapshot(sample, self.monitor.is_sensor_ok());

        if self.status_log.try_acquire(now) {
            self.monitor.log_status();
        }

        self.bridge.poll()
    }

    /// Loop until a fatal bridge error, which is returned.
    pub fn run(&mut self) -> BridgeError {
        log::info!("Entering service loop");
        loop {
            let now = self.clock.now_ms();
            if let Err(e) = self.run_once(now) {
                log::error!("Service loop stopped: {}", e);
                return e;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitorConfig, NodeConfig};
    use crate::drivers::imu::Mpu6050;
    use crate::modem::transport::AtTransport;
    use crate::net::http::Route;
    use crate::net::publish::Publisher;
    use crate::testing::{FakeBus, ManualClock, ScriptedSerial};
    use serde_json::Value;

    fn build(serial: ScriptedSerial) -> Node<FakeBus, ScriptedSerial, ManualClock> {
        let clock = ManualClock::new();
        let imu = Mpu6050::new(FakeBus::new(), clock.clone());
        let mut monitor = SeismicMonitor::new(imu, MonitorConfig::default());
        monitor.init().unwrap();
        let bridge = HttpBridge::new(
            AtTransport::new(serial, clock.clone()),
            &NodeConfig::default(),
        );
        Node::new(monitor, bridge, clock)
    }

    #[test]
    fn sensor_endpoint_reports_latest_sample() {
        let request = "GET /api/sensor HTTP/1.1\r\n\r\n";
        let input = format!("+IPD,1,{}:{}", request.len(), request);
        let serial = ScriptedSerial::with_input(input.as_bytes())
            .on("AT+CIPSEND=1,", b"> ")
            .on("HTTP/1.1 200", b"");
        let mut node = build(serial);
        node.monitor_mut()
            .sensor_mut()
            .bus_mut()
            .queue([0, 0, 21712], [0, 0, 0]);

        assert_eq!(node.run_once(0).unwrap(), PollOutcome::Served(Route::SensorApi));

        let text = node.bridge().transport().serial().written_text();
        let start = text.find('{').unwrap();
        let end = text.rfind('}').unwrap();
        let v: Value = serde_json::from_str(&text[start..=end]).unwrap();
        assert!((v["magnitude"].as_f64().unwrap() - 13.0).abs() < 0.01);
        assert_eq!(v["status"], "online");
    }

    #[test]
    fn offline_bridge_keeps_events_local() {
        let mut node = build(ScriptedSerial::new());
        node.monitor_mut()
            .sensor_mut()
            .bus_mut()
            .queue([0, 0, 32767], [0, 0, 0]);

        assert_eq!(node.run_once(0).unwrap(), PollOutcome::Idle);
        assert_eq!(node.monitor().buffer_count(), 1);
        assert!(node.bridge().transport().serial().written().is_empty());
    }

    #[test]
    fn online_bridge_posts_events() {
        let serial = ScriptedSerial::new()
            .on("AT+CIPMUX=1", b"OK\r\n")
            .on("AT+CIPSERVER=0", b"OK\r\n")
            .on("AT+CIPSERVER=1,80", b"OK\r\n")
            .on("AT+CIPSTART=4", b"CONNECT\r\n\r\nOK\r\n")
            .on("AT+CIPSEND=4,", b"> ")
            .on("POST", b"SEND OK\r\n");
        let mut node = build(serial);
        node.bridge_mut().start_server().unwrap();
        node.monitor_mut()
            .sensor_mut()
            .bus_mut()
            .queue([0, 0, 32767], [0, 0, 0]);

        node.run_once(0).unwrap();
        let text = node.bridge().transport().serial().written_text();
        assert!(text.contains("POST /api/earthquake HTTP/1.1"));
        assert!(text.contains("\"event_type\":\"earthquake\""));
    }

    #[test]
    fn run_stops_when_server_cannot_be_rearmed() {
        let mut node = build(ScriptedSerial::with_input(b"ready\r\n"));
        let err = node.run();
        assert!(matches!(err, BridgeError::Transport(_)));
        assert!(!node.bridge().is_online());
    }
}
