// SeismoNode: Sensor Samples, Events & Report Payloads

use std::fmt;

// ---------------------------------------------------------------------------
// Sensor Sample (calibrated 6-axis reading from the MPU6050)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorSample {
    /// Acceleration, m/s², calibration offsets removed.
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
    /// Angular rate, °/s.
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
    /// Euclidean norm of the acceleration vector.
    pub magnitude: f32,
    /// Milliseconds on the node clock.
    pub timestamp: u64,
}

impl SensorSample {
    /// JSON body for `GET /api/sensor`.
    pub fn snapshot_json(&self, sensor_ok: bool) -> String {
        format!(
            "{{\"accel_x\":{:.6},\"accel_y\":{:.6},\"accel_z\":{:.6},\
             \"gyro_x\":{:.3},\"gyro_y\":{:.3},\"gyro_z\":{:.3},\
             \"magnitude\":{:.6},\"timestamp\":{},\"status\":\"{}\"}}",
            self.accel_x,
            self.accel_y,
            self.accel_z,
            self.gyro_x,
            self.gyro_y,
            self.gyro_z,
            self.magnitude,
            self.timestamp,
            if sensor_ok { "online" } else { "offline" },
        )
    }
}

// ---------------------------------------------------------------------------
// Event Classification
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventKind {
    #[default]
    Normal,
    Vibration,
    Earthquake,
}

impl EventKind {
    /// Wire name used in collector payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Vibration => "vibration",
            Self::Earthquake => "earthquake",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Seismic Event, built from a sample above the vibration threshold
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeismicEvent {
    pub kind: EventKind,
    pub sample: SensorSample,
    /// Set for earthquake-grade events.
    pub is_significant: bool,
    pub detected_at: u64,
}

impl SeismicEvent {
    pub fn to_json(&self, device_id: &str) -> String {
        let s = &self.sample;
        format!(
            "{{\"device_id\":{},\"timestamp\":{},\
             \"acceleration_x\":{:.6},\"acceleration_y\":{:.6},\"acceleration_z\":{:.6},\
             \"gyro_x\":{:.3},\"gyro_y\":{:.3},\"gyro_z\":{:.3},\
             \"magnitude\":{:.6},\"event_type\":\"{}\",\"is_significant\":{}}}",
            json_string(device_id),
            s.timestamp,
            s.accel_x,
            s.accel_y,
            s.accel_z,
            s.gyro_x,
            s.gyro_y,
            s.gyro_z,
            s.magnitude,
            self.kind,
            self.is_significant,
        )
    }
}

// ---------------------------------------------------------------------------
// Periodic status report
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport<'a> {
    pub device_id: &'a str,
    pub timestamp: u64,
    pub sensor_ok: bool,
    pub avg_magnitude: f32,
    pub buffer_count: usize,
    pub errors: u32,
}

impl StatusReport<'_> {
    pub fn to_json(&self) -> String {
        format!(
            "{{\"device_id\":{},\"timestamp\":{},\"status\":\"online\",\
             \"sensor_ok\":{},\"avg_magnitude\":{:.3},\"buffer_count\":{},\"errors\":{}}}",
            json_string(self.device_id),
            self.timestamp,
            self.sensor_ok,
            self.avg_magnitude,
            self.buffer_count,
            self.errors,
        )
    }
}

fn json_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample() -> SensorSample {
        SensorSample {
            accel_x: 3.0,
            accel_y: 4.0,
            accel_z: 12.0,
            gyro_x: 0.25,
            gyro_y: -1.5,
            gyro_z: 0.0,
            magnitude: 13.0,
            timestamp: 4242,
        }
    }

    #[test]
    fn snapshot_is_valid_json() {
        let v: Value = serde_json::from_str(&sample().snapshot_json(true)).unwrap();
        assert_eq!(v["accel_z"].as_f64(), Some(12.0));
        assert_eq!(v["gyro_y"].as_f64(), Some(-1.5));
        assert_eq!(v["magnitude"].as_f64(), Some(13.0));
        assert_eq!(v["timestamp"].as_u64(), Some(4242));
        assert_eq!(v["status"], "online");

        let v: Value = serde_json::from_str(&sample().snapshot_json(false)).unwrap();
        assert_eq!(v["status"], "offline");
    }

    #[test]
    fn snapshot_uses_fixed_precision() {
        let body = sample().snapshot_json(true);
        assert!(body.contains("\"accel_x\":3.000000"));
        assert!(body.contains("\"gyro_x\":0.250"));
    }

    #[test]
    fn event_payload_fields() {
        let event = SeismicEvent {
            kind: EventKind::Vibration,
            sample: sample(),
            is_significant: false,
            detected_at: 4242,
        };
        let v: Value = serde_json::from_str(&event.to_json("node \"7\"")).unwrap();
        assert_eq!(v["device_id"], "node \"7\"");
        assert_eq!(v["acceleration_y"].as_f64(), Some(4.0));
        assert_eq!(v["event_type"], "vibration");
        assert_eq!(v["is_significant"], false);
    }

    #[test]
    fn status_payload_fields() {
        let report = StatusReport {
            device_id: "n1",
            timestamp: 30_000,
            sensor_ok: true,
            avg_magnitude: 9.8123,
            buffer_count: 50,
            errors: 2,
        };
        let v: Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(v["status"], "online");
        assert_eq!(v["sensor_ok"], true);
        assert_eq!(v["avg_magnitude"].as_f64(), Some(9.812));
        assert_eq!(v["buffer_count"].as_u64(), Some(50));
        assert_eq!(v["errors"].as_u64(), Some(2));
    }
}
