//! Telemetry records and batches
//!
//! This module defines the ordinary (best-effort) telemetry values and
//! their wire shapes:
//!
//! ```text
//! event:  {"type":"event",  "eventName":..,  "timestamp":.., "attributes":{..}}
//! metric: {"type":"metric", "metricName":.., "value":..,     "timestamp":.., "attributes":{..}}
//! batch:  {"type":"batch",  "events":[..],   "batch_size":.., "timestamp":..}
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::attributes::Attributes;

/// Kind of a telemetry record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A named occurrence
    Event,
    /// A named numeric measurement
    Metric,
    /// A crash report
    Error,
    /// A group of records sent together
    Batch,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordKind::Event => "event",
            RecordKind::Metric => "metric",
            RecordKind::Error => "error",
            RecordKind::Batch => "batch",
        };
        write!(f, "{}", s)
    }
}

/// Formats a timestamp the way every payload carries it (RFC 3339, millis, `Z`)
pub fn wire_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A single event or metric accepted by the batcher
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    kind: RecordKind,
    name: String,
    timestamp: DateTime<Utc>,
    attributes: Attributes,
    value: Option<f64>,
}

impl TelemetryRecord {
    /// Creates an event record stamped with the current time
    pub fn event(name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            kind: RecordKind::Event,
            name: name.into(),
            timestamp: Utc::now(),
            attributes,
            value: None,
        }
    }

    /// Creates a metric record stamped with the current time
    pub fn metric(name: impl Into<String>, value: f64, attributes: Attributes) -> Self {
        Self {
            kind: RecordKind::Metric,
            name: name.into(),
            timestamp: Utc::now(),
            attributes,
            value: Some(value),
        }
    }

    /// Overrides the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Overlays `base` underneath this record's own attributes
    pub fn with_base_attributes(mut self, base: &Attributes) -> Self {
        self.attributes = self.attributes.layered_over(base);
        self
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Metric value; `None` for events
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Wire representation of this record
    pub fn to_wire(&self) -> Value {
        let timestamp = wire_timestamp(&self.timestamp);
        match self.kind {
            RecordKind::Metric => json!({
                "type": "metric",
                "metricName": self.name,
                "value": self.value,
                "timestamp": timestamp,
                "attributes": self.attributes,
            }),
            kind => json!({
                "type": kind.to_string(),
                "eventName": self.name,
                "timestamp": timestamp,
                "attributes": self.attributes,
            }),
        }
    }
}

/// An immutable group of records sent as one network unit
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    records: Vec<TelemetryRecord>,
    timestamp: DateTime<Utc>,
}

impl Batch {
    /// Freezes `records` into a batch stamped with the current time
    pub fn new(records: Vec<TelemetryRecord>) -> Self {
        Self {
            records,
            timestamp: Utc::now(),
        }
    }

    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Wire representation of this batch
    pub fn to_wire(&self) -> Value {
        let events: Vec<Value> = self.records.iter().map(TelemetryRecord::to_wire).collect();
        json!({
            "type": "batch",
            "events": events,
            "batch_size": self.records.len(),
            "timestamp": wire_timestamp(&self.timestamp),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_event_wire_shape() {
        let record = TelemetryRecord::event("screen_view", Attributes::new().with("screen", "home"))
            .with_timestamp(fixed_time());

        let wire = record.to_wire();
        assert_eq!(wire["type"], "event");
        assert_eq!(wire["eventName"], "screen_view");
        assert_eq!(wire["timestamp"], "2026-03-01T12:00:00.000Z");
        assert_eq!(wire["attributes"]["screen"], "home");
        assert!(wire.get("value").is_none());
        assert!(wire.get("metricName").is_none());
    }

    #[test]
    fn test_metric_wire_shape() {
        let record = TelemetryRecord::metric("latency_ms", 12.5, Attributes::new())
            .with_timestamp(fixed_time());

        let wire = record.to_wire();
        assert_eq!(wire["type"], "metric");
        assert_eq!(wire["metricName"], "latency_ms");
        assert_eq!(wire["value"], 12.5);
        assert!(wire.get("eventName").is_none());
    }

    #[test]
    fn test_batch_wire_preserves_order() {
        let records: Vec<_> = (0..3)
            .map(|i| TelemetryRecord::event(format!("e{i}"), Attributes::new()))
            .collect();
        let batch = Batch::new(records);

        let wire = batch.to_wire();
        assert_eq!(wire["type"], "batch");
        assert_eq!(wire["batch_size"], 3);
        let names: Vec<&str> = wire["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["eventName"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["e0", "e1", "e2"]);
    }

    #[test]
    fn test_base_attributes_do_not_override_record() {
        let base = Attributes::new().with("app", "shop").with("screen", "base");
        let record = TelemetryRecord::event("tap", Attributes::new().with("screen", "cart"))
            .with_base_attributes(&base);

        assert_eq!(record.attributes().get("screen"), Some("cart"));
        assert_eq!(record.attributes().get("app"), Some("shop"));
    }
}
