use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Domain constants ─────────────────────────────────────────

/// Envelope aggregate tag for every generated record.
pub const AGGREGATE_TYPE: &str = "Vehicle";

/// Envelope event tag for every generated record.
pub const EVENT_TYPE: &str = "Generated";

/// Event name used when a record is published on the bus topic.
pub const BUS_EVENT_NAME: &str = "VehicleGenerated";

pub const HORSEPOWER_RANGE: (u16, u16) = (75, 300);
pub const MODEL_YEAR_RANGE: (u16, u16) = (1980, 2025);
pub const TOP_SPEED_RANGE: (u16, u16) = (120, 320);

// ─── Sampled enums ────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    #[serde(rename = "SUV")]
    Suv,
    PickUp,
    Sedan,
}

impl VehicleType {
    pub const ALL: [VehicleType; 3] = [VehicleType::Suv, VehicleType::PickUp, VehicleType::Sedan];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Suv => "SUV",
            VehicleType::PickUp => "PickUp",
            VehicleType::Sedan => "Sedan",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerSource {
    Electric,
    Hybrid,
    Gas,
}

impl PowerSource {
    pub const ALL: [PowerSource; 3] = [PowerSource::Electric, PowerSource::Hybrid, PowerSource::Gas];

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerSource::Electric => "Electric",
            PowerSource::Hybrid => "Hybrid",
            PowerSource::Gas => "Gas",
        }
    }
}

impl fmt::Display for PowerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Records ──────────────────────────────────────────────────

/// The five sampled fields of a vehicle. Identity is computed from these only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSpec {
    pub vehicle_type: VehicleType,
    pub power_source: PowerSource,
    pub horsepower: u16,
    pub model_year: u16,
    pub top_speed: u16,
}

/// Envelope carried on both output channels, one per tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleEnvelope {
    pub aggregate_type: String,
    pub event_type: String,
    /// Hex SHA-256 of the canonical form of `data`.
    pub identifier: String,
    /// ISO-8601 UTC, millisecond precision.
    pub timestamp: String,
    pub data: VehicleSpec,
}

impl VehicleEnvelope {
    pub fn new(data: VehicleSpec, identifier: String, timestamp: String) -> Self {
        Self {
            aggregate_type: AGGREGATE_TYPE.to_string(),
            event_type: EVENT_TYPE.to_string(),
            identifier,
            timestamp,
            data,
        }
    }
}

// ─── Status ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusLabel {
    Running,
    Stopped,
}

impl StatusLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Running => "RUNNING",
            StatusLabel::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the generator, computed on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_generating: bool,
    pub generated_count: u64,
    pub status_label: StatusLabel,
}

/// Result of a Start or Stop call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub code: u16,
    pub message: String,
}

impl ControlResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            code: 200,
            message: message.into(),
        }
    }
}

// ─── View-update channel ──────────────────────────────────────

/// Messages delivered to live subscribers of the view-update channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum ViewEvent {
    GeneratorVehicleGenerated(VehicleEnvelope),
    GeneratorStatus(StatusSnapshot),
}

impl ViewEvent {
    /// Subscription name the event is delivered under.
    pub fn name(&self) -> &'static str {
        match self {
            ViewEvent::GeneratorVehicleGenerated(_) => "GeneratorVehicleGenerated",
            ViewEvent::GeneratorStatus(_) => "GeneratorStatus",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> VehicleSpec {
        VehicleSpec {
            vehicle_type: VehicleType::Suv,
            power_source: PowerSource::Hybrid,
            horsepower: 150,
            model_year: 2001,
            top_speed: 210,
        }
    }

    #[test]
    fn test_envelope_wire_names() {
        let envelope = VehicleEnvelope::new(
            sample_spec(),
            "ab".repeat(32),
            "2025-01-01T00:00:00.000Z".to_string(),
        );
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["aggregateType"], "Vehicle");
        assert_eq!(json["eventType"], "Generated");
        assert_eq!(json["data"]["vehicleType"], "SUV");
        assert_eq!(json["data"]["powerSource"], "Hybrid");
        assert_eq!(json["data"]["modelYear"], 2001);
        assert_eq!(json["data"]["topSpeed"], 210);
    }

    #[test]
    fn test_status_snapshot_wire_names() {
        let snapshot = StatusSnapshot {
            is_generating: true,
            generated_count: 7,
            status_label: StatusLabel::Running,
        };
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["isGenerating"], true);
        assert_eq!(json["generatedCount"], 7);
        assert_eq!(json["statusLabel"], "RUNNING");
    }

    #[test]
    fn test_view_event_names() {
        let status = ViewEvent::GeneratorStatus(StatusSnapshot {
            is_generating: false,
            generated_count: 0,
            status_label: StatusLabel::Stopped,
        });
        assert_eq!(status.name(), "GeneratorStatus");

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["kind"], "GeneratorStatus");
        assert_eq!(json["data"]["statusLabel"], "STOPPED");
    }
}
