use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Availability of the resource as recorded on the ledger.
///
/// The discriminants are part of the ledger schema and are sent as a single
/// byte on every status update. Do not reorder or renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum ResourceStatus {
    #[default]
    Idle = 0,
    Busy = 1,
    Offline = 2,
    Suspended = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource status ordinal {0}")]
pub struct UnknownStatus(pub u8);

impl ResourceStatus {
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceStatus::Idle => "Idle",
            ResourceStatus::Busy => "Busy",
            ResourceStatus::Offline => "Offline",
            ResourceStatus::Suspended => "Suspended",
        }
    }
}

impl From<ResourceStatus> for u8 {
    fn from(status: ResourceStatus) -> Self {
        status.ordinal()
    }
}

impl TryFrom<u8> for ResourceStatus {
    type Error = UnknownStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ResourceStatus::Idle),
            1 => Ok(ResourceStatus::Busy),
            2 => Ok(ResourceStatus::Offline),
            3 => Ok(ResourceStatus::Suspended),
            other => Err(UnknownStatus(other)),
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(ResourceStatus::Idle),
            "busy" => Ok(ResourceStatus::Busy),
            "offline" => Ok(ResourceStatus::Offline),
            "suspended" => Ok(ResourceStatus::Suspended),
            _ => Err(format!("invalid resource status: {s}")),
        }
    }
}

/// Capability profile advertised to the ledger at registration.
///
/// `compute_rating` and `price_per_hour` are derived from the other fields;
/// the worker computes them with its scoring table before building this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCapability {
    #[serde(rename = "id")]
    pub resource_id: u64,
    pub gpu_model: String,
    pub vram_gb: u8,
    pub cpu_cores: u8,
    pub compute_rating: u32,
    /// Base currency units per hour.
    pub price_per_hour: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordinals_are_stable() {
        assert_eq!(ResourceStatus::Idle.ordinal(), 0);
        assert_eq!(ResourceStatus::Busy.ordinal(), 1);
        assert_eq!(ResourceStatus::Offline.ordinal(), 2);
        assert_eq!(ResourceStatus::Suspended.ordinal(), 3);
    }

    #[test]
    fn test_status_serializes_as_ordinal() {
        assert_eq!(serde_json::to_string(&ResourceStatus::Busy).unwrap(), "1");
        let status: ResourceStatus = serde_json::from_str("3").unwrap();
        assert_eq!(status, ResourceStatus::Suspended);
        assert!(serde_json::from_str::<ResourceStatus>("4").is_err());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            ResourceStatus::from_str("OFFLINE"),
            Ok(ResourceStatus::Offline)
        );
        assert!(ResourceStatus::from_str("gone").is_err());
    }

    #[test]
    fn test_capability_wire_format() {
        let capability = ResourceCapability {
            resource_id: 123456789,
            gpu_model: "NVIDIA H100".to_string(),
            vram_gb: 80,
            cpu_cores: 32,
            compute_rating: 56000,
            price_per_hour: 50000,
        };
        let value = serde_json::to_value(&capability).unwrap();
        assert_eq!(value["id"], 123456789);
        assert_eq!(value["gpu_model"], "NVIDIA H100");
        assert_eq!(value["price_per_hour"], 50000);
    }
}
