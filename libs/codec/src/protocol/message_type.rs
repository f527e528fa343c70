//! Message types carried in byte 5 of the ASOA header

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

/// ASOA message types
///
/// Core runtime messages occupy 0x01-0x06; the demo vehicle modules extend
/// the range with sensor payload types starting at 0x10. Any other byte is
/// rejected during header decode.
#[repr(u8)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    // Runtime control (0x01-0x0F)
    Discovery = 0x01,
    GuaranteeData = 0x02,
    RequirementRequest = 0x03,
    Acknowledgment = 0x04,
    Heartbeat = 0x05,
    Error = 0x06,

    // Domain extensions (0x10-0x1F)
    TemperatureData = 0x10,
    SensorFusion = 0x11,
    ObstacleData = 0x12,
}

impl MessageType {
    /// Check if this message type can carry a sensor reading block
    pub fn carries_sensor_data(&self) -> bool {
        matches!(
            self,
            Self::GuaranteeData | Self::TemperatureData | Self::SensorFusion | Self::ObstacleData
        )
    }

    /// Check if this is a domain extension rather than a runtime control type
    pub fn is_domain_extension(&self) -> bool {
        matches!(*self as u8, 0x10..=0x1F)
    }
}
