use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProtocol {
    Twain,
    Wia,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub product_name: String,
    pub manufacturer: String,
    pub product_family: String,
    pub protocol: DeviceProtocol,
    pub has_feeder: bool,
    pub supports_async_events: bool,
}

/// Lifecycle of a device as reported by the transport. Ordered so callers
/// can ask "is the device at least enabled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeviceState {
    Closed,
    Opened,
    Enabled,
    TransferReady,
    Transferring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    Bw,
    Gray,
    Rgb,
}

impl FromStr for PixelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bw" | "blackwhite" | "1bit" => Ok(PixelType::Bw),
            "gray" | "grey" | "grayscale" => Ok(PixelType::Gray),
            "rgb" | "color" | "colour" => Ok(PixelType::Rgb),
            other => Err(format!("Unknown pixel type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOfMeasure {
    Inches,
    Centimeters,
    Pixels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    Native,
    Memory,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityId {
    PixelType,
    UnitOfMeasure,
    XResolution,
    YResolution,
    FeederEnabled,
    DuplexEnabled,
    UndefinedImageSize,
}

impl CapabilityId {
    pub const ALL: [CapabilityId; 7] = [
        CapabilityId::PixelType,
        CapabilityId::UnitOfMeasure,
        CapabilityId::XResolution,
        CapabilityId::YResolution,
        CapabilityId::FeederEnabled,
        CapabilityId::DuplexEnabled,
        CapabilityId::UndefinedImageSize,
    ];
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilityId::PixelType => "pixel type",
            CapabilityId::UnitOfMeasure => "unit of measure",
            CapabilityId::XResolution => "x resolution",
            CapabilityId::YResolution => "y resolution",
            CapabilityId::FeederEnabled => "feeder enabled",
            CapabilityId::DuplexEnabled => "duplex enabled",
            CapabilityId::UndefinedImageSize => "undefined image size",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapabilityValue {
    Bool(bool),
    Float(f32),
    Pixel(PixelType),
    Unit(UnitOfMeasure),
}

impl fmt::Display for CapabilityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityValue::Bool(b) => write!(f, "{b}"),
            CapabilityValue::Float(v) => write!(f, "{v}"),
            CapabilityValue::Pixel(p) => write!(f, "{p:?}"),
            CapabilityValue::Unit(u) => write!(f, "{u:?}"),
        }
    }
}

/// The values a device will accept for one capability.
#[derive(Debug, Clone, PartialEq)]
pub enum SupportedValues {
    One(CapabilityValue),
    List(Vec<CapabilityValue>),
    Range { min: f32, max: f32, step: f32 },
}

impl SupportedValues {
    pub fn contains(&self, value: &CapabilityValue) -> bool {
        match self {
            SupportedValues::One(v) => v == value,
            SupportedValues::List(values) => values.contains(value),
            SupportedValues::Range { min, max, step } => {
                let CapabilityValue::Float(v) = value else {
                    return false;
                };
                if v < min || v > max {
                    return false;
                }
                if *step <= 0.0 {
                    return true;
                }
                let steps = (v - min) / step;
                (steps - steps.round()).abs() < 1e-3
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    pub id: CapabilityId,
    pub current: CapabilityValue,
    pub supported: SupportedValues,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub x: f32,
    pub y: f32,
}

/// Per-acquisition switches handed to the transport when the transfer
/// starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferSettings {
    pub mode: TransferMode,
    pub show_ui: bool,
    pub modal_ui: bool,
    pub show_indicators: bool,
    pub disable_after_acquire: bool,
}

/// Capabilities a product family needs switched on before transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorQuirk {
    pub product_prefix: &'static str,
    pub enable: &'static [CapabilityId],
}

pub static KNOWN_QUIRKS: &[VendorQuirk] = &[VendorQuirk {
    // Fujitsu feeders cut pages short unless the length is left open.
    product_prefix: "FUJITSU",
    enable: &[CapabilityId::UndefinedImageSize],
}];

pub fn quirks_for(product_name: &str) -> impl Iterator<Item = &'static VendorQuirk> + '_ {
    let upper = product_name.to_ascii_uppercase();
    KNOWN_QUIRKS
        .iter()
        .filter(move |q| upper.starts_with(q.product_prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_state_ordering_matches_lifecycle() {
        assert!(DeviceState::Closed < DeviceState::Opened);
        assert!(DeviceState::Opened < DeviceState::Enabled);
        assert!(DeviceState::Transferring >= DeviceState::Enabled);
    }

    #[test]
    fn range_accepts_values_on_step() {
        let range = SupportedValues::Range {
            min: 75.0,
            max: 600.0,
            step: 75.0,
        };
        assert!(range.contains(&CapabilityValue::Float(150.0)));
        assert!(!range.contains(&CapabilityValue::Float(100.0)));
        assert!(!range.contains(&CapabilityValue::Float(1200.0)));
        assert!(!range.contains(&CapabilityValue::Bool(true)));
    }

    #[test]
    fn list_and_single_values() {
        let list = SupportedValues::List(vec![
            CapabilityValue::Pixel(PixelType::Gray),
            CapabilityValue::Pixel(PixelType::Rgb),
        ]);
        assert!(list.contains(&CapabilityValue::Pixel(PixelType::Rgb)));
        assert!(!list.contains(&CapabilityValue::Pixel(PixelType::Bw)));

        let one = SupportedValues::One(CapabilityValue::Bool(false));
        assert!(one.contains(&CapabilityValue::Bool(false)));
        assert!(!one.contains(&CapabilityValue::Bool(true)));
    }

    #[test]
    fn fujitsu_quirk_matches_case_insensitively() {
        let quirks: Vec<_> = quirks_for("Fujitsu fi-7160").collect();
        assert_eq!(quirks.len(), 1);
        assert_eq!(quirks[0].enable, &[CapabilityId::UndefinedImageSize]);
        assert_eq!(quirks_for("Canon LiDE 300").count(), 0);
    }

    #[test]
    fn pixel_type_parses_config_spellings() {
        assert_eq!("BW".parse::<PixelType>(), Ok(PixelType::Bw));
        assert_eq!("grey".parse::<PixelType>(), Ok(PixelType::Gray));
        assert_eq!("color".parse::<PixelType>(), Ok(PixelType::Rgb));
        assert!("cmyk".parse::<PixelType>().is_err());
    }
}
