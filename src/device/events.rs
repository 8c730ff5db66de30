use std::fmt;

use crate::device::models::Resolution;

/// Asynchronous event kinds a device can be asked to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsyncEventKind {
    PaperJam,
    CheckDeviceOnline,
    CheckBattery,
    CheckPowerSupply,
    CheckResolution,
    CheckFlash,
    CheckAutomaticCapture,
    Other(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSupply {
    External,
    Battery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode {
    None,
    Auto,
    Forced,
    RedEye,
}

/// An event raised by the device outside the normal transfer callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    PaperJam,
    CheckDeviceOnline,
    CheckBattery {
        minutes: Option<i32>,
        percentage: Option<i16>,
    },
    CheckPowerSupply {
        supply: Option<PowerSupply>,
    },
    CheckResolution {
        resolution: Option<Resolution>,
    },
    CheckFlash {
        flash_used: Option<FlashMode>,
    },
    CheckAutomaticCapture {
        enabled: Option<bool>,
        time_before_first_capture: Option<u32>,
        time_between_captures: Option<u32>,
    },
    Other {
        code: u16,
    },
}

impl DeviceEvent {
    pub fn kind(&self) -> AsyncEventKind {
        match self {
            DeviceEvent::PaperJam => AsyncEventKind::PaperJam,
            DeviceEvent::CheckDeviceOnline => AsyncEventKind::CheckDeviceOnline,
            DeviceEvent::CheckBattery { .. } => AsyncEventKind::CheckBattery,
            DeviceEvent::CheckPowerSupply { .. } => AsyncEventKind::CheckPowerSupply,
            DeviceEvent::CheckResolution { .. } => AsyncEventKind::CheckResolution,
            DeviceEvent::CheckFlash { .. } => AsyncEventKind::CheckFlash,
            DeviceEvent::CheckAutomaticCapture { .. } => AsyncEventKind::CheckAutomaticCapture,
            DeviceEvent::Other { code } => AsyncEventKind::Other(*code),
        }
    }

    /// Human-readable notice for the presentation layer.
    pub fn describe(&self, device_name: &str) -> String {
        match self {
            DeviceEvent::PaperJam => "Paper is jammed.".to_string(),
            DeviceEvent::CheckDeviceOnline => "Check that the device is online.".to_string(),
            DeviceEvent::CheckBattery {
                minutes,
                percentage,
            } => format!(
                "DeviceEvent: Device={device_name}, Event=CheckBattery, BatteryMinutes={}, BatteryPercentage={}",
                opt(minutes),
                opt(percentage)
            ),
            DeviceEvent::CheckPowerSupply { supply } => format!(
                "DeviceEvent: Device={device_name}, Event=CheckPowerSupply, PowerSupply={}",
                opt_debug(supply)
            ),
            DeviceEvent::CheckResolution { resolution } => format!(
                "DeviceEvent: Device={device_name}, Event=CheckResolution, Resolution={}",
                resolution
                    .map(|r| format!("{}x{}", r.x, r.y))
                    .unwrap_or_else(|| "unknown".to_string())
            ),
            DeviceEvent::CheckFlash { flash_used } => format!(
                "DeviceEvent: Device={device_name}, Event=CheckFlash, FlashUsed={}",
                opt_debug(flash_used)
            ),
            DeviceEvent::CheckAutomaticCapture {
                enabled,
                time_before_first_capture,
                time_between_captures,
            } => format!(
                "DeviceEvent: Device={device_name}, Event=CheckAutomaticCapture, AutomaticCapture={}, TimeBeforeFirstCapture={}, TimeBetweenCaptures={}",
                opt(enabled),
                opt(time_before_first_capture),
                opt(time_between_captures)
            ),
            DeviceEvent::Other { code } => {
                format!("DeviceEvent: Device={device_name}, Event={code:#06x}")
            }
        }
    }
}

fn opt<T: fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn opt_debug<T: fmt::Debug>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| format!("{v:?}"))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_event_lists_payload_fields() {
        let event = DeviceEvent::CheckBattery {
            minutes: Some(42),
            percentage: None,
        };
        assert_eq!(
            event.describe("Scanner A"),
            "DeviceEvent: Device=Scanner A, Event=CheckBattery, BatteryMinutes=42, BatteryPercentage=unknown"
        );
    }

    #[test]
    fn unknown_event_falls_back_to_code() {
        let event = DeviceEvent::Other { code: 0x8001 };
        assert_eq!(event.kind(), AsyncEventKind::Other(0x8001));
        assert_eq!(
            event.describe("Cam"),
            "DeviceEvent: Device=Cam, Event=0x8001"
        );
    }

    #[test]
    fn paper_jam_has_fixed_text() {
        assert_eq!(DeviceEvent::PaperJam.describe("any"), "Paper is jammed.");
        assert_eq!(DeviceEvent::PaperJam.kind(), AsyncEventKind::PaperJam);
    }
}
