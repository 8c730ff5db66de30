use std::error::Error as StdError;

use thiserror::Error;

use crate::device::models::{CapabilityId, CapabilityValue};
use crate::engine::AcquisitionState;

/// Failure reported by a device transport. Carries an optional cause so
/// drivers can surface their own error chain.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    cause: Option<Box<TransportError>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn caused_by(mut self, cause: TransportError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("Device manager is not available")]
    ManagerUnavailable(#[source] Option<TransportError>),

    #[error("No devices found")]
    NoDevicesFound,

    #[error("No device selected")]
    NoDeviceSelected,

    #[error("Failed to open device {device}")]
    DeviceOpen {
        device: String,
        #[source]
        source: TransportError,
    },

    #[error("Capability {capability} does not accept {value}")]
    UnsupportedCapability {
        capability: CapabilityId,
        value: CapabilityValue,
        #[source]
        source: Option<TransportError>,
    },

    #[error("Failed to start image transfer")]
    TransferStart(#[source] TransportError),

    #[error("Scan failed: {0}")]
    ScanFailed(String),

    #[error("An acquisition is already in progress")]
    Busy,

    #[error("Cannot cancel while {0:?}")]
    NotTransferring(AcquisitionState),
}

/// Render an error and its causes as one line per distinct message, in
/// chain order.
pub fn full_error_message(err: &(dyn StdError + 'static)) -> String {
    let mut seen: Vec<String> = Vec::new();
    let mut current = Some(err);

    while let Some(e) = current {
        let message = e.to_string();
        if !seen.contains(&message) {
            seen.push(message);
        }
        current = e.source();
    }

    seen.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_messages_in_chain_are_listed_once() {
        let chain = TransportError::new("A")
            .caused_by(TransportError::new("B").caused_by(TransportError::new("A")));
        assert_eq!(full_error_message(&chain), "A\nB");
    }

    #[test]
    fn wrapped_transport_cause_is_rendered_after_outer_message() {
        let err = AcquireError::DeviceOpen {
            device: "Flatbed".into(),
            source: TransportError::new("device busy")
                .caused_by(TransportError::new("usb pipe stalled")),
        };
        assert_eq!(
            full_error_message(&err),
            "Failed to open device Flatbed\ndevice busy\nusb pipe stalled"
        );
    }

    #[test]
    fn error_without_cause_renders_single_line() {
        assert_eq!(
            full_error_message(&AcquireError::NoDevicesFound),
            "No devices found"
        );
    }
}
