use std::collections::BTreeMap;

use crate::device::events::AsyncEventKind;
use crate::device::models::{
    quirks_for, Capability, CapabilityId, CapabilityValue, DeviceInfo, DeviceProtocol,
    DeviceState, PixelType, UnitOfMeasure,
};
use crate::device::transport::DeviceTransport;
use crate::error::{AcquireError, TransportError};

/// One opened device and the capabilities it reported when opened.
#[derive(Debug)]
pub struct DeviceSession {
    info: DeviceInfo,
    capabilities: BTreeMap<CapabilityId, Capability>,
    open: bool,
}

impl DeviceSession {
    pub fn open<T: DeviceTransport>(
        transport: &mut T,
        info: DeviceInfo,
    ) -> Result<Self, AcquireError> {
        transport
            .open_device(&info.id)
            .map_err(|source| AcquireError::DeviceOpen {
                device: info.product_name.clone(),
                source,
            })?;

        let capabilities: BTreeMap<_, _> = CapabilityId::ALL
            .iter()
            .filter_map(|id| transport.capability(&info.id, *id).ok())
            .map(|cap| (cap.id, cap))
            .collect();

        tracing::info!(
            "Opened {} ({} capabilities negotiated)",
            info.product_name,
            capabilities.len()
        );

        Ok(Self {
            info,
            capabilities,
            open: true,
        })
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn capability(&self, id: CapabilityId) -> Option<&Capability> {
        self.capabilities.get(&id)
    }

    pub fn state<T: DeviceTransport>(&self, transport: &T) -> DeviceState {
        if !self.open {
            return DeviceState::Closed;
        }
        transport.device_state(&self.info.id)
    }

    /// Best-effort set. On failure the device keeps its existing value.
    pub fn set_capability<T: DeviceTransport>(
        &mut self,
        transport: &mut T,
        id: CapabilityId,
        value: CapabilityValue,
    ) -> Result<(), AcquireError> {
        let unsupported = |source: Option<TransportError>| AcquireError::UnsupportedCapability {
            capability: id,
            value,
            source,
        };

        let Some(cap) = self.capabilities.get_mut(&id) else {
            return Err(unsupported(None));
        };
        if cap.current == value {
            return Ok(());
        }
        if !cap.supported.contains(&value) {
            return Err(unsupported(None));
        }

        transport
            .set_capability(&self.info.id, id, value)
            .map_err(|e| unsupported(Some(e)))?;
        cap.current = value;
        tracing::debug!("{}: {id} = {value}", self.info.product_name);
        Ok(())
    }

    pub fn set_pixel_type<T: DeviceTransport>(
        &mut self,
        transport: &mut T,
        pixel_type: PixelType,
    ) -> Result<(), AcquireError> {
        self.set_capability(
            transport,
            CapabilityId::PixelType,
            CapabilityValue::Pixel(pixel_type),
        )
    }

    pub fn ensure_unit_inches<T: DeviceTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<(), AcquireError> {
        let already = self
            .capability(CapabilityId::UnitOfMeasure)
            .is_some_and(|c| c.current == CapabilityValue::Unit(UnitOfMeasure::Inches));
        if already {
            return Ok(());
        }
        self.set_capability(
            transport,
            CapabilityId::UnitOfMeasure,
            CapabilityValue::Unit(UnitOfMeasure::Inches),
        )
    }

    /// Sets X and Y independently; returns whatever failed.
    pub fn set_resolution<T: DeviceTransport>(
        &mut self,
        transport: &mut T,
        dpi: f32,
    ) -> Vec<AcquireError> {
        [CapabilityId::XResolution, CapabilityId::YResolution]
            .into_iter()
            .filter_map(|id| {
                self.set_capability(transport, id, CapabilityValue::Float(dpi))
                    .err()
            })
            .collect()
    }

    pub fn has_feeder(&self) -> bool {
        self.info.has_feeder && self.info.protocol == DeviceProtocol::Twain
    }

    /// Feeder and duplex switches, each tolerant of being unsupported.
    /// Does nothing for devices without a feeder.
    pub fn configure_feeder<T: DeviceTransport>(
        &mut self,
        transport: &mut T,
        enabled: bool,
        duplex: bool,
    ) -> Vec<AcquireError> {
        if !self.has_feeder() {
            return Vec::new();
        }
        [
            (CapabilityId::FeederEnabled, enabled),
            (CapabilityId::DuplexEnabled, duplex),
        ]
        .into_iter()
        .filter_map(|(id, on)| {
            self.set_capability(transport, id, CapabilityValue::Bool(on))
                .err()
        })
        .collect()
    }

    /// Subscribe to every async event kind the device supports.
    pub fn enable_async_events<T: DeviceTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<Vec<AsyncEventKind>, String> {
        if !self.info.supports_async_events {
            return Ok(Vec::new());
        }
        let kinds = transport
            .supported_async_events(&self.info.id)
            .map_err(|e| format!("Async events unavailable: {e}"))?;
        transport
            .enable_async_events(&self.info.id, &kinds)
            .map_err(|e| format!("Failed to enable async events: {e}"))?;
        tracing::debug!("{}: async events {:?}", self.info.product_name, kinds);
        Ok(kinds)
    }

    /// Switch on the capabilities the product family needs. Capabilities
    /// the device does not report are skipped silently.
    pub fn apply_vendor_quirks<T: DeviceTransport>(
        &mut self,
        transport: &mut T,
    ) -> Vec<AcquireError> {
        let ids: Vec<CapabilityId> = quirks_for(&self.info.product_name)
            .flat_map(|q| q.enable.iter().copied())
            .filter(|id| self.capabilities.contains_key(id))
            .collect();

        ids.into_iter()
            .filter_map(|id| {
                self.set_capability(transport, id, CapabilityValue::Bool(true))
                    .err()
            })
            .collect()
    }

    /// Closes the device whatever state it is in. Safe to call twice.
    pub fn close<T: DeviceTransport>(&mut self, transport: &mut T) {
        if !self.open {
            return;
        }
        if let Err(e) = transport.close_device(&self.info.id) {
            tracing::warn!("Closing {} reported: {e}", self.info.product_name);
        }
        self.open = false;
        tracing::info!("Closed {}", self.info.product_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::models::SupportedValues;
    use crate::simulated::{SimulatedTransport, VirtualDevice};

    fn open(device: VirtualDevice) -> (SimulatedTransport, DeviceSession) {
        let info = device.info.clone();
        let mut transport = SimulatedTransport::new(vec![device]);
        let session = DeviceSession::open(&mut transport, info).unwrap();
        (transport, session)
    }

    #[test]
    fn open_negotiates_reported_capabilities() {
        let (_, session) = open(VirtualDevice::flatbed("Flatbed"));
        assert!(session.capability(CapabilityId::PixelType).is_some());
        assert!(session.capability(CapabilityId::FeederEnabled).is_none());
    }

    #[test]
    fn open_failure_carries_reason() {
        let device = VirtualDevice::flatbed("Broken").failing_open("lamp warming up");
        let info = device.info.clone();
        let mut transport = SimulatedTransport::new(vec![device]);

        let err = DeviceSession::open(&mut transport, info).unwrap_err();
        assert!(matches!(err, AcquireError::DeviceOpen { ref source, .. } if source.message() == "lamp warming up"));
    }

    #[test]
    fn a_device_cannot_be_opened_twice() {
        let device = VirtualDevice::flatbed("Flatbed");
        let info = device.info.clone();
        let mut transport = SimulatedTransport::new(vec![device]);

        let _first = DeviceSession::open(&mut transport, info.clone()).unwrap();
        assert!(DeviceSession::open(&mut transport, info).is_err());
    }

    #[test]
    fn unsupported_value_keeps_existing_one() {
        let device = VirtualDevice::flatbed("Flatbed").with_capability(Capability {
            id: CapabilityId::PixelType,
            current: CapabilityValue::Pixel(PixelType::Gray),
            supported: SupportedValues::List(vec![
                CapabilityValue::Pixel(PixelType::Gray),
                CapabilityValue::Pixel(PixelType::Rgb),
            ]),
        });
        let (mut transport, mut session) = open(device);

        let err = session.set_pixel_type(&mut transport, PixelType::Bw).unwrap_err();
        assert!(matches!(err, AcquireError::UnsupportedCapability { capability: CapabilityId::PixelType, .. }));
        assert_eq!(
            transport.current_value(&session.info().id, CapabilityId::PixelType),
            Some(CapabilityValue::Pixel(PixelType::Gray))
        );
    }

    #[test]
    fn resolution_axes_are_independent() {
        let device = VirtualDevice::flatbed("Flatbed").without_capability(CapabilityId::YResolution);
        let (mut transport, mut session) = open(device);

        let failures = session.set_resolution(&mut transport, 300.0);
        assert_eq!(failures.len(), 1);
        assert_eq!(
            transport.current_value(&session.info().id, CapabilityId::XResolution),
            Some(CapabilityValue::Float(300.0))
        );
    }

    #[test]
    fn feeder_switches_fail_independently() {
        let device = VirtualDevice::feeder("Canon DR-C225").without_capability(CapabilityId::DuplexEnabled);
        let (mut transport, mut session) = open(device);

        let failures = session.configure_feeder(&mut transport, true, true);
        assert_eq!(failures.len(), 1);
        assert_eq!(
            transport.current_value(&session.info().id, CapabilityId::FeederEnabled),
            Some(CapabilityValue::Bool(true))
        );
    }

    #[test]
    fn feeder_config_skipped_for_wia_devices() {
        let mut device = VirtualDevice::feeder("WIA feeder");
        device.info.protocol = DeviceProtocol::Wia;
        let (mut transport, mut session) = open(device);

        assert!(session.configure_feeder(&mut transport, true, true).is_empty());
        assert_eq!(
            transport.current_value(&session.info().id, CapabilityId::FeederEnabled),
            Some(CapabilityValue::Bool(false))
        );
    }

    #[test]
    fn fujitsu_gets_undefined_image_size() {
        let (mut transport, mut session) = open(VirtualDevice::feeder("FUJITSU fi-7160"));

        assert!(session.apply_vendor_quirks(&mut transport).is_empty());
        assert_eq!(
            transport.current_value(&session.info().id, CapabilityId::UndefinedImageSize),
            Some(CapabilityValue::Bool(true))
        );
    }

    #[test]
    fn other_vendors_are_left_alone() {
        let (mut transport, mut session) = open(VirtualDevice::feeder("Canon DR-C225"));

        assert!(session.apply_vendor_quirks(&mut transport).is_empty());
        assert_eq!(
            transport.current_value(&session.info().id, CapabilityId::UndefinedImageSize),
            Some(CapabilityValue::Bool(false))
        );
    }

    #[test]
    fn async_events_enabled_when_advertised() {
        let (mut transport, mut session) = open(VirtualDevice::feeder("Canon DR-C225"));
        let kinds = session.enable_async_events(&mut transport).unwrap();
        assert!(kinds.contains(&AsyncEventKind::PaperJam));
        assert_eq!(transport.enabled_async_events(&session.info().id), kinds);
    }

    #[test]
    fn close_is_idempotent() {
        let (mut transport, mut session) = open(VirtualDevice::flatbed("Flatbed"));
        session.close(&mut transport);
        session.close(&mut transport);
        assert!(!session.is_open());
        assert_eq!(session.state(&transport), DeviceState::Closed);
        assert_eq!(transport.close_count(&session.info().id), 1);
    }
}
