use crate::device::events::AsyncEventKind;
use crate::device::models::{
    Capability, CapabilityId, CapabilityValue, DeviceId, DeviceInfo, DeviceState, TransferSettings,
};
use crate::dispatch::EventSender;
use crate::error::TransportError;
use crate::locale::ManagerLocale;

/// Device-manager protocol generations, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V2,
    V1,
}

/// Which driver build the manager should load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverArch {
    Bits32,
    Bits64,
}

impl DriverArch {
    pub fn host() -> Self {
        if cfg!(target_pointer_width = "64") {
            DriverArch::Bits64
        } else {
            DriverArch::Bits32
        }
    }
}

/// The device-access layer the engine drives. Implementations may emit
/// transfer events from any thread through the `EventSender` handed to
/// `start_transfer`.
pub trait DeviceTransport: Send {
    fn is_available(&mut self, version: ProtocolVersion) -> bool;

    fn open_manager(
        &mut self,
        version: ProtocolVersion,
        arch: DriverArch,
        locale: ManagerLocale,
    ) -> Result<(), TransportError>;

    fn close_manager(&mut self);

    fn enumerate(&mut self) -> Result<Vec<DeviceInfo>, TransportError>;

    fn default_device(&mut self) -> Option<DeviceId>;

    /// Let the user pick a device; updates the default on success.
    fn select_device_interactively(&mut self) -> Option<DeviceId>;

    fn open_device(&mut self, device: &DeviceId) -> Result<(), TransportError>;

    fn close_device(&mut self, device: &DeviceId) -> Result<(), TransportError>;

    fn device_state(&self, device: &DeviceId) -> DeviceState;

    fn capability(&self, device: &DeviceId, id: CapabilityId)
        -> Result<Capability, TransportError>;

    fn set_capability(
        &mut self,
        device: &DeviceId,
        id: CapabilityId,
        value: CapabilityValue,
    ) -> Result<(), TransportError>;

    fn supported_async_events(
        &self,
        device: &DeviceId,
    ) -> Result<Vec<AsyncEventKind>, TransportError>;

    fn enable_async_events(
        &mut self,
        device: &DeviceId,
        events: &[AsyncEventKind],
    ) -> Result<(), TransportError>;

    fn start_transfer(
        &mut self,
        device: &DeviceId,
        settings: &TransferSettings,
        events: EventSender,
    ) -> Result<(), TransportError>;

    fn cancel_transfer(&mut self, device: &DeviceId) -> Result<(), TransportError>;
}
