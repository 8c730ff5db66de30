use crate::device::models::DeviceInfo;
use crate::device::transport::{DeviceTransport, DriverArch, ProtocolVersion};
use crate::error::AcquireError;
use crate::locale::ManagerLocale;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Closed,
    Opened,
}

/// Owns the transport and its enumeration lifecycle.
pub struct DeviceManager<T: DeviceTransport> {
    transport: T,
    locale: ManagerLocale,
    state: ManagerState,
    version: Option<ProtocolVersion>,
    devices: Vec<DeviceInfo>,
}

impl<T: DeviceTransport> DeviceManager<T> {
    pub fn new(transport: T, locale: ManagerLocale) -> Self {
        Self {
            transport,
            locale,
            state: ManagerState::Closed,
            version: None,
            devices: Vec::new(),
        }
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    pub fn locale(&self) -> ManagerLocale {
        self.locale
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn open(&mut self) -> Result<(), AcquireError> {
        if self.state == ManagerState::Opened {
            return Ok(());
        }

        let version = [ProtocolVersion::V2, ProtocolVersion::V1]
            .into_iter()
            .find(|v| self.transport.is_available(*v))
            .ok_or(AcquireError::ManagerUnavailable(None))?;

        let arch = DriverArch::host();
        tracing::info!("Opening device manager {:?} ({:?} drivers)", version, arch);

        if let Err(e) = self.transport.open_manager(version, arch, self.locale) {
            tracing::error!("Device manager failed to open: {}", e.message());
            self.transport.close_manager();
            return Err(AcquireError::ManagerUnavailable(Some(e)));
        }

        self.state = ManagerState::Opened;
        self.version = Some(version);
        Ok(())
    }

    /// Snapshot of the devices currently visible. Empty is not an error.
    pub fn list_devices(&mut self) -> Result<Vec<DeviceInfo>, AcquireError> {
        self.open()?;
        let devices = self
            .transport
            .enumerate()
            .map_err(|e| AcquireError::ManagerUnavailable(Some(e)))?;
        tracing::debug!("Enumerated {} device(s)", devices.len());
        self.devices = devices.clone();
        Ok(devices)
    }

    pub fn select_default_device(&mut self) -> Option<DeviceInfo> {
        let id = self.transport.default_device()?;
        self.devices.iter().find(|d| d.id == id).cloned()
    }

    pub fn show_selection_dialog(&mut self) -> Option<DeviceInfo> {
        let id = self.transport.select_device_interactively()?;
        self.devices.iter().find(|d| d.id == id).cloned()
    }

    pub fn close(&mut self) {
        if self.state == ManagerState::Closed {
            return;
        }
        self.transport.close_manager();
        self.state = ManagerState::Closed;
        self.version = None;
        self.devices.clear();
        tracing::info!("Device manager closed");
    }
}
