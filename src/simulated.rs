//! In-process transport backed by virtual devices. Each transfer runs on
//! its own thread and reports through the `EventSender`, the same way a
//! driver callback thread would.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb};

use crate::device::events::{AsyncEventKind, DeviceEvent, PowerSupply};
use crate::device::models::{
    Capability, CapabilityId, CapabilityValue, DeviceId, DeviceInfo, DeviceProtocol, DeviceState,
    PixelType, Resolution, SupportedValues, TransferSettings, UnitOfMeasure,
};
use crate::device::transport::{DeviceTransport, DriverArch, ProtocolVersion};
use crate::dispatch::{EventSender, TransportEvent};
use crate::error::TransportError;
use crate::images::AcquiredImage;
use crate::locale::ManagerLocale;

/// An event the device raises after a given page.
#[derive(Debug, Clone)]
pub struct ScriptedEvent {
    pub after_page: u32,
    pub event: DeviceEvent,
    pub state_after: Option<DeviceState>,
}

#[derive(Debug, Clone)]
pub struct VirtualDevice {
    pub info: DeviceInfo,
    pub capabilities: BTreeMap<CapabilityId, Capability>,
    pub pages: u32,
    pub page_size_inches: (f32, f32),
    pub async_events: Vec<AsyncEventKind>,
    pub fail_open: Option<String>,
    pub fail_transfer_start: Option<String>,
    pub failed_pages: Vec<(u32, String)>,
    pub scripted_events: Vec<ScriptedEvent>,
    pub page_delay: Duration,
    pub duplicate_delivery: bool,
}

fn bool_cap(id: CapabilityId, current: bool) -> Capability {
    Capability {
        id,
        current: CapabilityValue::Bool(current),
        supported: SupportedValues::List(vec![
            CapabilityValue::Bool(false),
            CapabilityValue::Bool(true),
        ]),
    }
}

fn base_capabilities() -> BTreeMap<CapabilityId, Capability> {
    let resolution = |id| Capability {
        id,
        current: CapabilityValue::Float(75.0),
        supported: SupportedValues::Range {
            min: 75.0,
            max: 1200.0,
            step: 75.0,
        },
    };

    [
        Capability {
            id: CapabilityId::PixelType,
            current: CapabilityValue::Pixel(PixelType::Gray),
            supported: SupportedValues::List(vec![
                CapabilityValue::Pixel(PixelType::Bw),
                CapabilityValue::Pixel(PixelType::Gray),
                CapabilityValue::Pixel(PixelType::Rgb),
            ]),
        },
        Capability {
            id: CapabilityId::UnitOfMeasure,
            current: CapabilityValue::Unit(UnitOfMeasure::Centimeters),
            supported: SupportedValues::List(vec![
                CapabilityValue::Unit(UnitOfMeasure::Inches),
                CapabilityValue::Unit(UnitOfMeasure::Centimeters),
            ]),
        },
        resolution(CapabilityId::XResolution),
        resolution(CapabilityId::YResolution),
    ]
    .into_iter()
    .map(|c| (c.id, c))
    .collect()
}

impl VirtualDevice {
    pub fn flatbed(name: &str) -> Self {
        Self {
            info: DeviceInfo {
                id: DeviceId(format!("sim:{}", name.to_ascii_lowercase().replace(' ', "-"))),
                product_name: name.to_string(),
                manufacturer: name.split_whitespace().next().unwrap_or(name).to_string(),
                product_family: "Flatbed".to_string(),
                protocol: DeviceProtocol::Twain,
                has_feeder: false,
                supports_async_events: false,
            },
            capabilities: base_capabilities(),
            pages: 1,
            page_size_inches: (1.0, 1.5),
            async_events: Vec::new(),
            fail_open: None,
            fail_transfer_start: None,
            failed_pages: Vec::new(),
            scripted_events: Vec::new(),
            page_delay: Duration::ZERO,
            duplicate_delivery: false,
        }
    }

    pub fn feeder(name: &str) -> Self {
        let mut device = Self::flatbed(name);
        device.info.product_family = "Sheetfed".to_string();
        device.info.has_feeder = true;
        device.info.supports_async_events = true;
        device.pages = 3;
        device.async_events = vec![
            AsyncEventKind::PaperJam,
            AsyncEventKind::CheckDeviceOnline,
            AsyncEventKind::CheckPowerSupply,
        ];
        for cap in [
            bool_cap(CapabilityId::FeederEnabled, false),
            bool_cap(CapabilityId::DuplexEnabled, false),
            bool_cap(CapabilityId::UndefinedImageSize, false),
        ] {
            device.capabilities.insert(cap.id, cap);
        }
        device
    }

    #[cfg(test)]
    pub fn with_capability(mut self, cap: Capability) -> Self {
        self.capabilities.insert(cap.id, cap);
        self
    }

    #[cfg(test)]
    pub fn without_capability(mut self, id: CapabilityId) -> Self {
        self.capabilities.remove(&id);
        self
    }

    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_page_size(mut self, width_in: f32, height_in: f32) -> Self {
        self.page_size_inches = (width_in, height_in);
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    #[cfg(test)]
    pub fn failing_open(mut self, reason: &str) -> Self {
        self.fail_open = Some(reason.to_string());
        self
    }

    #[cfg(test)]
    pub fn failing_transfer_start(mut self, reason: &str) -> Self {
        self.fail_transfer_start = Some(reason.to_string());
        self
    }

    #[cfg(test)]
    pub fn failing_page(mut self, page: u32, reason: &str) -> Self {
        self.failed_pages.push((page, reason.to_string()));
        self
    }

    pub fn with_event(
        mut self,
        after_page: u32,
        event: DeviceEvent,
        state_after: Option<DeviceState>,
    ) -> Self {
        self.scripted_events.push(ScriptedEvent {
            after_page,
            event,
            state_after,
        });
        self
    }

    #[cfg(test)]
    pub fn with_duplicate_delivery(mut self) -> Self {
        self.duplicate_delivery = true;
        self
    }

    fn current(&self, id: CapabilityId) -> Option<CapabilityValue> {
        self.capabilities.get(&id).map(|c| c.current)
    }
}

struct DeviceSlot {
    device: VirtualDevice,
    state: Arc<Mutex<DeviceState>>,
    cancel: Arc<AtomicBool>,
    enabled_events: Vec<AsyncEventKind>,
    close_count: usize,
    cancel_requests: usize,
}

pub struct SimulatedTransport {
    protocols: Vec<ProtocolVersion>,
    slots: Vec<DeviceSlot>,
    default_index: Option<usize>,
    dialog_choice: Option<usize>,
    manager_open: bool,
    opened_with: Option<(ProtocolVersion, DriverArch)>,
    locale: Option<ManagerLocale>,
    manager_open_count: usize,
}

fn lock(state: &Mutex<DeviceState>) -> MutexGuard<'_, DeviceState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedTransport {
    pub fn new(devices: Vec<VirtualDevice>) -> Self {
        let default_index = if devices.is_empty() { None } else { Some(0) };
        Self {
            protocols: vec![ProtocolVersion::V2, ProtocolVersion::V1],
            slots: devices
                .into_iter()
                .map(|device| DeviceSlot {
                    device,
                    state: Arc::new(Mutex::new(DeviceState::Closed)),
                    cancel: Arc::new(AtomicBool::new(false)),
                    enabled_events: Vec::new(),
                    close_count: 0,
                    cancel_requests: 0,
                })
                .collect(),
            default_index,
            dialog_choice: None,
            manager_open: false,
            opened_with: None,
            locale: None,
            manager_open_count: 0,
        }
    }

    /// A sheetfed and a flatbed scanner producing letter-size pages.
    pub fn demo(pages: u32) -> Self {
        Self::new(vec![
            VirtualDevice::feeder("FUJITSU fi-7160")
                .with_pages(pages)
                .with_page_size(8.5, 11.0)
                .with_page_delay(Duration::from_millis(150))
                .with_event(
                    0,
                    DeviceEvent::CheckPowerSupply {
                        supply: Some(PowerSupply::External),
                    },
                    None,
                ),
            VirtualDevice::flatbed("Canon LiDE 300").with_page_size(8.5, 11.0),
        ])
        .with_dialog_choice(0)
    }

    #[cfg(test)]
    pub fn with_protocols(mut self, protocols: &[ProtocolVersion]) -> Self {
        self.protocols = protocols.to_vec();
        self
    }

    pub fn with_dialog_choice(mut self, index: usize) -> Self {
        self.dialog_choice = Some(index);
        self
    }

    fn slot(&self, device: &DeviceId) -> Result<&DeviceSlot, TransportError> {
        self.slots
            .iter()
            .find(|s| &s.device.info.id == device)
            .ok_or_else(|| TransportError::new(format!("Unknown device {device}")))
    }

    fn slot_mut(&mut self, device: &DeviceId) -> Result<&mut DeviceSlot, TransportError> {
        self.slots
            .iter_mut()
            .find(|s| &s.device.info.id == device)
            .ok_or_else(|| TransportError::new(format!("Unknown device {device}")))
    }
}

#[cfg(test)]
impl SimulatedTransport {
    pub fn opened_with(&self) -> Option<(ProtocolVersion, DriverArch)> {
        self.opened_with
    }

    pub fn manager_locale(&self) -> Option<ManagerLocale> {
        self.locale
    }

    pub fn manager_open_count(&self) -> usize {
        self.manager_open_count
    }

    pub fn current_value(&self, device: &DeviceId, id: CapabilityId) -> Option<CapabilityValue> {
        self.slot(device).ok()?.device.current(id)
    }

    pub fn enabled_async_events(&self, device: &DeviceId) -> Vec<AsyncEventKind> {
        self.slot(device)
            .map(|s| s.enabled_events.clone())
            .unwrap_or_default()
    }

    pub fn close_count(&self, device: &DeviceId) -> usize {
        self.slot(device).map(|s| s.close_count).unwrap_or(0)
    }

    pub fn cancel_requests(&self, device: &DeviceId) -> usize {
        self.slot(device).map(|s| s.cancel_requests).unwrap_or(0)
    }
}

impl DeviceTransport for SimulatedTransport {
    fn is_available(&mut self, version: ProtocolVersion) -> bool {
        self.protocols.contains(&version)
    }

    fn open_manager(
        &mut self,
        version: ProtocolVersion,
        arch: DriverArch,
        locale: ManagerLocale,
    ) -> Result<(), TransportError> {
        if !self.protocols.contains(&version) {
            return Err(TransportError::new(format!("{version:?} manager not installed")));
        }
        self.manager_open = true;
        self.opened_with = Some((version, arch));
        self.locale = Some(locale);
        self.manager_open_count += 1;
        tracing::debug!(
            "Simulated manager opened with {:?} ({} time(s)), locale {:?}",
            self.opened_with,
            self.manager_open_count,
            self.locale
        );
        Ok(())
    }

    fn close_manager(&mut self) {
        self.manager_open = false;
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceInfo>, TransportError> {
        if !self.manager_open {
            return Err(TransportError::new("Device manager is not open"));
        }
        Ok(self.slots.iter().map(|s| s.device.info.clone()).collect())
    }

    fn default_device(&mut self) -> Option<DeviceId> {
        self.default_index
            .and_then(|idx| self.slots.get(idx))
            .map(|s| s.device.info.id.clone())
    }

    fn select_device_interactively(&mut self) -> Option<DeviceId> {
        let idx = self.dialog_choice.filter(|idx| *idx < self.slots.len())?;
        self.default_index = Some(idx);
        self.default_device()
    }

    fn open_device(&mut self, device: &DeviceId) -> Result<(), TransportError> {
        let slot = self.slot_mut(device)?;
        if let Some(reason) = &slot.device.fail_open {
            return Err(TransportError::new(reason.clone()));
        }
        let mut state = lock(&slot.state);
        if *state != DeviceState::Closed {
            return Err(TransportError::new(format!("{device} is already open")));
        }
        *state = DeviceState::Opened;
        Ok(())
    }

    fn close_device(&mut self, device: &DeviceId) -> Result<(), TransportError> {
        let slot = self.slot_mut(device)?;
        slot.cancel.store(true, Ordering::SeqCst);
        *lock(&slot.state) = DeviceState::Closed;
        slot.close_count += 1;
        tracing::debug!("Simulated {device} closed ({} time(s))", slot.close_count);
        Ok(())
    }

    fn device_state(&self, device: &DeviceId) -> DeviceState {
        self.slot(device)
            .map(|s| *lock(&s.state))
            .unwrap_or(DeviceState::Closed)
    }

    fn capability(
        &self,
        device: &DeviceId,
        id: CapabilityId,
    ) -> Result<Capability, TransportError> {
        self.slot(device)?
            .device
            .capabilities
            .get(&id)
            .cloned()
            .ok_or_else(|| TransportError::new(format!("Capability {id} is not supported")))
    }

    fn set_capability(
        &mut self,
        device: &DeviceId,
        id: CapabilityId,
        value: CapabilityValue,
    ) -> Result<(), TransportError> {
        let slot = self.slot_mut(device)?;
        let cap = slot
            .device
            .capabilities
            .get_mut(&id)
            .ok_or_else(|| TransportError::new(format!("Capability {id} is not supported")))?;
        if !cap.supported.contains(&value) {
            return Err(TransportError::new(format!("{value} is out of range for {id}")));
        }
        cap.current = value;
        Ok(())
    }

    fn supported_async_events(
        &self,
        device: &DeviceId,
    ) -> Result<Vec<AsyncEventKind>, TransportError> {
        let slot = self.slot(device)?;
        if !slot.device.info.supports_async_events {
            return Err(TransportError::new("Async events are not supported"));
        }
        Ok(slot.device.async_events.clone())
    }

    fn enable_async_events(
        &mut self,
        device: &DeviceId,
        events: &[AsyncEventKind],
    ) -> Result<(), TransportError> {
        let slot = self.slot_mut(device)?;
        if let Some(kind) = events.iter().find(|k| !slot.device.async_events.contains(*k)) {
            return Err(TransportError::new(format!("{kind:?} is not supported")));
        }
        slot.enabled_events = events.to_vec();
        Ok(())
    }

    fn start_transfer(
        &mut self,
        device: &DeviceId,
        settings: &TransferSettings,
        events: EventSender,
    ) -> Result<(), TransportError> {
        let slot = self.slot_mut(device)?;
        if let Some(reason) = &slot.device.fail_transfer_start {
            return Err(TransportError::new("Transfer could not start")
                .caused_by(TransportError::new(reason.clone())));
        }
        {
            let mut state = lock(&slot.state);
            if *state < DeviceState::Opened {
                return Err(TransportError::new(format!("{device} is not open")));
            }
            *state = DeviceState::Transferring;
        }
        // a worker from an earlier transfer keeps its own flag
        slot.cancel = Arc::new(AtomicBool::new(false));

        let dev = &slot.device;
        let pixel_type = match dev.current(CapabilityId::PixelType) {
            Some(CapabilityValue::Pixel(p)) => p,
            _ => PixelType::Gray,
        };
        let dpi = |id| match dev.current(id) {
            Some(CapabilityValue::Float(v)) => v,
            _ => 150.0,
        };
        let sides = match (
            dev.current(CapabilityId::FeederEnabled),
            dev.current(CapabilityId::DuplexEnabled),
        ) {
            (Some(CapabilityValue::Bool(true)), Some(CapabilityValue::Bool(true))) => 2,
            _ => 1,
        };

        let worker = TransferWorker {
            events,
            device_name: dev.info.product_name.clone(),
            state: Arc::clone(&slot.state),
            cancel: Arc::clone(&slot.cancel),
            pages: dev.pages * sides,
            pixel_type,
            resolution: Resolution {
                x: dpi(CapabilityId::XResolution),
                y: dpi(CapabilityId::YResolution),
            },
            page_size_inches: dev.page_size_inches,
            failed_pages: dev.failed_pages.clone(),
            scripted_events: dev.scripted_events.clone(),
            page_delay: dev.page_delay,
            duplicate_delivery: dev.duplicate_delivery,
            disable_after_acquire: settings.disable_after_acquire,
        };

        tracing::debug!(
            "Starting simulated transfer on {device}: {} page(s), {:?}, events {:?}",
            worker.pages,
            settings.mode,
            slot.enabled_events
        );
        if settings.show_ui {
            tracing::debug!(
                "Driver UI requested (modal={}, indicators={}), simulated devices have none",
                settings.modal_ui,
                settings.show_indicators
            );
        }
        thread::spawn(move || worker.run());
        Ok(())
    }

    fn cancel_transfer(&mut self, device: &DeviceId) -> Result<(), TransportError> {
        let slot = self.slot_mut(device)?;
        slot.cancel.store(true, Ordering::SeqCst);
        slot.cancel_requests += 1;
        tracing::debug!("Simulated {device} cancel request #{}", slot.cancel_requests);
        Ok(())
    }
}

struct TransferWorker {
    events: EventSender,
    device_name: String,
    state: Arc<Mutex<DeviceState>>,
    cancel: Arc<AtomicBool>,
    pages: u32,
    pixel_type: PixelType,
    resolution: Resolution,
    page_size_inches: (f32, f32),
    failed_pages: Vec<(u32, String)>,
    scripted_events: Vec<ScriptedEvent>,
    page_delay: Duration,
    duplicate_delivery: bool,
    disable_after_acquire: bool,
}

impl TransferWorker {
    fn run(self) {
        'pages: for page in 0..self.pages {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }

            for percent in [0, 50, 100] {
                if !self.events.send(TransportEvent::Progress(percent)) {
                    return;
                }
            }

            match self.failed_pages.iter().find(|(p, _)| *p == page) {
                Some((_, reason)) => {
                    self.events.send(TransportEvent::ScanFailed(reason.clone()));
                }
                None => {
                    let image = AcquiredImage::new(
                        self.render_page(page),
                        self.resolution,
                        self.pixel_type,
                        page,
                    );
                    if self.duplicate_delivery {
                        self.events.send(TransportEvent::ImageAcquired(image.clone()));
                    }
                    self.events.send(TransportEvent::ImageAcquired(image));
                }
            }

            for scripted in self.scripted_events.iter().filter(|s| s.after_page == page) {
                if let Some(next) = scripted.state_after {
                    *lock(&self.state) = next;
                }
                self.events.send(TransportEvent::DeviceEvent {
                    device_name: self.device_name.clone(),
                    event: scripted.event.clone(),
                });
                if scripted.state_after.is_some_and(|s| s < DeviceState::Enabled) {
                    break 'pages;
                }
            }

            if !self.page_delay.is_zero() {
                thread::sleep(self.page_delay);
            }
        }

        {
            let mut state = lock(&self.state);
            if *state >= DeviceState::Enabled {
                *state = if self.disable_after_acquire {
                    DeviceState::Opened
                } else {
                    DeviceState::Enabled
                };
            }
        }
        tracing::debug!(
            "Simulated transfer {} on {} done",
            self.events.transfer(),
            self.events.device()
        );
        self.events.send(TransportEvent::ScanFinished);
    }

    fn render_page(&self, page: u32) -> DynamicImage {
        let (w_in, h_in) = self.page_size_inches;
        let width = (w_in * self.resolution.x).round().max(1.0) as u32;
        let height = (h_in * self.resolution.y).round().max(1.0) as u32;
        let shade = |x: u32, y: u32| ((x + y + page * 40) % 256) as u8;

        match self.pixel_type {
            PixelType::Bw => DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
                Luma([if shade(x, y) > 127 { 255 } else { 0 }])
            })),
            PixelType::Gray => {
                DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
                    Luma([shade(x, y)])
                }))
            }
            PixelType::Rgb => DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
                Rgb([(x % 256) as u8, (y % 256) as u8, shade(x, y)])
            })),
        }
    }
}
