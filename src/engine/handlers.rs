use crate::device::events::DeviceEvent;
use crate::device::models::DeviceState;
use crate::device::transport::DeviceTransport;
use crate::dispatch::{Envelope, TransportEvent};
use crate::engine::acquisition::AcquisitionEngine;
use crate::engine::state::AcquisitionState;
use crate::error::{full_error_message, AcquireError};
use crate::images::AcquiredImage;

impl<T: DeviceTransport> AcquisitionEngine<T> {
    /// Route one marshaled transport event by tag.
    pub(super) fn handle(&mut self, envelope: Envelope) {
        match envelope.event {
            TransportEvent::Progress(percent) => self.on_progress(percent),
            TransportEvent::ImageAcquired(image) => self.on_image(image),
            TransportEvent::ScanFailed(reason) => self.on_scan_failed(reason),
            TransportEvent::DeviceEvent { device_name, event } => {
                self.on_device_event(&device_name, &event)
            }
            TransportEvent::ScanFinished => {
                if self.ctx.acquiring {
                    self.finish();
                }
            }
        }
    }

    fn on_progress(&mut self, percent: u8) {
        if !self.ctx.acquiring {
            return;
        }
        if self.ctx.cancel_requested {
            self.issue_cancel();
            return;
        }
        self.presenter.progress_changed(percent);
    }

    fn on_image(&mut self, image: AcquiredImage) {
        if !self.ctx.acquiring {
            tracing::debug!("Dropping page {} outside an acquisition", image.page_index);
            return;
        }
        if self.ctx.cancel_requested {
            self.issue_cancel();
            return;
        }
        if self.ctx.is_stale_page(image.page_index) {
            tracing::warn!("Ignoring repeated page {}", image.page_index);
            return;
        }

        self.ctx.last_page = Some(image.page_index);
        self.presenter.image_ready(&image);
        self.ctx.images.push(image);
    }

    fn on_scan_failed(&mut self, reason: String) {
        if !self.ctx.acquiring {
            return;
        }
        let message = full_error_message(&AcquireError::ScanFailed(reason));
        tracing::error!("{message}");
        self.presenter.error_occurred(&message);

        if self.device_below_enabled() {
            self.finish();
        }
    }

    fn on_device_event(&mut self, device_name: &str, event: &DeviceEvent) {
        if !self.ctx.acquiring {
            tracing::debug!("Dropping {:?} from {device_name} outside an acquisition", event.kind());
            return;
        }
        tracing::info!("Device event {:?} from {device_name}", event.kind());
        self.presenter.device_notice(&event.describe(device_name));

        if self.device_below_enabled() {
            tracing::info!("{device_name} is no longer enabled, closing it");
            self.finish();
        }
    }

    fn device_below_enabled(&self) -> bool {
        self.ctx
            .device
            .as_ref()
            .filter(|s| s.is_open())
            .is_some_and(|s| s.state(self.manager.transport()) < DeviceState::Enabled)
    }

    /// Close the device and clear the acquiring flag, whatever state the
    /// transfer was in.
    pub(super) fn finish(&mut self) {
        if matches!(
            self.state,
            AcquisitionState::Transferring | AcquisitionState::Aborting
        ) {
            self.transition(AcquisitionState::Finishing);
        }
        self.close_device();

        let was_acquiring = self.ctx.acquiring;
        self.ctx.acquiring = false;
        self.transition(AcquisitionState::Idle);

        if was_acquiring {
            tracing::info!(
                "Acquisition finished, {} page(s) collected",
                self.ctx.images.len()
            );
            self.presenter.acquisition_finished();
        }
    }
}
