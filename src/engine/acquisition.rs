use crate::device::manager::DeviceManager;
use crate::device::models::DeviceInfo;
use crate::device::session::DeviceSession;
use crate::device::transport::DeviceTransport;
use crate::dispatch::EventDispatcher;
use crate::engine::context::SessionContext;
use crate::engine::request::AcquisitionRequest;
use crate::engine::state::AcquisitionState;
use crate::error::{full_error_message, AcquireError};
use crate::images::{AcquiredImage, ImageCollection};
use crate::presenter::Presenter;

/// Drives one acquisition at a time from device selection to the last
/// page. `acquire` returns once the transfer is running; completion is
/// observed by pumping events.
pub struct AcquisitionEngine<T: DeviceTransport> {
    pub(super) manager: DeviceManager<T>,
    pub(super) dispatcher: EventDispatcher,
    pub(super) presenter: Box<dyn Presenter>,
    pub(super) ctx: SessionContext,
    pub(super) state: AcquisitionState,
}

impl<T: DeviceTransport> AcquisitionEngine<T> {
    pub fn new(manager: DeviceManager<T>, presenter: Box<dyn Presenter>) -> Self {
        Self {
            manager,
            dispatcher: EventDispatcher::new(),
            presenter,
            ctx: SessionContext::default(),
            state: AcquisitionState::Idle,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn is_acquiring(&self) -> bool {
        self.ctx.acquiring
    }

    pub fn cancel_requested(&self) -> bool {
        self.ctx.cancel_requested
    }

    pub fn images(&self) -> &ImageCollection {
        &self.ctx.images
    }

    /// Moves the image cursor, clamped to the last page.
    pub fn select_image(&mut self, index: usize) -> Option<&AcquiredImage> {
        self.ctx.images.select(index)
    }

    /// Drops acquired pages. Refused while an acquisition is running.
    pub fn clear_images(&mut self) -> bool {
        if self.ctx.acquiring {
            return false;
        }
        self.ctx.images.clear();
        true
    }

    pub fn manager(&self) -> &DeviceManager<T> {
        &self.manager
    }

    pub fn current_device(&self) -> Option<&DeviceInfo> {
        self.ctx.device.as_ref().map(|s| s.info())
    }

    pub fn acquire(&mut self, request: &AcquisitionRequest) -> Result<(), AcquireError> {
        if self.ctx.acquiring {
            return Err(AcquireError::Busy);
        }
        self.ctx.begin();
        tracing::info!(
            "Acquiring: {:?} at {} dpi, duplex={}",
            request.pixel_type,
            request.resolution,
            request.duplex
        );

        match self.start(request) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn start(&mut self, request: &AcquisitionRequest) -> Result<(), AcquireError> {
        self.transition(AcquisitionState::ManagerOpening);
        self.manager.open()?;
        tracing::debug!(
            "Device manager {:?} via {:?}, locale {:?}",
            self.manager.state(),
            self.manager.version(),
            self.manager.locale()
        );

        if self.manager.list_devices()?.is_empty() {
            return Err(AcquireError::NoDevicesFound);
        }
        if request.show_selection_dialog && self.manager.show_selection_dialog().is_none() {
            tracing::debug!("Selection dialog dismissed, keeping default device");
        }

        self.release_device();
        let info = self
            .manager
            .select_default_device()
            .ok_or(AcquireError::NoDeviceSelected)?;

        self.transition(AcquisitionState::DeviceOpening);
        self.dispatcher.subscribe(&info.id);
        let session = DeviceSession::open(self.manager.transport_mut(), info)?;
        let id = session.info().id.clone();
        self.ctx.device = Some(session);

        self.transition(AcquisitionState::Configuring);
        self.configure(request);

        let sender = self.dispatcher.sender_for(&id);
        self.manager
            .transport_mut()
            .start_transfer(&id, &request.transfer_settings(), sender)
            .map_err(AcquireError::TransferStart)?;

        tracing::info!(
            "Transfer {} running on {id}",
            self.dispatcher.current_transfer()
        );
        self.transition(AcquisitionState::Transferring);
        Ok(())
    }

    /// Every step is attempted; a refused setting is reported and skipped.
    fn configure(&mut self, request: &AcquisitionRequest) {
        let Some(session) = self.ctx.device.as_mut() else {
            return;
        };
        let transport = self.manager.transport_mut();

        let mut skipped: Vec<AcquireError> = Vec::new();
        skipped.extend(session.set_pixel_type(transport, request.pixel_type).err());
        skipped.extend(session.ensure_unit_inches(transport).err());
        skipped.extend(session.set_resolution(transport, request.resolution));
        skipped.extend(session.apply_vendor_quirks(transport));
        skipped.extend(session.configure_feeder(transport, request.feeder, request.duplex));
        let async_events = session.enable_async_events(transport);

        for err in &skipped {
            self.report_skipped(&full_error_message(err));
        }
        if let Err(message) = async_events {
            self.report_skipped(&message);
        }
    }

    fn report_skipped(&mut self, message: &str) {
        tracing::warn!("Skipped setting: {message}");
        self.presenter.warning(message);
    }

    /// Ends a failed acquisition: device closed, back to idle, one
    /// notification.
    fn fail(&mut self, err: AcquireError) -> AcquireError {
        let device_open = self.ctx.device.as_ref().is_some_and(|s| s.is_open());
        if device_open {
            self.transition(AcquisitionState::Aborting);
            self.close_device();
        }
        self.transition(AcquisitionState::Idle);
        self.ctx.acquiring = false;

        let message = full_error_message(&err);
        tracing::error!("Acquisition failed: {}", message.replace('\n', "; "));
        self.presenter.error_occurred(&message);
        err
    }

    /// Abort the running transfer. Only valid while transferring.
    pub fn cancel(&mut self) -> Result<(), AcquireError> {
        if self.state != AcquisitionState::Transferring {
            return Err(AcquireError::NotTransferring(self.state));
        }
        self.ctx.cancel_requested = true;
        self.issue_cancel();
        Ok(())
    }

    /// Ask for cancellation at the next transfer callback.
    pub fn request_cancel(&mut self) {
        if !self.ctx.cancel_requested {
            tracing::info!("Cancellation requested");
        }
        self.ctx.cancel_requested = true;
    }

    pub(super) fn issue_cancel(&mut self) {
        if self.ctx.cancel_issued {
            return;
        }
        self.ctx.cancel_issued = true;

        if let Some(session) = self.ctx.device.as_ref() {
            let id = session.info().id.clone();
            if let Err(e) = self.manager.transport_mut().cancel_transfer(&id) {
                tracing::warn!("Cancel request for {id} failed: {e}");
            }
        }
        if self.state == AcquisitionState::Transferring {
            self.transition(AcquisitionState::Aborting);
        }
    }

    pub(super) fn close_device(&mut self) {
        if let Some(session) = self.ctx.device.as_mut() {
            session.close(self.manager.transport_mut());
        }
    }

    /// Close and forget the previous device, dropping its subscription.
    fn release_device(&mut self) {
        if let Some(mut previous) = self.ctx.device.take() {
            self.dispatcher.unsubscribe(&previous.info().id);
            previous.close(self.manager.transport_mut());
        }
    }

    /// Cancel anything in flight and release the device and the manager.
    pub fn shutdown(&mut self) {
        if self.ctx.acquiring {
            self.request_cancel();
            self.issue_cancel();
        }
        self.release_device();
        self.ctx.acquiring = false;
        self.state = AcquisitionState::Idle;
        self.manager.close();
    }

    pub(super) fn transition(&mut self, next: AcquisitionState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            tracing::warn!("Unexpected transition {:?} -> {:?}", self.state, next);
        }
        tracing::debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Handle the next event. Returns false if the event channel closed.
    pub async fn next_event(&mut self) -> bool {
        match self.dispatcher.next().await {
            Some(envelope) => {
                self.handle(envelope);
                true
            }
            None => false,
        }
    }

    /// Handle events until the running acquisition ends.
    pub async fn run_until_idle(&mut self) {
        while self.ctx.acquiring {
            if !self.next_event().await {
                break;
            }
        }
    }

    /// Handle events that are already queued, without waiting.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(envelope) = self.dispatcher.try_next() {
            self.handle(envelope);
            handled += 1;
        }
        handled
    }
}
