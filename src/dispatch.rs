use std::collections::HashSet;

use tokio::sync::mpsc;

use crate::device::events::DeviceEvent;
use crate::device::models::DeviceId;
use crate::images::AcquiredImage;

#[derive(Debug, Clone)]
pub enum TransportEvent {
    Progress(u8),
    ImageAcquired(AcquiredImage),
    ScanFailed(String),
    DeviceEvent {
        device_name: String,
        event: DeviceEvent,
    },
    ScanFinished,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub device: DeviceId,
    pub transfer: u64,
    pub event: TransportEvent,
}

/// Handle a transport uses to post events for one transfer on one device.
/// Safe to move to a worker thread.
#[derive(Debug, Clone)]
pub struct EventSender {
    device: DeviceId,
    transfer: u64,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSender {
    /// Returns false once the receiving side is gone.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx
            .send(Envelope {
                device: self.device.clone(),
                transfer: self.transfer,
                event,
            })
            .is_ok()
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn transfer(&self) -> u64 {
        self.transfer
    }
}

/// Marshals transport events onto the task that owns the engine. Drops
/// events from devices nobody is subscribed to and events left over from
/// an earlier transfer.
pub struct EventDispatcher {
    tx: mpsc::UnboundedSender<Envelope>,
    rx: mpsc::UnboundedReceiver<Envelope>,
    subscriptions: HashSet<DeviceId>,
    transfer: u64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            subscriptions: HashSet::new(),
            transfer: 0,
        }
    }

    /// Returns true if the device was not subscribed before.
    pub fn subscribe(&mut self, device: &DeviceId) -> bool {
        let added = self.subscriptions.insert(device.clone());
        if added {
            tracing::debug!("Subscribed to events of {device}");
        }
        added
    }

    /// Returns true if the device was subscribed.
    pub fn unsubscribe(&mut self, device: &DeviceId) -> bool {
        let removed = self.subscriptions.remove(device);
        if removed {
            tracing::debug!("Unsubscribed from events of {device}");
        }
        removed
    }

    pub fn is_subscribed(&self, device: &DeviceId) -> bool {
        self.subscriptions.contains(device)
    }

    /// Sender for a new transfer. From here on only events stamped with
    /// this transfer are delivered.
    pub fn sender_for(&mut self, device: &DeviceId) -> EventSender {
        self.transfer += 1;
        EventSender {
            device: device.clone(),
            transfer: self.transfer,
            tx: self.tx.clone(),
        }
    }

    pub fn current_transfer(&self) -> u64 {
        self.transfer
    }

    /// Wait for the next event of a subscribed device.
    pub async fn next(&mut self) -> Option<Envelope> {
        loop {
            let envelope = self.rx.recv().await?;
            if self.accepts(&envelope) {
                return Some(envelope);
            }
        }
    }

    /// Next already-queued event of a subscribed device, without waiting.
    pub fn try_next(&mut self) -> Option<Envelope> {
        while let Ok(envelope) = self.rx.try_recv() {
            if self.accepts(&envelope) {
                return Some(envelope);
            }
        }
        None
    }

    fn accepts(&self, envelope: &Envelope) -> bool {
        if !self.is_subscribed(&envelope.device) {
            tracing::trace!(
                "Dropping event from unsubscribed device {}",
                envelope.device
            );
            return false;
        }
        if envelope.transfer != self.transfer {
            tracing::debug!(
                "Dropping event of finished transfer {} on {}",
                envelope.transfer,
                envelope.device
            );
            return false;
        }
        true
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> DeviceId {
        DeviceId(name.to_string())
    }

    #[test]
    fn subscribing_twice_delivers_once() {
        let mut dispatcher = EventDispatcher::new();
        let dev = id("dev-1");

        assert!(dispatcher.subscribe(&dev));
        assert!(!dispatcher.subscribe(&dev));

        dispatcher.sender_for(&dev).send(TransportEvent::Progress(10));

        assert!(matches!(
            dispatcher.try_next().map(|e| e.event),
            Some(TransportEvent::Progress(10))
        ));
        assert!(dispatcher.try_next().is_none());
    }

    #[test]
    fn unsubscribe_without_subscription_is_noop() {
        let mut dispatcher = EventDispatcher::new();
        assert!(!dispatcher.unsubscribe(&id("ghost")));
        assert!(!dispatcher.is_subscribed(&id("ghost")));
    }

    #[test]
    fn events_of_unsubscribed_devices_are_dropped() {
        let mut dispatcher = EventDispatcher::new();
        let watched = id("watched");
        let other = id("other");
        dispatcher.subscribe(&watched);

        let watched_sender = dispatcher.sender_for(&watched);
        let other_sender = EventSender {
            device: other,
            ..watched_sender.clone()
        };
        other_sender.send(TransportEvent::ScanFinished);
        watched_sender.send(TransportEvent::Progress(50));

        let envelope = dispatcher.try_next().unwrap();
        assert_eq!(envelope.device, watched);
        assert!(dispatcher.try_next().is_none());
    }

    #[test]
    fn events_of_an_earlier_transfer_are_dropped() {
        let mut dispatcher = EventDispatcher::new();
        let dev = id("feeder");
        dispatcher.subscribe(&dev);

        let first = dispatcher.sender_for(&dev);
        let second = dispatcher.sender_for(&dev);
        assert_eq!(second.transfer(), first.transfer() + 1);
        assert_eq!(dispatcher.current_transfer(), second.transfer());

        first.send(TransportEvent::Progress(100));
        first.send(TransportEvent::ScanFinished);
        second.send(TransportEvent::Progress(0));

        let envelope = dispatcher.try_next().unwrap();
        assert_eq!(envelope.transfer, second.transfer());
        assert!(matches!(envelope.event, TransportEvent::Progress(0)));
        assert!(dispatcher.try_next().is_none());
    }

    #[tokio::test]
    async fn sender_works_from_another_thread() {
        let mut dispatcher = EventDispatcher::new();
        let dev = id("threaded");
        dispatcher.subscribe(&dev);
        let sender = dispatcher.sender_for(&dev);

        std::thread::spawn(move || {
            sender.send(TransportEvent::ScanFinished);
        })
        .join()
        .unwrap();

        let envelope = dispatcher.next().await.unwrap();
        assert!(matches!(envelope.event, TransportEvent::ScanFinished));
    }
}
