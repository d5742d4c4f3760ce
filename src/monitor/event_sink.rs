use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::mapping::Command;

/// Events delivered to the monitor's single consumer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A mapped device action ready for the transport
    DeviceAction(Command),
    /// The user asked for the device connection to be retried
    ReconnectRequested,
}

/// Single-consumer republishing slot
///
/// Holds at most one unbounded sender. Attaching a new stream drops the
/// previous sender, so the displaced receiver drains what it already has and
/// then sees end-of-stream.
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    slot: Arc<Mutex<Option<mpsc::UnboundedSender<MonitorEvent>>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<MonitorEvent>>> {
        // A panic while holding the lock cannot leave the slot half-written
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates a fresh stream, closing out any previous one
    pub fn attach(&self) -> mpsc::UnboundedReceiver<MonitorEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if self.lock().replace(sender).is_some() {
            debug!("Replaced previous event subscriber");
        }
        receiver
    }

    /// Delivers an event to the current subscriber, if any
    ///
    /// Returns false when nobody received it. A subscriber that went away is
    /// forgotten.
    pub fn publish(&self, event: MonitorEvent) -> bool {
        let mut slot = self.lock();
        let Some(sender) = slot.as_ref() else {
            trace!("No subscriber for {:?}", event);
            return false;
        };

        if sender.send(event).is_err() {
            debug!("Event subscriber dropped, clearing slot");
            *slot = None;
            return false;
        }
        true
    }

    /// Ends the current stream
    pub fn close(&self) {
        if self.lock().take().is_some() {
            debug!("Closed event stream");
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.lock().as_ref().is_some_and(|sender| !sender.is_closed())
    }
}
