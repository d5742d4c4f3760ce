use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{DeviceTransport, TransportError, TransportEvent};
use crate::mapping::Command;

/// Dry-run transport: logs every command instead of moving anything
pub struct LoggingTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: u64,
}

impl LoggingTransport {
    pub fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        let transport = Self { events, sent: 0 };
        transport.report(TransportEvent::Connected);
        transport
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    fn report(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            warn!("Nobody is listening for transport events");
        }
    }
}

impl DeviceTransport for LoggingTransport {
    fn send(&mut self, command: Command) -> Result<(), TransportError> {
        self.sent += 1;
        info!(
            "Device command #{}: {} (lasting {:?})",
            self.sent,
            command,
            command.total_duration()
        );
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        info!("Dry-run transport reconnected");
        self.report(TransportEvent::Connected);
        Ok(())
    }

    fn name(&self) -> &str {
        "logging"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::DeviceRequest;
    use std::time::Duration;

    #[test]
    fn reports_connected_on_creation_and_reconnect() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = LoggingTransport::new(tx);
        assert_eq!(rx.try_recv(), Ok(TransportEvent::Connected));

        transport
            .send(Command::new(DeviceRequest::Left, Duration::from_millis(80)))
            .unwrap();
        assert_eq!(transport.sent(), 1);
        assert!(rx.try_recv().is_err());

        transport.reconnect().unwrap();
        assert_eq!(rx.try_recv(), Ok(TransportEvent::Connected));
    }
}
