use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{DeviceTransport, TransportEvent};
use crate::monitor::{MonitorEvent, StatusRelay};

/// Drains the monitor's event stream into `transport`
///
/// Commands are sent in arrival order. A failed send is recorded on the
/// status and the next command is tried anyway. Returns once the monitor
/// closes the stream.
pub async fn forward_commands<T>(
    mut events: mpsc::UnboundedReceiver<MonitorEvent>,
    transport: &mut T,
    status: &StatusRelay,
) where
    T: DeviceTransport + ?Sized,
{
    info!("Forwarding monitor events to {}", transport.name());
    let mut forwarded = 0usize;

    while let Some(event) = events.recv().await {
        match event {
            MonitorEvent::DeviceAction(command) => match transport.send(command) {
                Ok(()) => {
                    debug!("Sent {} via {}", command, transport.name());
                    forwarded += 1;
                }
                Err(e) => {
                    warn!("Failed to send {} via {}: {}", command, transport.name(), e);
                    status.apply_transport_event(TransportEvent::SendFailed(e.to_string()));
                }
            },
            MonitorEvent::ReconnectRequested => {
                if let Err(e) = transport.reconnect() {
                    warn!("Reconnect via {} failed: {}", transport.name(), e);
                    status.apply_transport_event(TransportEvent::SendFailed(e.to_string()));
                }
            }
        }
    }

    info!(
        "Monitor event stream closed after {} commands via {}",
        forwarded,
        transport.name()
    );
}

/// Applies transport connectivity changes to the display status
pub async fn relay_transport_events(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    status: StatusRelay,
) {
    while let Some(event) = events.recv().await {
        status.apply_transport_event(event);
    }
    debug!("Transport event channel closed");
}
