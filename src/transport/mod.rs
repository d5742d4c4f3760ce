//! # Transport Integration Module
//!
//! Delivers device commands to the peripheral and reports connectivity back.
//! The monitor never talks to a transport directly: the [`bridge`] drains the
//! monitor's event stream into a [`DeviceTransport`] and relays
//! [`TransportEvent`]s into the display status.
//!
//! ```text
//! transport/
//! ├── bridge.rs   - monitor stream → transport, transport events → status
//! ├── logging.rs  - dry-run transport that only logs commands
//! └── mqtt.rs     - publishes commands to an MQTT broker
//! ```
//!
//! Delivery is best effort. A failed send is reported as
//! [`TransportEvent::SendFailed`] and the stream carries on.

pub mod bridge;
pub mod logging;
pub mod mqtt;

pub use bridge::{forward_commands, relay_transport_events};
pub use logging::LoggingTransport;
pub use mqtt::{MqttConfig, MqttTransport};

use crate::mapping::Command;

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Connectivity change reported by a transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Connecting,
    Connected,
    Disconnected,
    SendFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport not connected")]
    NotConnected,

    #[error("Failed to publish command: {0}")]
    PublishError(String),

    #[error("Reconnect failed: {0}")]
    ReconnectError(String),
}

/// Something that can move the peripheral
///
/// Calls must not block: the bridge drains the command stream in order and a
/// slow transport should queue or fail rather than stall it.
pub trait DeviceTransport: Send {
    fn send(&mut self, command: Command) -> Result<(), TransportError>;

    fn reconnect(&mut self) -> Result<(), TransportError>;

    fn name(&self) -> &str {
        "transport"
    }
}

impl<T: DeviceTransport + ?Sized> DeviceTransport for Box<T> {
    fn send(&mut self, command: Command) -> Result<(), TransportError> {
        (**self).send(command)
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        (**self).reconnect()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
