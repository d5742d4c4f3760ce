//! Display status published by the monitor
//!
//! Everything here is for a dashboard: it never feeds back into the mapper.

use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::keyboard::{Region, TempoSnapshot};
use crate::mapping::Command;
use crate::transport::{ConnectionState, TransportEvent};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MonitorStatus {
    pub left_active: bool,
    pub right_active: bool,
    pub last_region: Region,
    pub typing_interval_ms: f64,
    pub keys_per_second: f64,
    pub is_monitoring: bool,
    pub connection: ConnectionState,
    pub connection_error: Option<String>,
    pub last_command: Option<Command>,
    pub last_activity: Option<DateTime<Local>>,
}

impl MonitorStatus {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }
}

/// Shared writer for [`MonitorStatus`]
///
/// Cheap to clone; every clone writes the same watch channel.
#[derive(Clone, Debug)]
pub struct StatusRelay {
    sender: Arc<watch::Sender<MonitorStatus>>,
}

impl StatusRelay {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(MonitorStatus::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> MonitorStatus {
        self.sender.borrow().clone()
    }

    /// Lights the side(s) of the keyboard that were just pressed
    pub fn flash(&self, region: Region) {
        let (left, right) = match region {
            Region::Left => (true, false),
            Region::Right => (false, true),
            Region::Both => (true, true),
            Region::None => return,
        };
        self.sender.send_modify(|status| {
            status.left_active = left;
            status.right_active = right;
            status.last_region = region;
        });
    }

    pub fn clear_flash(&self) {
        self.sender.send_if_modified(|status| {
            let changed = status.left_active || status.right_active;
            status.left_active = false;
            status.right_active = false;
            changed
        });
    }

    pub fn update_tempo(&self, tempo: TempoSnapshot) {
        self.sender.send_modify(|status| {
            status.typing_interval_ms = tempo.typing_interval_ms;
            status.keys_per_second = tempo.keys_per_second;
        });
    }

    pub fn reset_tempo(&self) {
        debug!("Typing idle, resetting tempo display");
        self.update_tempo(TempoSnapshot::default());
    }

    pub fn record_command(&self, command: Command) {
        self.sender.send_modify(|status| {
            status.last_command = Some(command);
            status.last_activity = Some(Local::now());
        });
    }

    pub fn set_monitoring(&self, monitoring: bool) {
        self.sender.send_modify(|status| {
            status.is_monitoring = monitoring;
        });
    }

    /// Returns the display to its idle look after a session ends
    pub fn reset_session(&self) {
        self.sender.send_modify(|status| {
            status.is_monitoring = false;
            status.left_active = false;
            status.right_active = false;
            status.last_region = Region::None;
            status.typing_interval_ms = 0.0;
            status.keys_per_second = 0.0;
        });
    }

    /// User asked for a reconnect
    pub fn begin_reconnect(&self) {
        self.sender.send_modify(|status| {
            status.connection_error = None;
            if status.connection != ConnectionState::Connected {
                status.connection = ConnectionState::Reconnecting;
            }
        });
    }

    pub fn apply_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connecting => {
                debug!("Device connection in progress");
                self.sender.send_modify(|status| {
                    status.connection = ConnectionState::Connecting;
                });
            }
            TransportEvent::Connected => {
                info!("Device connected");
                self.sender.send_modify(|status| {
                    status.connection = ConnectionState::Connected;
                    status.connection_error = None;
                });
            }
            TransportEvent::Disconnected => {
                warn!("Device disconnected");
                self.sender.send_modify(|status| {
                    status.connection = ConnectionState::Disconnected;
                });
            }
            TransportEvent::SendFailed(reason) => {
                warn!("Device send failed: {}", reason);
                self.sender.send_modify(|status| {
                    status.connection_error = Some(reason);
                });
            }
        }
    }
}

impl Default for StatusRelay {
    fn default() -> Self {
        Self::new()
    }
}
