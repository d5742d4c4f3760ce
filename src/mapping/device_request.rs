//! Device requests and the commands that carry them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Discrete movement request understood by the peripheral
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceRequest {
    NoOp,
    Left,
    Right,
    Both,
    LeftRight,
    RightTriple,
    BothTriple,
    BothQuad,
    AlternateStartingLeft,
    AlternateStartingRight,
}

impl DeviceRequest {
    pub const ALL: [DeviceRequest; 10] = [
        DeviceRequest::NoOp,
        DeviceRequest::Left,
        DeviceRequest::Right,
        DeviceRequest::Both,
        DeviceRequest::LeftRight,
        DeviceRequest::RightTriple,
        DeviceRequest::BothTriple,
        DeviceRequest::BothQuad,
        DeviceRequest::AlternateStartingLeft,
        DeviceRequest::AlternateStartingRight,
    ];

    /// Burst requests produced by a repeat or alternation pattern
    ///
    /// Their interval is spread over the whole burst instead of mirroring a
    /// single keystroke. `LeftRight` is not one of them.
    pub const fn is_multi_press(self) -> bool {
        matches!(
            self,
            DeviceRequest::RightTriple
                | DeviceRequest::BothTriple
                | DeviceRequest::BothQuad
                | DeviceRequest::AlternateStartingLeft
                | DeviceRequest::AlternateStartingRight
        )
    }

    /// Number of discrete device movements this request produces
    pub const fn movement_count(self) -> u32 {
        match self {
            DeviceRequest::NoOp => 0,
            DeviceRequest::Left | DeviceRequest::Right | DeviceRequest::Both => 1,
            DeviceRequest::LeftRight => 2,
            DeviceRequest::RightTriple | DeviceRequest::BothTriple => 3,
            DeviceRequest::BothQuad => 4,
            DeviceRequest::AlternateStartingLeft | DeviceRequest::AlternateStartingRight => 6,
        }
    }
}

impl fmt::Display for DeviceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceRequest::NoOp => "NoOp",
            DeviceRequest::Left => "Left",
            DeviceRequest::Right => "Right",
            DeviceRequest::Both => "Both",
            DeviceRequest::LeftRight => "LeftRight",
            DeviceRequest::RightTriple => "RightTriple",
            DeviceRequest::BothTriple => "BothTriple",
            DeviceRequest::BothQuad => "BothQuad",
            DeviceRequest::AlternateStartingLeft => "AlternateStartingLeft",
            DeviceRequest::AlternateStartingRight => "AlternateStartingRight",
        };
        f.write_str(name)
    }
}

/// A request plus the per-movement interval the device should use
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Command {
    pub request: DeviceRequest,
    pub interval: Duration,
}

impl Command {
    pub fn new(request: DeviceRequest, interval: Duration) -> Self {
        Self { request, interval }
    }

    /// Total device time for the whole request
    pub fn total_duration(&self) -> Duration {
        self.interval * self.request.movement_count()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.request, self.interval.as_millis())
    }
}
