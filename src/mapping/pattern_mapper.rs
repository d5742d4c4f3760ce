//! Pattern recognition over consecutive key-downs
//!
//! The mapper receives one `(Region, Option<Duration>)` pair per accepted
//! key-down and decides which [`DeviceRequest`] to emit and how fast.
//!
//! # Priority
//!
//! ```text
//! Pattern            Sequence     Fires on   Request
//! ─────────────────  ───────────  ─────────  ──────────────────────
//! Alternation        L R L R      4th press  AlternateStartingLeft
//!                    R L R L      4th press  AlternateStartingRight
//! Same-region repeat R R R        3rd press  RightTriple
//!                    ⎵ ⎵ ⎵        3rd press  BothTriple
//!                    ⎵ ⎵ ⎵ ⎵      4th press  BothQuad
//! Single             L / R / ⎵    always     Left / Right / Both
//! ```
//!
//! Left has no repeat request; three lefts in a row stay plain `Left`.
//!
//! # Interval
//!
//! Single requests mirror the measured keystroke interval (500 ms default for
//! the first press). Burst requests spread the sum of the recent interval
//! window evenly over their movements. Both are clamped to 50..=1000 ms.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace};

use super::device_request::{Command, DeviceRequest};
use crate::keyboard::Region;

/// Mapper settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperSettings {
    /// Presses needed to trigger a pattern; also the interval window size
    pub trigger_count: u32,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    /// Used when no interval was measured (first press of a burst)
    pub default_interval_ms: u64,
}

impl Default for MapperSettings {
    fn default() -> Self {
        Self {
            trigger_count: 3,
            min_interval_ms: 50,
            max_interval_ms: 1000,
            default_interval_ms: 500,
        }
    }
}

impl MapperSettings {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms)
    }
}

/// Running pattern state, owned by the mapper
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapperState {
    /// Completed left/right alternations in the current run
    pub alternating_count: u32,
    /// Last region seen, for alternation
    pub previous_region: Region,
    /// Length of the current same-region run
    pub consecutive_count: u32,
    pub consecutive_region: Region,
    /// Most recent measured intervals, at most `trigger_count`
    pub recent_intervals: VecDeque<Duration>,
}

#[derive(Debug)]
pub struct PatternMapper {
    settings: MapperSettings,
    state: MapperState,
}

impl PatternMapper {
    pub fn new(settings: MapperSettings) -> Self {
        debug!("Creating pattern mapper with settings: {:?}", settings);
        let window = settings.trigger_count as usize;
        Self {
            settings,
            state: MapperState {
                recent_intervals: VecDeque::with_capacity(window),
                ..MapperState::default()
            },
        }
    }

    pub fn state(&self) -> &MapperState {
        &self.state
    }

    pub fn settings(&self) -> &MapperSettings {
        &self.settings
    }

    /// Maps one key-down to a command
    ///
    /// Returns `None` for [`Region::None`] without touching any state.
    pub fn map(&mut self, region: Region, interval: Option<Duration>) -> Option<Command> {
        if region == Region::None {
            return None;
        }

        if let Some(interval) = interval {
            self.push_interval(interval);
        }

        let request = self.resolve_request(region);
        if request == DeviceRequest::NoOp {
            return None;
        }

        let interval = if request.is_multi_press() && !self.state.recent_intervals.is_empty() {
            let burst: Duration = self.state.recent_intervals.iter().sum();
            self.clamp(burst / request.movement_count())
        } else {
            self.clamp(interval.unwrap_or_else(|| self.settings.default_interval()))
        };

        trace!("Mapped {} to {} at {:?}", region, request, interval);
        Some(Command::new(request, interval))
    }

    fn push_interval(&mut self, interval: Duration) {
        let window = &mut self.state.recent_intervals;
        window.push_back(interval);
        while window.len() > self.settings.trigger_count as usize {
            window.pop_front();
        }
    }

    fn clamp(&self, interval: Duration) -> Duration {
        interval.clamp(self.settings.min_interval(), self.settings.max_interval())
    }

    // Alternation > same-region repeat > single mapping
    fn resolve_request(&mut self, region: Region) -> DeviceRequest {
        let trigger = self.settings.trigger_count;

        if region == self.state.consecutive_region {
            self.state.consecutive_count += 1;
        } else {
            self.state.consecutive_count = 1;
            self.state.consecutive_region = region;
        }

        if self.alternation_triggered(region) {
            self.state.alternating_count = 0;
            self.state.previous_region = region;
            // Named for the side that opened the run, the opposite of the current one
            return match region {
                Region::Left => DeviceRequest::AlternateStartingRight,
                _ => DeviceRequest::AlternateStartingLeft,
            };
        }
        self.update_alternation(region);

        let count = self.state.consecutive_count;
        match region {
            Region::Right if count >= trigger => DeviceRequest::RightTriple,
            Region::Both if count > trigger => DeviceRequest::BothQuad,
            Region::Both if count >= trigger => DeviceRequest::BothTriple,
            Region::Left => DeviceRequest::Left,
            Region::Right => DeviceRequest::Right,
            Region::Both => DeviceRequest::Both,
            Region::None => DeviceRequest::NoOp,
        }
    }

    fn alternation_triggered(&self, region: Region) -> bool {
        region.is_side()
            && self.state.previous_region.is_side()
            && region != self.state.previous_region
            && self.state.alternating_count + 1 >= self.settings.trigger_count
    }

    fn update_alternation(&mut self, region: Region) {
        if !region.is_side() {
            self.state.alternating_count = 0;
        } else if self.state.previous_region.is_side() {
            if region != self.state.previous_region {
                self.state.alternating_count += 1;
            } else {
                self.state.alternating_count = 0;
            }
        }
        self.state.previous_region = region;
    }
}

impl Default for PatternMapper {
    fn default() -> Self {
        Self::new(MapperSettings::default())
    }
}
