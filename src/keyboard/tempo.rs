//! Typing tempo tracking
//!
//! Measures the time between consecutive key-downs, swallows contact bounce
//! and treats a long pause as the start of a new burst. Only the measured
//! interval flows on to the pattern mapper; the derived rate is display data.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Tempo tracker settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoSettings {
    /// Key-downs closer together than this are contact bounce
    pub bounce_threshold_ms: u64,

    /// Quiet period after which typing counts as idle
    pub idle_reset_ms: u64,
}

impl Default for TempoSettings {
    fn default() -> Self {
        Self {
            bounce_threshold_ms: 10,
            idle_reset_ms: 2000,
        }
    }
}

impl TempoSettings {
    pub fn bounce_threshold(&self) -> Duration {
        Duration::from_millis(self.bounce_threshold_ms)
    }

    pub fn idle_reset(&self) -> Duration {
        Duration::from_millis(self.idle_reset_ms)
    }
}

/// Outcome of a single key-down observation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TempoSample {
    /// Too close to the previous key-down; drop the event entirely
    Bounce,
    /// No reference key-down (session start or after an idle period)
    First,
    /// Elapsed time since the previous accepted key-down
    Interval(Duration),
}

impl TempoSample {
    /// The interval handed to the mapper, `None` for the first key-down of a burst
    pub fn interval(self) -> Option<Duration> {
        match self {
            TempoSample::Interval(d) => Some(d),
            TempoSample::First | TempoSample::Bounce => None,
        }
    }

    pub fn is_bounce(self) -> bool {
        matches!(self, TempoSample::Bounce)
    }
}

/// Display snapshot of the current typing tempo
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TempoSnapshot {
    pub typing_interval_ms: f64,
    pub keys_per_second: f64,
}

#[derive(Debug)]
pub struct TempoTracker {
    settings: TempoSettings,
    last_key_time: Option<Instant>,
    snapshot: TempoSnapshot,
}

impl TempoTracker {
    pub fn new(settings: TempoSettings) -> Self {
        debug!("Creating tempo tracker with settings: {:?}", settings);
        Self {
            settings,
            last_key_time: None,
            snapshot: TempoSnapshot::default(),
        }
    }

    /// Records a key-down at `now`
    ///
    /// A bounce leaves the tracker untouched. A key-down arriving after the
    /// idle period has no reference and starts over as [`TempoSample::First`].
    pub fn observe(&mut self, now: Instant) -> TempoSample {
        let Some(previous) = self.last_key_time else {
            self.start_burst(now);
            return TempoSample::First;
        };

        let elapsed = now.saturating_duration_since(previous);

        if elapsed < self.settings.bounce_threshold() {
            trace!("Bounce suppressed ({:?} since last key-down)", elapsed);
            return TempoSample::Bounce;
        }

        if elapsed >= self.settings.idle_reset() {
            debug!("Idle for {:?}, starting a new burst", elapsed);
            self.start_burst(now);
            return TempoSample::First;
        }

        let seconds = elapsed.as_secs_f64();
        self.snapshot = TempoSnapshot {
            typing_interval_ms: seconds * 1000.0,
            keys_per_second: 1.0 / seconds,
        };
        self.last_key_time = Some(now);

        TempoSample::Interval(elapsed)
    }

    /// Current tempo for display
    pub fn snapshot(&self) -> TempoSnapshot {
        self.snapshot
    }

    pub fn settings(&self) -> &TempoSettings {
        &self.settings
    }

    fn start_burst(&mut self, now: Instant) {
        self.last_key_time = Some(now);
        self.snapshot = TempoSnapshot::default();
    }
}

impl Default for TempoTracker {
    fn default() -> Self {
        Self::new(TempoSettings::default())
    }
}
