//! Keyboard input subsystem
//!
//! Turns raw key transitions into the two facts the mapper cares about:
//!
//! 1. [`key_code`] - which region of the keyboard a key belongs to
//! 2. [`event_collector`] - raw transition collection and duplicate filtering
//! 3. [`tempo`] - typing tempo measurement with bounce suppression
//!
//! # Architecture
//!
//! ```text
//! Key source ──► Collector ──► RawKeyEvent ──► classify ──► Region
//!                (filtered)                └─► TempoTracker ──► Duration?
//! ```

pub mod event_collector;
pub mod key_code;
pub mod tempo;

pub use event_collector::{
    spawn_blocking_reader, CollectorError, CollectorHandle, KeyStateFilter, RawKeyEvent,
};
pub use key_code::{classify, KeyCode, Region};
pub use tempo::{TempoSample, TempoSettings, TempoSnapshot, TempoTracker};
