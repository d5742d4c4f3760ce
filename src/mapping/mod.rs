//! Mapping of key-down patterns to device commands
//!
//! [`PatternMapper`] consumes `(Region, Option<Duration>)` pairs and emits at
//! most one [`Command`] per key-down. It never fails: `None` always means
//! "ignore this key-down".

pub mod device_request;
pub mod pattern_mapper;

pub use device_request::{Command, DeviceRequest};
pub use pattern_mapper::{MapperSettings, MapperState, PatternMapper};
