//! Keystroke rhythm → device command translation
//!
//! Key-downs are classified by keyboard region, timed, and mapped to a small
//! vocabulary of device requests that a transport forwards to a peripheral.
//!
//! ```text
//! keyboard ──► monitor (pipeline) ──► event stream ──► transport
//!                  │
//!                  └──► status (watch) ──► display
//! ```

pub mod config;
pub mod keyboard;
pub mod mapping;
pub mod monitor;
pub mod transport;
