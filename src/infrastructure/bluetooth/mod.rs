//! Bluetooth Module
//!
//! Telemetry acquisition from an Oral-B toothbrush.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     DeviceSession                        │
//! │   (rate limiting, reconnects, snapshot cache - public)   │
//! └──────────────┬─────────────────────────────┬────────────┘
//!                │                             │
//!                ▼                             ▼
//!        ┌──────────────┐               ┌────────────┐
//!        │ BleTransport │               │  Protocol  │
//!        │   (trait)    │               │            │
//!        └──────┬───────┘               │ - UUIDs    │
//!               │                       │ - Decoding │
//!        ┌──────┴───────┐               └────────────┘
//!        │  Connection  │◄── Scanner
//!        │  (btleplug)  │
//!        └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Characteristic identifiers and payload decoding
//! - [`transport`] - Transport trait and link-loss messages
//! - [`connection`] - btleplug transport
//! - [`scanner`] - BLE device discovery
//! - [`session`] - Per-device telemetry session

pub mod connection;
#[cfg(test)]
pub mod mock;
pub mod protocol;
pub mod scanner;
pub mod session;
pub mod transport;

pub use session::{DeviceSession, SessionConfig};
