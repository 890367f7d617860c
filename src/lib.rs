//! Telemetry client for Oral-B Bluetooth toothbrushes.
//!
//! [`DeviceSession`] keeps a connection to one toothbrush alive across
//! transient disconnects and turns each `refresh()` into a
//! [`TelemetrySnapshot`]. Failures never surface to the caller; the last
//! good snapshot is returned instead.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::models::{
    BrushMode, BrushStatus, ConnectionStatus, DeviceHandle, Sector, TelemetrySnapshot,
};
pub use error::TelemetryError;
pub use infrastructure::bluetooth::connection::{BtleplugTransport, ToothbrushPeripheral};
pub use infrastructure::bluetooth::transport::{BleTransport, LinkEvent, LinkMonitor};
pub use infrastructure::bluetooth::{DeviceSession, SessionConfig};
