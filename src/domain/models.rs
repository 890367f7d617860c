use serde::{Deserialize, Serialize};
use std::fmt;

/// Latest known telemetry of the toothbrush.
///
/// Every field starts out as `None` and only ever moves from `None` to a value
/// or from one value to another; a failed refresh never clears a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Total brushing time in seconds
    pub brush_time: Option<u32>,
    /// Raw battery level as reported by the device
    pub battery: Option<u8>,
    pub status: Option<BrushStatus>,
    pub mode: Option<BrushMode>,
    pub sector: Option<Sector>,
    /// Seconds spent in the current sector
    pub sector_time: Option<u8>,
}

impl TelemetrySnapshot {
    /// Overlay the fields present in `update` onto a copy of `self`.
    pub fn merged_with(&self, update: &TelemetrySnapshot) -> TelemetrySnapshot {
        TelemetrySnapshot {
            brush_time: update.brush_time.or(self.brush_time),
            battery: update.battery.or(self.battery),
            status: update.status.or(self.status),
            mode: update.mode.or(self.mode),
            sector: update.sector.or(self.sector),
            sector_time: update.sector_time.or(self.sector_time),
        }
    }

    /// True until at least one field has been read.
    pub fn is_empty(&self) -> bool {
        *self == TelemetrySnapshot::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrushStatus {
    Idle,
    Run,
    Unknown,
}

impl BrushStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Run => "RUN",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrushMode {
    Off,
    DailyClean,
    Intense,
    Sensitive,
    Whiten,
    GumCare,
    TongueClean,
    Unknown,
}

impl BrushMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::DailyClean => "DAILY_CLEAN",
            Self::Intense => "INTENSE",
            Self::Sensitive => "SENSITIVE",
            Self::Whiten => "WHITEN",
            Self::GumCare => "GUM_CARE",
            Self::TongueClean => "TONGUE_CLEAN",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Brush-head zone tracked by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    #[serde(rename = "SECTOR_1")]
    Sector1,
    #[serde(rename = "SECTOR_2")]
    Sector2,
    #[serde(rename = "SECTOR_3")]
    Sector3,
    #[serde(rename = "SECTOR_4")]
    Sector4,
    #[serde(rename = "SECTOR_5")]
    Sector5,
    #[serde(rename = "SECTOR_6")]
    Sector6,
    #[serde(rename = "SECTOR_7")]
    Sector7,
    #[serde(rename = "SECTOR_8")]
    Sector8,
    #[serde(rename = "LAST_SECTOR")]
    LastSector,
    #[serde(rename = "NO_SECTOR")]
    NoSector,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sector1 => "SECTOR_1",
            Self::Sector2 => "SECTOR_2",
            Self::Sector3 => "SECTOR_3",
            Self::Sector4 => "SECTOR_4",
            Self::Sector5 => "SECTOR_5",
            Self::Sector6 => "SECTOR_6",
            Self::Sector7 => "SECTOR_7",
            Self::Sector8 => "SECTOR_8",
            Self::LastSector => "LAST_SECTOR",
            Self::NoSector => "NO_SECTOR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(BrushStatus, BrushMode, Sector);

/// A discovered peripheral, as reported by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub name: String,
    pub address: String,
    /// Signal strength at discovery time, in dBm
    pub signal_strength: Option<i16>,
}

impl DeviceHandle {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            signal_strength: None,
        }
    }

    pub fn with_signal_strength(mut self, rssi: i16) -> Self {
        self.signal_strength = Some(rssi);
        self
    }
}

impl AsRef<DeviceHandle> for DeviceHandle {
    fn as_ref(&self) -> &DeviceHandle {
        self
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.signal_strength {
            Some(rssi) => write!(f, "{} [{}] ({} dBm)", self.name, self.address, rssi),
            None => write!(f, "{} [{}]", self.name, self.address),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
}
