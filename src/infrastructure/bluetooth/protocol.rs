//! Oral-B Toothbrush Protocol
//!
//! GATT characteristic identifiers and payload decoding for the
//! toothbrush telemetry service. Everything here is pure: no state, no I/O.

use crate::domain::models::{BrushMode, BrushStatus, Sector, TelemetrySnapshot};
use crate::error::{Result, TelemetryError};
use serde::Serialize;
use std::fmt;
use tracing::{trace, warn};
use uuid::Uuid;

/// Brushing time characteristic: `[minutes, seconds]`
pub const TIME_CHAR_UUID: Uuid = Uuid::from_u128(0xa0f0ff08_5047_4d53_8208_4f72616c2d42);

/// Battery level characteristic: `[level]`
pub const BATTERY_CHAR_UUID: Uuid = Uuid::from_u128(0xa0f0ff05_5047_4d53_8208_4f72616c2d42);

/// Run status characteristic: `[status code]`
pub const STATUS_CHAR_UUID: Uuid = Uuid::from_u128(0xa0f0ff04_5047_4d53_8208_4f72616c2d42);

/// Cleaning mode characteristic: `[mode code]`
pub const MODE_CHAR_UUID: Uuid = Uuid::from_u128(0xa0f0ff07_5047_4d53_8208_4f72616c2d42);

/// Brush-head sector characteristic: `[sector code, seconds in sector]`
pub const SECTOR_CHAR_UUID: Uuid = Uuid::from_u128(0xa0f0ff09_5047_4d53_8208_4f72616c2d42);

/// Semantic name of each telemetry characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryField {
    Time,
    Battery,
    Status,
    Mode,
    Sector,
}

impl TelemetryField {
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Time => TIME_CHAR_UUID,
            Self::Battery => BATTERY_CHAR_UUID,
            Self::Status => STATUS_CHAR_UUID,
            Self::Mode => MODE_CHAR_UUID,
            Self::Sector => SECTOR_CHAR_UUID,
        }
    }

    /// Minimum payload length needed to decode this field
    pub fn min_len(&self) -> usize {
        match self {
            Self::Time | Self::Sector => 2,
            Self::Battery | Self::Status | Self::Mode => 1,
        }
    }
}

impl fmt::Display for TelemetryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Time => "time",
            Self::Battery => "battery",
            Self::Status => "status",
            Self::Mode => "mode",
            Self::Sector => "sector",
        })
    }
}

/// Characteristics read on every refresh, in read order.
pub const CHARACTERISTICS: [(TelemetryField, Uuid); 5] = [
    (TelemetryField::Time, TIME_CHAR_UUID),
    (TelemetryField::Battery, BATTERY_CHAR_UUID),
    (TelemetryField::Status, STATUS_CHAR_UUID),
    (TelemetryField::Mode, MODE_CHAR_UUID),
    (TelemetryField::Sector, SECTOR_CHAR_UUID),
];

/// Reverse lookup of the characteristic map
pub fn field_for_uuid(uuid: Uuid) -> Option<TelemetryField> {
    CHARACTERISTICS
        .iter()
        .find(|(_, candidate)| *candidate == uuid)
        .map(|(field, _)| *field)
}

/// Telemetry fields whose characteristic is absent from `found`
pub fn missing_fields(found: &[Uuid]) -> Vec<TelemetryField> {
    CHARACTERISTICS
        .into_iter()
        .filter(|(_, uuid)| !found.contains(uuid))
        .map(|(field, _)| field)
        .collect()
}

pub const STATUS_TABLE: &[(u8, BrushStatus)] = &[(2, BrushStatus::Idle), (3, BrushStatus::Run)];

pub const MODE_TABLE: &[(u8, BrushMode)] = &[
    (0, BrushMode::Off),
    (1, BrushMode::DailyClean),
    (2, BrushMode::Sensitive),
    (3, BrushMode::GumCare),
    (4, BrushMode::Whiten),
    (6, BrushMode::TongueClean),
    (7, BrushMode::Intense),
];

pub const SECTOR_TABLE: &[(u8, Sector)] = &[
    (0, Sector::Sector1),
    (1, Sector::Sector2),
    (2, Sector::Sector3),
    (3, Sector::Sector4),
    (4, Sector::Sector5),
    (5, Sector::Sector6),
    (7, Sector::Sector7),
    (8, Sector::Sector8),
    (0xFE, Sector::LastSector),
    (0xFF, Sector::NoSector),
];

fn lookup<T: Copy>(table: &[(u8, T)], code: u8, unknown: T) -> T {
    table
        .iter()
        .find(|(key, _)| *key == code)
        .map(|(_, value)| *value)
        .unwrap_or(unknown)
}

pub fn status_from_code(code: u8) -> BrushStatus {
    lookup(STATUS_TABLE, code, BrushStatus::Unknown)
}

pub fn mode_from_code(code: u8) -> BrushMode {
    lookup(MODE_TABLE, code, BrushMode::Unknown)
}

pub fn sector_from_code(code: u8) -> Sector {
    lookup(SECTOR_TABLE, code, Sector::Unknown)
}

fn require(field: TelemetryField, bytes: &[u8]) -> Result<()> {
    let expected = field.min_len();
    if bytes.len() < expected {
        return Err(TelemetryError::MalformedPayload {
            field,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Brushing time in seconds, encoded as `[minutes, seconds]`.
pub fn decode_brush_time(bytes: &[u8]) -> Result<u32> {
    require(TelemetryField::Time, bytes)?;
    Ok(60 * u32::from(bytes[0]) + u32::from(bytes[1]))
}

pub fn decode_battery(bytes: &[u8]) -> Result<u8> {
    require(TelemetryField::Battery, bytes)?;
    Ok(bytes[0])
}

pub fn decode_status(bytes: &[u8]) -> Result<BrushStatus> {
    require(TelemetryField::Status, bytes)?;
    Ok(status_from_code(bytes[0]))
}

pub fn decode_mode(bytes: &[u8]) -> Result<BrushMode> {
    require(TelemetryField::Mode, bytes)?;
    Ok(mode_from_code(bytes[0]))
}

/// Current sector and the raw seconds spent in it.
pub fn decode_sector(bytes: &[u8]) -> Result<(Sector, u8)> {
    require(TelemetryField::Sector, bytes)?;
    Ok((sector_from_code(bytes[0]), bytes[1]))
}

/// Raw payloads of one complete read cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReadings {
    pub time: Vec<u8>,
    pub battery: Vec<u8>,
    pub status: Vec<u8>,
    pub mode: Vec<u8>,
    pub sector: Vec<u8>,
}

impl RawReadings {
    pub fn set(&mut self, field: TelemetryField, bytes: Vec<u8>) {
        match field {
            TelemetryField::Time => self.time = bytes,
            TelemetryField::Battery => self.battery = bytes,
            TelemetryField::Status => self.status = bytes,
            TelemetryField::Mode => self.mode = bytes,
            TelemetryField::Sector => self.sector = bytes,
        }
    }
}

/// Decode a full read cycle into a partial snapshot.
///
/// A malformed payload leaves its own fields as `None` so the merge keeps the
/// previously cached values; the other fields still decode.
pub fn decode_readings(raw: &RawReadings) -> (TelemetrySnapshot, Vec<TelemetryError>) {
    #[cfg(debug_assertions)]
    trace!("Raw readings: {:02X?}", raw);

    let mut update = TelemetrySnapshot::default();
    let mut errors = Vec::new();

    match decode_brush_time(&raw.time) {
        Ok(v) => update.brush_time = Some(v),
        Err(e) => errors.push(e),
    }
    match decode_battery(&raw.battery) {
        Ok(v) => update.battery = Some(v),
        Err(e) => errors.push(e),
    }
    match decode_status(&raw.status) {
        Ok(v) => update.status = Some(v),
        Err(e) => errors.push(e),
    }
    match decode_mode(&raw.mode) {
        Ok(v) => update.mode = Some(v),
        Err(e) => errors.push(e),
    }
    match decode_sector(&raw.sector) {
        Ok((sector, seconds)) => {
            update.sector = Some(sector);
            update.sector_time = Some(seconds);
        }
        Err(e) => errors.push(e),
    }

    for e in &errors {
        warn!("Keeping cached value: {}", e);
    }

    (update, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brush_time_all_byte_pairs() {
        for m in 0..=255u8 {
            for s in 0..=255u8 {
                assert_eq!(
                    decode_brush_time(&[m, s]).unwrap(),
                    60 * m as u32 + s as u32
                );
            }
        }
        assert_eq!(decode_brush_time(&[255, 255]).unwrap(), 15_555);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(decode_status(&[2]).unwrap(), BrushStatus::Idle);
        assert_eq!(decode_status(&[3]).unwrap(), BrushStatus::Run);
        for code in (0..=255u8).filter(|c| *c != 2 && *c != 3) {
            assert_eq!(status_from_code(code), BrushStatus::Unknown);
        }
    }

    #[test]
    fn test_mode_codes() {
        let expected = [
            (0, BrushMode::Off),
            (1, BrushMode::DailyClean),
            (2, BrushMode::Sensitive),
            (3, BrushMode::GumCare),
            (4, BrushMode::Whiten),
            (6, BrushMode::TongueClean),
            (7, BrushMode::Intense),
        ];
        for (code, mode) in expected {
            assert_eq!(decode_mode(&[code]).unwrap(), mode);
        }
        assert_eq!(decode_mode(&[5]).unwrap(), BrushMode::Unknown);
        assert_eq!(decode_mode(&[0x80]).unwrap(), BrushMode::Unknown);
    }

    #[test]
    fn test_sector_codes() {
        let expected = [
            (0, Sector::Sector1),
            (1, Sector::Sector2),
            (2, Sector::Sector3),
            (3, Sector::Sector4),
            (4, Sector::Sector5),
            (5, Sector::Sector6),
            (7, Sector::Sector7),
            (8, Sector::Sector8),
            (0xFE, Sector::LastSector),
            (0xFF, Sector::NoSector),
        ];
        for (code, sector) in expected {
            assert_eq!(decode_sector(&[code, 12]).unwrap(), (sector, 12));
        }
        assert_eq!(decode_sector(&[6, 0]).unwrap(), (Sector::Unknown, 0));
        assert_eq!(decode_sector(&[9, 0]).unwrap().0, Sector::Unknown);
    }

    #[test]
    fn test_battery_is_raw() {
        assert_eq!(decode_battery(&[0]).unwrap(), 0);
        assert_eq!(decode_battery(&[255, 1]).unwrap(), 255);
    }

    #[test]
    fn test_short_payloads_are_malformed() {
        assert_eq!(
            decode_brush_time(&[1]),
            Err(TelemetryError::MalformedPayload {
                field: TelemetryField::Time,
                expected: 2,
                actual: 1,
            })
        );
        assert!(decode_battery(&[]).is_err());
        assert!(decode_status(&[]).is_err());
        assert!(decode_mode(&[]).is_err());
        assert!(matches!(
            decode_sector(&[0xFE]),
            Err(TelemetryError::MalformedPayload {
                field: TelemetryField::Sector,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_readings_degrades_single_field() {
        let raw = RawReadings {
            time: vec![2, 5],
            battery: vec![80],
            status: vec![3],
            mode: vec![1],
            sector: vec![2],
        };
        let (update, errors) = decode_readings(&raw);
        assert_eq!(update.brush_time, Some(125));
        assert_eq!(update.battery, Some(80));
        assert_eq!(update.status, Some(BrushStatus::Run));
        assert_eq!(update.mode, Some(BrushMode::DailyClean));
        assert_eq!(update.sector, None);
        assert_eq!(update.sector_time, None);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_characteristic_map_is_wire_exact() {
        assert_eq!(
            TIME_CHAR_UUID.to_string(),
            "a0f0ff08-5047-4d53-8208-4f72616c2d42"
        );
        assert_eq!(
            BATTERY_CHAR_UUID.to_string(),
            "a0f0ff05-5047-4d53-8208-4f72616c2d42"
        );
        assert_eq!(
            STATUS_CHAR_UUID.to_string(),
            "a0f0ff04-5047-4d53-8208-4f72616c2d42"
        );
        assert_eq!(
            MODE_CHAR_UUID.to_string(),
            "a0f0ff07-5047-4d53-8208-4f72616c2d42"
        );
        assert_eq!(
            SECTOR_CHAR_UUID.to_string(),
            "a0f0ff09-5047-4d53-8208-4f72616c2d42"
        );
        for (field, uuid) in CHARACTERISTICS {
            assert_eq!(field.uuid(), uuid);
            assert_eq!(field_for_uuid(uuid), Some(field));
        }
        assert_eq!(field_for_uuid(Uuid::nil()), None);
    }

    #[test]
    fn test_missing_fields_lists_unresolved_characteristics() {
        let all: Vec<Uuid> = CHARACTERISTICS.iter().map(|(_, uuid)| *uuid).collect();
        assert!(missing_fields(&all).is_empty());

        let partial = [TIME_CHAR_UUID, STATUS_CHAR_UUID, Uuid::nil()];
        assert_eq!(
            missing_fields(&partial),
            vec![
                TelemetryField::Battery,
                TelemetryField::Mode,
                TelemetryField::Sector
            ]
        );
        assert_eq!(missing_fields(&[]).len(), CHARACTERISTICS.len());
    }
}
