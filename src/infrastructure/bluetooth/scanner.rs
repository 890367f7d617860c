//! BLE Scanner Module
//!
//! Locates toothbrushes by advertised name.

use crate::domain::models::DeviceHandle;
use crate::infrastructure::bluetooth::connection::ToothbrushPeripheral;
use anyhow::Result;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use std::time::Duration;
use tracing::{debug, info};

/// First Bluetooth adapter of the host
pub async fn default_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No Bluetooth adapter found"))
}

/// Exact match on the advertised local name
pub fn matches_name(local_name: Option<&str>, wanted: &str) -> bool {
    local_name == Some(wanted)
}

/// BLE Scanner for discovering toothbrushes
pub struct BleScanner {
    adapter: Adapter,
}

impl BleScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Scan for `duration` and return every peripheral advertising `name`.
    pub async fn scan(&self, name: &str, duration: Duration) -> Result<Vec<ToothbrushPeripheral>> {
        info!("Starting BLE scan for \"{}\"", name);
        self.adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(duration).await;
        self.adapter.stop_scan().await?;

        let mut found = Vec::new();
        for peripheral in self.adapter.peripherals().await? {
            let Ok(Some(props)) = peripheral.properties().await else {
                continue;
            };
            if !matches_name(props.local_name.as_deref(), name) {
                continue;
            }

            let mut handle = DeviceHandle::new(name, props.address.to_string());
            if let Some(rssi) = props.rssi {
                handle = handle.with_signal_strength(rssi);
            }
            debug!("Found {}", handle);
            found.push(ToothbrushPeripheral { handle, peripheral });
        }

        info!("Scan finished, {} match(es)", found.len());
        Ok(found)
    }

    /// Scan and return the first match, if any.
    pub async fn discover(
        &self,
        name: &str,
        duration: Duration,
    ) -> Result<Option<ToothbrushPeripheral>> {
        Ok(self.scan(name, duration).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_filter_is_exact() {
        assert!(matches_name(Some("Oral-B Toothbrush"), "Oral-B Toothbrush"));
        assert!(!matches_name(Some("Oral-B Toothbrush 2"), "Oral-B Toothbrush"));
        assert!(!matches_name(Some("oral-b toothbrush"), "Oral-B Toothbrush"));
        assert!(!matches_name(None, "Oral-B Toothbrush"));
    }
}
