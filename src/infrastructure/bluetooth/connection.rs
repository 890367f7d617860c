//! BLE Connection Module
//!
//! btleplug implementation of [`BleTransport`]: connection establishment
//! with bounded retry, GATT characteristic lookup and reads, and link-loss
//! reporting driven by adapter events.

use crate::domain::models::DeviceHandle;
use crate::error::{Result, TelemetryError};
use crate::infrastructure::bluetooth::protocol::{field_for_uuid, missing_fields, CHARACTERISTICS};
use crate::infrastructure::bluetooth::transport::{BleTransport, LinkMonitor};
use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for connection behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Maximum connection attempts before giving up
    pub max_retries: u32,
    /// Base delay between attempts in milliseconds, grows linearly per attempt
    pub retry_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

impl ConnectionConfig {
    /// Delay to wait after the given failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

/// A toothbrush located by the scanner
#[derive(Clone)]
pub struct ToothbrushPeripheral {
    pub handle: DeviceHandle,
    pub peripheral: Peripheral,
}

impl AsRef<DeviceHandle> for ToothbrushPeripheral {
    fn as_ref(&self) -> &DeviceHandle {
        &self.handle
    }
}

impl fmt::Debug for ToothbrushPeripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToothbrushPeripheral")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Live connection with its resolved characteristics
pub struct BtleplugConnection {
    peripheral: Peripheral,
    characteristics: HashMap<Uuid, Characteristic>,
    watcher: JoinHandle<()>,
}

impl Drop for BtleplugConnection {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// BLE transport over the platform adapter
pub struct BtleplugTransport {
    adapter: Adapter,
    config: ConnectionConfig,
}

impl BtleplugTransport {
    pub fn new(adapter: Adapter, config: ConnectionConfig) -> Self {
        Self { adapter, config }
    }

    async fn try_connect(
        &self,
        device: &ToothbrushPeripheral,
        monitor: &LinkMonitor,
    ) -> Result<BtleplugConnection> {
        let peripheral = &device.peripheral;

        // Subscribe before connecting so an early drop is not missed
        let events = self.adapter.events().await.map_err(link_error)?;

        if !peripheral.is_connected().await.map_err(link_error)? {
            peripheral.connect().await.map_err(link_error)?;
        }
        peripheral.discover_services().await.map_err(link_error)?;

        let characteristics: HashMap<Uuid, Characteristic> = peripheral
            .characteristics()
            .into_iter()
            .filter(|c| field_for_uuid(c.uuid).is_some())
            .map(|c| (c.uuid, c))
            .collect();
        debug!(
            "Found {} of {} telemetry characteristics",
            characteristics.len(),
            CHARACTERISTICS.len()
        );
        let found: Vec<Uuid> = characteristics.keys().copied().collect();
        let missing = missing_fields(&found);
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
            return Err(TelemetryError::Connection(format!(
                "missing characteristics: {}",
                names.join(", ")
            )));
        }

        let watcher = spawn_link_watcher(events, peripheral.id(), monitor.clone());

        Ok(BtleplugConnection {
            peripheral: peripheral.clone(),
            characteristics,
            watcher,
        })
    }
}

fn link_error(e: btleplug::Error) -> TelemetryError {
    TelemetryError::Connection(e.to_string())
}

fn spawn_link_watcher(
    mut events: std::pin::Pin<Box<dyn futures::Stream<Item = CentralEvent> + Send>>,
    id: btleplug::platform::PeripheralId,
    monitor: LinkMonitor,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if let CentralEvent::DeviceDisconnected(lost) = event {
                if lost == id {
                    debug!("Link {} lost", monitor.generation());
                    monitor.link_lost();
                    break;
                }
            }
            if monitor.is_closed() {
                break;
            }
        }
    })
}

#[async_trait]
impl BleTransport for BtleplugTransport {
    type Device = ToothbrushPeripheral;
    type Connection = BtleplugConnection;

    async fn connect(
        &self,
        device: &ToothbrushPeripheral,
        name: &str,
        monitor: LinkMonitor,
    ) -> Result<BtleplugConnection> {
        let max_retries = self.config.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_retries {
            info!(
                "{}: Connecting to {} (attempt {}/{})",
                name, device.handle, attempt, max_retries
            );
            match self.try_connect(device, &monitor).await {
                Ok(connection) => return Ok(connection),
                Err(e) => {
                    warn!("{}: Connection attempt {} failed: {}", name, attempt, e);
                    last_error = e.to_string();
                    // Leave the peripheral in a clean state for the next attempt
                    if let Err(e) = device.peripheral.disconnect().await {
                        debug!("{}: Cleanup disconnect failed: {}", name, e);
                    }
                    if attempt < max_retries {
                        tokio::time::sleep(self.config.backoff(attempt)).await;
                    }
                }
            }
        }

        Err(TelemetryError::Connection(format!(
            "failed after {} attempts: {}",
            max_retries, last_error
        )))
    }

    async fn read_characteristic(
        &self,
        connection: &BtleplugConnection,
        characteristic: Uuid,
    ) -> Result<Vec<u8>> {
        let field = field_for_uuid(characteristic).ok_or_else(|| {
            TelemetryError::Connection(format!("unknown characteristic {}", characteristic))
        })?;
        let target = connection
            .characteristics
            .get(&characteristic)
            .ok_or_else(|| TelemetryError::read(field, "characteristic not found"))?;

        connection
            .peripheral
            .read(target)
            .await
            .map_err(|e| TelemetryError::read(field, e))
    }

    async fn disconnect(&self, connection: &BtleplugConnection) -> Result<()> {
        connection.watcher.abort();
        connection
            .peripheral
            .disconnect()
            .await
            .map_err(link_error)
    }
}
