//! Scripted transport for session tests.

use crate::domain::models::DeviceHandle;
use crate::error::{Result, TelemetryError};
use crate::infrastructure::bluetooth::protocol::{field_for_uuid, TelemetryField};
use crate::infrastructure::bluetooth::transport::{BleTransport, LinkMonitor};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum MockRead {
    Value(Vec<u8>),
    Fail,
    /// Never completes
    Hang,
}

#[derive(Debug)]
pub struct MockConnection {
    pub generation: u64,
}

#[derive(Default)]
pub struct MockTransport {
    reads: Mutex<HashMap<TelemetryField, MockRead>>,
    connect_failure: AtomicBool,
    connect_delay: Mutex<Duration>,
    connect_calls: AtomicUsize,
    read_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    disconnect_hang: AtomicBool,
    monitors: Mutex<Vec<LinkMonitor>>,
    connected_addresses: Mutex<Vec<String>>,
}

impl MockTransport {
    /// time=[2,5], battery=[80], status=[3], mode=[1], sector=[2,30]
    pub fn with_example_readings() -> Self {
        let transport = Self::default();
        transport.set_read(TelemetryField::Time, MockRead::Value(vec![2, 5]));
        transport.set_read(TelemetryField::Battery, MockRead::Value(vec![80]));
        transport.set_read(TelemetryField::Status, MockRead::Value(vec![3]));
        transport.set_read(TelemetryField::Mode, MockRead::Value(vec![1]));
        transport.set_read(TelemetryField::Sector, MockRead::Value(vec![2, 30]));
        transport
    }

    pub fn set_read(&self, field: TelemetryField, read: MockRead) {
        self.reads.lock().unwrap().insert(field, read);
    }

    pub fn set_connect_failure(&self, fail: bool) {
        self.connect_failure.store(fail, Ordering::SeqCst);
    }

    /// Make `disconnect` never complete.
    pub fn set_disconnect_hang(&self, hang: bool) {
        self.disconnect_hang.store(hang, Ordering::SeqCst);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = delay;
    }

    /// Report loss of the most recent connection.
    pub fn drop_link(&self) {
        if let Some(monitor) = self.monitors.lock().unwrap().last() {
            monitor.link_lost();
        }
    }

    /// Report loss of the `index`-th connection ever made.
    pub fn drop_link_of(&self, index: usize) {
        self.monitors.lock().unwrap()[index].link_lost();
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn connected_addresses(&self) -> Vec<String> {
        self.connected_addresses.lock().unwrap().clone()
    }
}

#[async_trait]
impl BleTransport for MockTransport {
    type Device = DeviceHandle;
    type Connection = MockConnection;

    async fn connect(
        &self,
        device: &DeviceHandle,
        _name: &str,
        monitor: LinkMonitor,
    ) -> Result<MockConnection> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.connect_failure.load(Ordering::SeqCst) {
            return Err(TelemetryError::Connection("device not reachable".into()));
        }

        self.connected_addresses
            .lock()
            .unwrap()
            .push(device.address.clone());
        let generation = monitor.generation();
        self.monitors.lock().unwrap().push(monitor);
        Ok(MockConnection { generation })
    }

    async fn read_characteristic(
        &self,
        _connection: &MockConnection,
        characteristic: Uuid,
    ) -> Result<Vec<u8>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let field = field_for_uuid(characteristic).ok_or_else(|| {
            TelemetryError::Connection(format!("unknown characteristic {}", characteristic))
        })?;
        let read = self.reads.lock().unwrap().get(&field).cloned();

        match read {
            Some(MockRead::Value(bytes)) => Ok(bytes),
            Some(MockRead::Hang) => std::future::pending().await,
            Some(MockRead::Fail) | None => Err(TelemetryError::read(field, "gatt read failed")),
        }
    }

    async fn disconnect(&self, _connection: &MockConnection) -> Result<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if self.disconnect_hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}
