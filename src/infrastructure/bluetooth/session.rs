//! Device Session
//!
//! Owns the connection to one toothbrush and turns "refresh requested" into a
//! best-effort telemetry snapshot. Connection churn, read failures and
//! timeouts are logged here and never reach the caller; the last good
//! snapshot is returned instead.

use crate::domain::models::{ConnectionStatus, TelemetrySnapshot};
use crate::error::{Result, TelemetryError};
use crate::infrastructure::bluetooth::protocol::{self, RawReadings, CHARACTERISTICS};
use crate::infrastructure::bluetooth::transport::{BleTransport, LinkEvent, LinkMonitor};
use futures::future::try_join_all;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Configuration for session behavior
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Name used in logs and passed to the transport on connect
    pub name: String,
    /// Refreshes closer together than this return the cached snapshot
    pub min_refresh_interval: Duration,
    /// Upper bound on one connection attempt, including transport retries
    pub connect_timeout: Duration,
    /// Upper bound on one batch of characteristic reads
    pub read_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "OralB".to_string(),
            min_refresh_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(10),
        }
    }
}

struct Link<C> {
    connection: Option<C>,
    /// Generation of the most recent connection attempt
    generation: u64,
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

/// Telemetry session for a single peripheral
pub struct DeviceSession<T: BleTransport> {
    transport: Arc<T>,
    config: SessionConfig,
    device: Mutex<Option<T::Device>>,
    link: tokio::sync::Mutex<Link<T::Connection>>,
    link_events: mpsc::UnboundedSender<LinkEvent>,
    /// Number of connection attempts that have run to completion
    finished_connects: AtomicU64,
    /// Mirrors `link.connection.is_some()` for readers that must not wait on the link
    connected: AtomicBool,
    snapshot: RwLock<Arc<TelemetrySnapshot>>,
    last_refresh: Mutex<Option<Instant>>,
}

impl<T: BleTransport> DeviceSession<T> {
    pub fn new(transport: Arc<T>, config: SessionConfig) -> Self {
        let (link_events, events) = mpsc::unbounded_channel();
        Self {
            transport,
            config,
            device: Mutex::new(None),
            link: tokio::sync::Mutex::new(Link {
                connection: None,
                generation: 0,
                events,
            }),
            link_events,
            finished_connects: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            snapshot: RwLock::new(Arc::new(TelemetrySnapshot::default())),
            last_refresh: Mutex::new(None),
        }
    }

    pub fn with_device(transport: Arc<T>, config: SessionConfig, device: T::Device) -> Self {
        let session = Self::new(transport, config);
        session.bind(device);
        session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the bound device. Takes effect on the next refresh; an open
    /// connection is kept.
    pub fn bind(&self, device: T::Device) {
        info!("{}: Bound to {}", self.config.name, device.as_ref());
        *self.device.lock().unwrap_or_else(PoisonError::into_inner) = Some(device);
    }

    /// Drop the device and close any open connection.
    pub async fn release(&self) {
        self.device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let mut link = self.link.lock().await;
        self.drain_link_events(&mut link);
        if link.connection.is_some() {
            self.close_connection(&mut link).await;
            info!("{}: Disconnected from device", self.config.name);
        }
    }

    pub fn device(&self) -> Option<T::Device> {
        self.device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_bound(&self) -> bool {
        self.device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The cached snapshot, without touching the device.
    pub fn snapshot(&self) -> Arc<TelemetrySnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current connection state. Never waits: while a refresh holds the link
    /// this reports the state that refresh last observed.
    pub fn status(&self) -> ConnectionStatus {
        if let Ok(mut link) = self.link.try_lock() {
            self.drain_link_events(&mut link);
        }
        if self.connected.load(Ordering::SeqCst) {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    /// Poll the device and return the latest snapshot.
    ///
    /// Never fails: on any connection or read problem the previously cached
    /// snapshot is returned unchanged.
    pub async fn refresh(&self) -> Arc<TelemetrySnapshot> {
        let Some(device) = self.device() else {
            return self.snapshot();
        };

        if !self.pass_rate_limit() {
            debug!("{}: Refresh rate limited", self.config.name);
            return self.snapshot();
        }

        let seen_connects = self.finished_connects.load(Ordering::SeqCst);
        let mut link = self.link.lock().await;
        self.drain_link_events(&mut link);

        if let Err(e) = self.ensure_connected(&mut link, &device, seen_connects).await {
            warn!("{}: Error connecting to device: {}", self.config.name, e);
            return self.snapshot();
        }

        let result = match link.connection.as_ref() {
            Some(connection) => self.read_all(connection).await,
            None => Err(TelemetryError::NotConnected),
        };

        match result {
            Ok(raw) => {
                let (update, _malformed) = protocol::decode_readings(&raw);
                self.commit(&update)
            }
            Err(e) => {
                warn!("{}: Telemetry read failed: {}", self.config.name, e);
                if e.is_link_failure() {
                    self.close_connection(&mut link).await;
                }
                self.snapshot()
            }
        }
    }

    fn pass_rate_limit(&self) -> bool {
        let mut last = self
            .last_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if let Some(previous) = *last {
            if now.duration_since(previous) < self.config.min_refresh_interval {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    fn drain_link_events(&self, link: &mut Link<T::Connection>) {
        while let Ok(event) = link.events.try_recv() {
            match event {
                LinkEvent::Lost { generation }
                    if generation == link.generation && link.connection.is_some() =>
                {
                    info!("{}: Disconnected from device", self.config.name);
                    link.connection = None;
                    self.connected.store(false, Ordering::SeqCst);
                }
                LinkEvent::Lost { generation } => {
                    debug!(
                        "{}: Ignoring link loss for stale connection {}",
                        self.config.name, generation
                    );
                }
            }
        }
    }

    async fn ensure_connected(
        &self,
        link: &mut Link<T::Connection>,
        device: &T::Device,
        seen_connects: u64,
    ) -> Result<()> {
        if link.connection.is_some() {
            return Ok(());
        }

        // Another caller attempted a connection while we waited for the link;
        // adopt its outcome rather than starting a second attempt.
        if self.finished_connects.load(Ordering::SeqCst) != seen_connects {
            return Err(TelemetryError::NotConnected);
        }

        link.generation += 1;
        let monitor = LinkMonitor::new(link.generation, self.link_events.clone());
        let handle = device.as_ref();
        debug!(
            "{}: Connecting; RSSI: {:?}",
            self.config.name, handle.signal_strength
        );

        let outcome = timeout(
            self.config.connect_timeout,
            self.transport.connect(device, &self.config.name, monitor),
        )
        .await;
        self.finished_connects.fetch_add(1, Ordering::SeqCst);

        let connection = outcome.map_err(|_| TelemetryError::Timeout {
            operation: "connect".to_string(),
            duration: self.config.connect_timeout,
        })??;

        info!(
            "{}: Connected; RSSI: {:?}",
            self.config.name, handle.signal_strength
        );
        link.connection = Some(connection);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn read_all(&self, connection: &T::Connection) -> Result<RawReadings> {
        let reads = CHARACTERISTICS.into_iter().map(move |(field, uuid)| async move {
            let bytes = self.transport.read_characteristic(connection, uuid).await?;
            debug!("{}: {} = {:02X?}", self.config.name, field, bytes);
            Ok::<_, TelemetryError>((field, bytes))
        });

        let results = timeout(self.config.read_timeout, try_join_all(reads))
            .await
            .map_err(|_| TelemetryError::Timeout {
                operation: "characteristic reads".to_string(),
                duration: self.config.read_timeout,
            })??;

        let mut raw = RawReadings::default();
        for (field, bytes) in results {
            raw.set(field, bytes);
        }
        Ok(raw)
    }

    /// Drop the connection, giving the transport at most `read_timeout` to
    /// close it cleanly.
    async fn close_connection(&self, link: &mut Link<T::Connection>) {
        let Some(connection) = link.connection.take() else {
            return;
        };
        self.connected.store(false, Ordering::SeqCst);

        match timeout(self.config.read_timeout, self.transport.disconnect(&connection)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("{}: Error while disconnecting: {}", self.config.name, e),
            Err(_) => debug!(
                "{}: Disconnect timed out after {:?}",
                self.config.name, self.config.read_timeout
            ),
        }
    }

    /// Swap in the merged snapshot in one step.
    fn commit(&self, update: &TelemetrySnapshot) -> Arc<TelemetrySnapshot> {
        let mut current = self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let merged = Arc::new(current.merged_with(update));
        *current = merged.clone();
        merged
    }
}
