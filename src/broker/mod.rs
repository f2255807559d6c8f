//! Connection establishment and stream multiplexing.
//!
//! The [`Broker`] tracks connection information for logical stream ids pushed
//! by the peer process. [`Broker::dial`] hands the address back, blocking for
//! a bounded time when the registration has not arrived yet - stream info
//! routinely trails the call that needs it.
//!
//! [`connect`] resolves a [`ClientDescriptor`] to an [`Address`]: a direct
//! target address is used as-is (filesystem-path style for local transports,
//! host:port style otherwise); a stream descriptor goes through the broker.

pub mod proxy;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::error::{PlugwireError, Result};
use crate::wire::ClientDescriptor;

/// Default maximum wait for stream connection information.
pub const DEFAULT_STREAM_WAIT: Duration = Duration::from_secs(5);

/// Network kind a stream registration was announced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Local socket transport.
    Unix,
    /// TCP transport.
    Tcp,
}

/// Connection information registered for a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Network kind.
    pub network: Network,
    /// Address on that network.
    pub address: String,
}

impl ConnectionInfo {
    /// The resolved transport address.
    pub fn to_address(&self) -> Address {
        match self.network {
            Network::Unix => Address::Unix(PathBuf::from(&self.address)),
            Network::Tcp => Address::Tcp(self.address.clone()),
        }
    }
}

impl std::fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.network {
            Network::Unix => write!(f, "unix:{}", self.address),
            Network::Tcp => f.write_str(&self.address),
        }
    }
}

/// A resolved transport address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// Filesystem socket path.
    Unix(PathBuf),
    /// host:port endpoint.
    Tcp(String),
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Unix(path) => write!(f, "unix:{}", path.display()),
            Address::Tcp(addr) => f.write_str(addr),
        }
    }
}

/// Tracks connection information for broker-multiplexed streams.
pub struct Broker {
    streams: Mutex<HashMap<String, ConnectionInfo>>,
    arrived: Condvar,
    wait_timeout: Duration,
}

impl Broker {
    /// Broker with the default stream wait timeout.
    pub fn new() -> Self {
        Self::with_wait_timeout(DEFAULT_STREAM_WAIT)
    }

    /// Broker with a custom stream wait timeout.
    pub fn with_wait_timeout(wait_timeout: Duration) -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            arrived: Condvar::new(),
            wait_timeout,
        }
    }

    /// Register connection information for a stream, waking any dial waiting
    /// on it.
    pub fn register(&self, stream_id: impl Into<String>, info: ConnectionInfo) {
        let stream_id = stream_id.into();
        tracing::debug!(stream = %stream_id, conn = %info, "registering stream connection info");
        self.streams.lock().insert(stream_id, info);
        self.arrived.notify_all();
    }

    /// Get connection information for a stream.
    ///
    /// Blocks until the registration arrives, up to the configured wait.
    ///
    /// # Errors
    ///
    /// Returns `StreamTimeout` if no registration arrives in time.
    pub fn dial(&self, stream_id: &str) -> Result<ConnectionInfo> {
        let deadline = Instant::now() + self.wait_timeout;
        let mut streams = self.streams.lock();
        loop {
            if let Some(info) = streams.get(stream_id) {
                return Ok(info.clone());
            }
            let timed_out = self
                .arrived
                .wait_until(&mut streams, deadline)
                .timed_out();
            if timed_out && !streams.contains_key(stream_id) {
                return Err(PlugwireError::StreamTimeout(stream_id.to_string()));
            }
        }
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a client descriptor to a transport address.
///
/// A `Target` descriptor resolves directly: addresses beginning with a path
/// separator or a `unix:` prefix are local socket paths, anything else is
/// host:port style. A `Stream` descriptor resolves through the broker.
pub fn connect(descriptor: &ClientDescriptor, broker: &Broker) -> Result<Address> {
    match descriptor {
        ClientDescriptor::Target { addr } => {
            if let Some(path) = addr.strip_prefix("unix:") {
                Ok(Address::Unix(PathBuf::from(path)))
            } else if addr.starts_with('/') {
                Ok(Address::Unix(PathBuf::from(addr)))
            } else {
                Ok(Address::Tcp(addr.clone()))
            }
        }
        ClientDescriptor::Stream { id } => Ok(broker.dial(id)?.to_address()),
    }
}
