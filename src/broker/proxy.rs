//! Typed proxies for remote plugin objects.
//!
//! A [`Proxy`] is an in-process stand-in for an implementation living in a
//! peer plugin process: every method forwards over an established channel and
//! marshals arguments and results through the [`Mapper`]. From the caller's
//! perspective a proxy behaves like a local implementation.
//!
//! The [`Transport`] and [`Channel`] traits are the seam to the RPC framework;
//! framing, retries, and timeouts are its concern, not this crate's. A dropped
//! connection surfaces as a transport failure on the next call through a stale
//! proxy.
//!
//! [`ProxyLoader::load`] dedupes through the process-wide cacher keyed by
//! `"{kind}+{address}"`: one proxy per remote address per process.

use std::sync::Arc;

use crate::cacher::Cacher;
use crate::error::{PlugwireError, Result};
use crate::funcspec::{FuncSpec, FuncSpecArgs};
use crate::mapper::{Mapper, Native};
use crate::wire::{ClientDescriptor, TypeTag};

use super::{connect, Address, Broker};

/// A live connection to a remote plugin object.
///
/// Implementations are provided by the RPC framework and treated as opaque.
pub trait Channel: Send + Sync {
    /// Fetch the declared contract for a remote operation.
    fn spec(&self, method: &str) -> Result<FuncSpec>;

    /// Invoke a remote operation with packed arguments.
    fn call(&self, method: &str, args: FuncSpecArgs) -> Result<FuncSpecArgs>;
}

/// Opens channels to resolved addresses.
pub trait Transport: Send + Sync {
    /// Open a channel to the given address.
    fn open(&self, address: &Address) -> Result<Arc<dyn Channel>>;
}

/// The kind of remote object a proxy stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    /// Guest OS implementation.
    Guest,
    /// Host OS implementation.
    Host,
    /// Synced-folder implementation.
    SyncedFolder,
    /// Provisioner implementation.
    Provisioner,
    /// Communicator implementation.
    Communicator,
    /// Provider implementation.
    Provider,
    /// Target machine.
    Machine,
    /// Remote plugin manager.
    PluginManager,
}

impl ProxyKind {
    /// Stable name used in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyKind::Guest => "guest",
            ProxyKind::Host => "host",
            ProxyKind::SyncedFolder => "synced_folder",
            ProxyKind::Provisioner => "provisioner",
            ProxyKind::Communicator => "communicator",
            ProxyKind::Provider => "provider",
            ProxyKind::Machine => "machine",
            ProxyKind::PluginManager => "plugin_manager",
        }
    }
}

impl std::fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An in-process stand-in forwarding calls to a remote implementation.
pub struct Proxy {
    kind: ProxyKind,
    address: Address,
    channel: Arc<dyn Channel>,
    mapper: Mapper,
}

impl Proxy {
    /// The kind of remote object this proxy fronts.
    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    /// The remote address this proxy is connected to.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Cache key deduping proxies: one per kind and address.
    pub fn cache_key(kind: ProxyKind, address: &Address) -> String {
        format!("{kind}+{address}")
    }

    /// Ask the remote side whether it implements a named capability.
    ///
    /// Lookup only; never invokes the capability.
    pub fn has_capability(&self, name: &str) -> Result<bool> {
        let arg = self.mapper.pack(&Native::Symbol(name.to_string()), "")?;
        let resp = self
            .channel
            .call("has_capability", FuncSpecArgs::new(vec![arg]))?;
        match self.mapper.funcspec_map_one(&resp, TypeTag::Bool)? {
            Native::Bool(b) => Ok(b),
            other => Err(PlugwireError::Conversion(format!(
                "has_capability returned non-bool value `{other:?}'"
            ))),
        }
    }

    /// Invoke a remote capability.
    ///
    /// Fetches the remote side's declared contract, satisfies it from the
    /// given native arguments, forwards the call, and unpacks the first
    /// result value (Null when the capability returns nothing).
    pub fn capability(&self, name: &str, args: &[Native]) -> Result<Native> {
        let spec = self.channel.spec(name)?;
        tracing::trace!(proxy = %self.kind, capability = %name, "forwarding capability call");
        let wire_args = self.mapper.generate_funcspec_args(&spec, args, None)?;
        let resp = self.channel.call(name, wire_args)?;
        match resp.args.first() {
            Some(value) => self.mapper.unpack(value),
            None => Ok(Native::Null),
        }
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("kind", &self.kind)
            .field("address", &self.address)
            .finish()
    }
}

/// Builds and dedupes proxies for client descriptors.
pub struct ProxyLoader {
    broker: Arc<Broker>,
    transport: Arc<dyn Transport>,
    cacher: Arc<Cacher<Arc<Proxy>>>,
    mapper: Mapper,
}

impl ProxyLoader {
    /// Create a loader over the given broker, transport, cache, and mapper.
    pub fn new(
        broker: Arc<Broker>,
        transport: Arc<dyn Transport>,
        cacher: Arc<Cacher<Arc<Proxy>>>,
        mapper: Mapper,
    ) -> Self {
        Self {
            broker,
            transport,
            cacher,
            mapper,
        }
    }

    /// The broker this loader resolves stream descriptors through.
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Load a proxy for a descriptor, reusing a cached instance when one
    /// exists for the same kind and address.
    pub fn load(&self, descriptor: &ClientDescriptor, kind: ProxyKind) -> Result<Arc<Proxy>> {
        let address = connect(descriptor, &self.broker)?;
        let key = Proxy::cache_key(kind, &address);
        self.cacher.get_or_create(&key, || {
            tracing::debug!(%kind, %address, "constructing new proxy");
            let channel = self.transport.open(&address)?;
            Ok(Arc::new(Proxy {
                kind,
                address: address.clone(),
                channel,
                mapper: self.mapper.clone(),
            }))
        })
    }

    /// Load a proxy from a raw wire descriptor.
    pub fn load_raw(&self, raw: &[u8], kind: ProxyKind) -> Result<Arc<Proxy>> {
        let descriptor = ClientDescriptor::from_wire(raw)?;
        self.load(&descriptor, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Channel that answers from a canned table and records calls.
    struct ScriptedChannel {
        calls: Mutex<Vec<String>>,
    }

    impl Channel for ScriptedChannel {
        fn spec(&self, method: &str) -> Result<FuncSpec> {
            Ok(FuncSpec::build(method)
                .arg(TypeTag::Symbol)
                .result(TypeTag::Bool)
                .finish())
        }

        fn call(&self, method: &str, _args: FuncSpecArgs) -> Result<FuncSpecArgs> {
            self.calls.lock().push(method.to_string());
            let mapper = Mapper::new();
            Ok(FuncSpecArgs::new(vec![
                mapper.pack(&Native::Bool(true), "")?
            ]))
        }
    }

    struct ScriptedTransport {
        opens: AtomicUsize,
    }

    impl Transport for ScriptedTransport {
        fn open(&self, _address: &Address) -> Result<Arc<dyn Channel>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ScriptedChannel {
                calls: Mutex::new(Vec::new()),
            }))
        }
    }

    fn loader() -> (ProxyLoader, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport {
            opens: AtomicUsize::new(0),
        });
        let loader = ProxyLoader::new(
            Arc::new(Broker::new()),
            transport.clone(),
            Arc::new(Cacher::new()),
            Mapper::new(),
        );
        (loader, transport)
    }

    fn guest_descriptor() -> ClientDescriptor {
        ClientDescriptor::Target {
            addr: "/run/plug/guest.sock".to_string(),
        }
    }

    #[test]
    fn test_load_dedupes_by_kind_and_address() {
        let (loader, transport) = loader();

        let a = loader.load(&guest_descriptor(), ProxyKind::Guest).unwrap();
        let b = loader.load(&guest_descriptor(), ProxyKind::Guest).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_different_kinds_get_distinct_proxies() {
        let (loader, transport) = loader();

        let guest = loader.load(&guest_descriptor(), ProxyKind::Guest).unwrap();
        let host = loader.load(&guest_descriptor(), ProxyKind::Host).unwrap();

        assert!(!Arc::ptr_eq(&guest, &host));
        assert_eq!(transport.opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_load_raw_decodes_descriptor() {
        let (loader, _) = loader();
        let raw = guest_descriptor().to_wire().unwrap();

        let proxy = loader.load_raw(&raw, ProxyKind::Guest).unwrap();
        assert_eq!(proxy.kind(), ProxyKind::Guest);
        assert_eq!(
            proxy.address().to_string(),
            "unix:/run/plug/guest.sock"
        );
    }

    #[test]
    fn test_has_capability_forwards_once() {
        let (loader, _) = loader();
        let proxy = loader.load(&guest_descriptor(), ProxyKind::Guest).unwrap();

        assert!(proxy.has_capability("mount_shared_folder").unwrap());
    }

    #[test]
    fn test_cache_key_format() {
        let addr = Address::Unix("/run/plug/g.sock".into());
        assert_eq!(
            Proxy::cache_key(ProxyKind::Guest, &addr),
            "guest+unix:/run/plug/g.sock"
        );
    }
}
