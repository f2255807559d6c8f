//! # plugwire
//!
//! Host-side bridge between a plugin host and out-of-process plugins.
//!
//! Plugins run as separate processes and expose their components over RPC.
//! This crate provides the marshaling and brokering layer the host uses to
//! call them as if they were local:
//!
//! - **Wire layer**: type-tagged MessagePack values, the stable wire-error
//!   shape, and the call metadata envelope
//! - **Mapper**: converts between native values and tagged wire values, and
//!   satisfies declared calling contracts ([`FuncSpec`]) from argument pools
//! - **Broker & proxies**: resolves client descriptors to addresses and
//!   builds deduped in-process proxies for remote plugin objects
//! - **Service layer**: per-call context, capability dispatch against
//!   registered manifests, and the exception guard that converts every
//!   failure into the wire-error shape
//!
//! The RPC framework itself (framing, listeners, retries) lives outside this
//! crate, behind the [`broker::proxy::Transport`] and
//! [`broker::proxy::Channel`] seams.
//!
//! ## Example
//!
//! ```ignore
//! use plugwire::{CallMetadata, ComponentKind, ServiceCore};
//!
//! fn handle(core: &ServiceCore, meta: &CallMetadata) -> Result<(), plugwire::WireError> {
//!     plugwire::service::exception::guard(|| {
//!         core.with_plugin(meta, &[ComponentKind::Guest], |info, component| {
//!             // decode arguments, dispatch, encode results
//!             Ok(())
//!         })
//!     })
//! }
//! ```

pub mod broker;
pub mod cacher;
pub mod domain;
pub mod error;
pub mod funcspec;
pub mod mapper;
pub mod service;
pub mod tracker;
pub mod wire;

pub use broker::proxy::{Proxy, ProxyKind, ProxyLoader};
pub use broker::Broker;
pub use cacher::Cacher;
pub use domain::{DomainResolver, Machine, Project};
pub use error::{PlugwireError, Result};
pub use funcspec::{FuncSpec, FuncSpecArgs, FuncSpecValue};
pub use mapper::{ArgValue, Mapper, Native, Seeds};
pub use service::{
    CapabilityManifest, CapabilityPlatform, CapabilityRegistry, ComponentKind, PluginRegistry,
    ServiceCore, ServiceInfo,
};
pub use tracker::UsageTracker;
pub use wire::{CallMetadata, ClientDescriptor, StatusCode, TypeTag, Value, WireError};
