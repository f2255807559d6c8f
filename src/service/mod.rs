//! Service layer: per-call context, capability dispatch, and the outer
//! exception guard.
//!
//! Handlers are invoked by the external RPC framework on its worker-thread
//! pool. Each inbound call flows: metadata validation ([`ServiceCore::with_info`])
//! to argument decoding (Mapper/FuncSpec) to domain dispatch
//! ([`CapabilityPlatform`]) to result encoding, with
//! [`exception::guard`] around the whole handler guaranteeing the uniform
//! wire-error shape on any failure.
//!
//! Registries are explicit objects built at startup and owned here: single
//! writer during setup, many readers afterwards. Call state is passed as an
//! explicit [`ServiceInfo`] argument; there are no thread-locals.

pub mod exception;
mod info;
mod platform;
mod registry;

pub use info::{ManagerFallback, ServiceCore, ServiceInfo};
pub use platform::{
    dispatch_capability, BoundCapabilities, CapabilityManifest, CapabilityPlatform,
    CapabilityRegistry, CapabilitySource,
};
pub use registry::{ComponentKind, PluginComponent, PluginRegistry};
