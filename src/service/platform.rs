//! Capability dispatch.
//!
//! Capabilities are named, optional operations a plugin may implement for a
//! category; existence is queryable before invocation. Because parameter
//! lists cannot be discovered at call time in a compiled implementation,
//! every capability registers a [`CapabilityManifest`] declaring its
//! parameter names and types up front; [`CapabilityPlatform::capability_spec`]
//! derives the declared contract from it.
//!
//! At call time, the implicit leading machine parameter is reconstructed from
//! the wire arguments first, then each declared parameter is resolved from
//! the remaining arguments by name and then by first unconsumed type match.
//! An unsatisfied parameter is a Conversion error, never a silent nil.

use std::collections::HashMap;
use std::sync::Arc;

use crate::broker::proxy::Proxy;
use crate::domain::Machine;
use crate::error::{PlugwireError, Result};
use crate::funcspec::{FuncSpec, FuncSpecArgs, FuncSpecValue};
use crate::mapper::{ArgValue, Mapper, Native};
use crate::wire::TypeTag;

/// Invocable capability implementation: receives the resolved target machine
/// and the mapped additional arguments.
pub type CapabilityFn = dyn Fn(&Arc<Machine>, &[Native]) -> Result<Native> + Send + Sync;

/// Declared parameter contract for a capability.
///
/// Parameters exclude the implicit leading machine, which is always supplied.
#[derive(Clone)]
pub struct CapabilityManifest {
    /// Declared parameters: name and wire type, in order.
    pub params: Vec<(String, TypeTag)>,
    /// Declared result type.
    pub result: TypeTag,
}

struct CapabilityEntry {
    manifest: CapabilityManifest,
    implementation: Arc<CapabilityFn>,
}

/// Registry of capabilities: plugin name to capability name to entry.
///
/// Populated by the host application at startup; the platform only reads it.
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, HashMap<String, CapabilityEntry>>,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability implementation with its declared manifest.
    pub fn register<F>(
        &mut self,
        plugin_name: impl Into<String>,
        capability_name: impl Into<String>,
        manifest: CapabilityManifest,
        implementation: F,
    ) where
        F: Fn(&Arc<Machine>, &[Native]) -> Result<Native> + Send + Sync + 'static,
    {
        self.capabilities
            .entry(plugin_name.into())
            .or_default()
            .insert(
                capability_name.into(),
                CapabilityEntry {
                    manifest,
                    implementation: Arc::new(implementation),
                },
            );
    }

    fn lookup(&self, plugin_name: &str, capability_name: &str) -> Option<&CapabilityEntry> {
        self.capabilities.get(plugin_name)?.get(capability_name)
    }
}

/// Queryable capability surface shared by local dispatch and remote proxies.
///
/// A [`Proxy`] implements the same contract, so callers cannot tell a local
/// implementation from a remote one.
pub trait CapabilitySource: Send + Sync {
    /// Whether the named capability exists. Never invokes.
    fn has_capability(&self, name: &str) -> Result<bool>;

    /// Invoke the named capability with native arguments.
    fn capability(&self, name: &str, args: &[Native]) -> Result<Native>;
}

impl CapabilitySource for Proxy {
    fn has_capability(&self, name: &str) -> Result<bool> {
        Proxy::has_capability(self, name)
    }

    fn capability(&self, name: &str, args: &[Native]) -> Result<Native> {
        Proxy::capability(self, name, args)
    }
}

/// Dispatch a capability through any source.
///
/// Checks existence first and fails with `NotFound` before invoking, so an
/// absent capability behaves the same on a local binding and a remote proxy.
pub fn dispatch_capability(
    source: &dyn CapabilitySource,
    name: &str,
    args: &[Native],
) -> Result<Native> {
    if !source.has_capability(name)? {
        return Err(PlugwireError::NotFound(format!("capability `{name}'")));
    }
    source.capability(name, args)
}

/// A local plugin's capabilities bound to one target machine.
///
/// Implements the same [`CapabilitySource`] contract a remote [`Proxy`] does,
/// supplying the implicit machine argument on every call.
pub struct BoundCapabilities {
    platform: Arc<CapabilityPlatform>,
    plugin_name: String,
    machine: Arc<Machine>,
}

impl CapabilitySource for BoundCapabilities {
    fn has_capability(&self, name: &str) -> Result<bool> {
        Ok(self.platform.has_capability(&self.plugin_name, name))
    }

    fn capability(&self, name: &str, args: &[Native]) -> Result<Native> {
        let mut wire = Vec::with_capacity(args.len() + 1);
        wire.push(
            self.platform
                .mapper
                .pack(&Native::Machine(self.machine.clone()), "")?,
        );
        for arg in args {
            wire.push(self.platform.mapper.pack(arg, "")?);
        }
        self.platform
            .capability(&self.plugin_name, name, &FuncSpecArgs::new(wire))
    }
}

/// Dispatches capability calls against the registry.
pub struct CapabilityPlatform {
    registry: Arc<CapabilityRegistry>,
    mapper: Mapper,
}

impl CapabilityPlatform {
    /// Platform over a populated registry and mapper.
    pub fn new(registry: Arc<CapabilityRegistry>, mapper: Mapper) -> Self {
        Self { registry, mapper }
    }

    /// Bind this platform to one plugin and target machine, producing a
    /// [`CapabilitySource`] interchangeable with a remote proxy.
    pub fn bind(
        self: &Arc<Self>,
        plugin_name: impl Into<String>,
        machine: Arc<Machine>,
    ) -> BoundCapabilities {
        BoundCapabilities {
            platform: self.clone(),
            plugin_name: plugin_name.into(),
            machine,
        }
    }

    /// Whether a capability is registered. Lookup only, never invokes.
    pub fn has_capability(&self, plugin_name: &str, capability_name: &str) -> bool {
        self.registry.lookup(plugin_name, capability_name).is_some()
    }

    /// The declared contract for a capability, derived from its manifest.
    ///
    /// The implicit leading machine parameter is excluded: it is always
    /// supplied by the platform.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the capability is not registered.
    pub fn capability_spec(&self, plugin_name: &str, capability_name: &str) -> Result<FuncSpec> {
        let entry = self.require(plugin_name, capability_name)?;
        Ok(FuncSpec {
            name: capability_name.to_string(),
            args: entry
                .manifest
                .params
                .iter()
                .map(|(name, tag)| FuncSpecValue::named(name.clone(), *tag))
                .collect(),
            named: entry
                .manifest
                .params
                .iter()
                .map(|(name, tag)| (name.clone(), tag.as_str().to_string()))
                .collect(),
            result: vec![FuncSpecValue::positional(entry.manifest.result)],
        })
    }

    /// Invoke a capability with wire arguments.
    ///
    /// Reconstructs the target machine (and its owning project) from the wire
    /// arguments, resolves each declared parameter by name then type, invokes
    /// the implementation exactly once, and returns its native result for the
    /// caller to re-encode.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unregistered capability, `Conversion` when
    /// the machine or a declared parameter cannot be satisfied.
    pub fn capability(
        &self,
        plugin_name: &str,
        capability_name: &str,
        wire_args: &FuncSpecArgs,
    ) -> Result<Native> {
        let entry = self.require(plugin_name, capability_name)?;

        let machine = match self.mapper.funcspec_map_one(wire_args, TypeTag::Machine)? {
            Native::Machine(machine) => machine,
            other => {
                return Err(PlugwireError::Conversion(format!(
                    "expected target machine argument, mapped `{other:?}'"
                )))
            }
        };

        let pool = self.argument_pool(wire_args)?;
        let mut params = Vec::with_capacity(entry.manifest.params.len());
        for (name, tag) in &entry.manifest.params {
            let named = if name.is_empty() {
                None
            } else {
                Some(name.as_str())
            };
            let value = self.mapper.map(&pool, *tag, named).map_err(|err| {
                PlugwireError::Conversion(format!(
                    "capability `{plugin_name}/{capability_name}' parameter `{name}': {err}"
                ))
            })?;
            params.push(value);
        }

        tracing::debug!(
            plugin = %plugin_name,
            capability = %capability_name,
            machine = %machine.resource_id,
            "invoking capability"
        );
        (entry.implementation)(&machine, &params)
    }

    /// Unpack wire arguments into a mapping pool, keeping names and filtering
    /// unknown tags explicitly.
    fn argument_pool(&self, wire_args: &FuncSpecArgs) -> Result<Vec<ArgValue>> {
        let mut pool = Vec::with_capacity(wire_args.args.len());
        for value in &wire_args.args {
            if value.tag().is_err() {
                tracing::warn!(
                    type_tag = %value.type_tag,
                    "filtering capability argument with unknown type tag"
                );
                continue;
            }
            // The machine descriptor stays in the pool: a Project parameter
            // may still be derived from it.
            let native = self.mapper.unpack(value)?;
            pool.push(if value.name.is_empty() {
                ArgValue::positional(native)
            } else {
                ArgValue::named(value.name.clone(), native)
            });
        }
        Ok(pool)
    }

    fn require(&self, plugin_name: &str, capability_name: &str) -> Result<&CapabilityEntry> {
        self.registry
            .lookup(plugin_name, capability_name)
            .ok_or_else(|| {
                PlugwireError::NotFound(format!(
                    "capability `{capability_name}' for plugin `{plugin_name}'"
                ))
            })
    }
}
