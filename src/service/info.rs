//! Per-call identity and context propagation.
//!
//! Every inbound call carries metadata naming the plugin it targets.
//! [`ServiceCore::with_info`] validates it, builds a [`ServiceInfo`] scoped to
//! the call, and tears everything down on every exit path - normal return,
//! error, or panic. When the metadata also carries a plugin-manager
//! descriptor, a process-wide remote-manager fallback is activated through a
//! [`UsageTracker`]: connected by the first concurrent caller that asks for
//! it, torn down by the last one.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::broker::proxy::{Proxy, ProxyKind, ProxyLoader};
use crate::broker::Broker;
use crate::error::{PlugwireError, Result};
use crate::tracker::UsageTracker;
use crate::wire::{CallMetadata, ClientDescriptor};

use super::registry::{ComponentKind, PluginComponent, PluginRegistry};

/// Per-call identity: the plugin a call targets and the broker to reach its
/// process. Owned exclusively by the handling call, never shared.
pub struct ServiceInfo {
    /// Name of the plugin this call targets.
    pub plugin_name: String,
    /// Broker for resolving stream descriptors during this call.
    pub broker: Arc<Broker>,
}

/// Process-wide remote plugin-manager fallback.
///
/// The manager proxy is a global side effect: connected once while any caller
/// is active, dropped when the last caller finishes.
#[derive(Default)]
pub struct ManagerFallback {
    tracker: UsageTracker,
    current: Mutex<Option<Arc<Proxy>>>,
}

impl ManagerFallback {
    /// Create an inactive fallback.
    pub fn new() -> Self {
        Self::default()
    }

    /// The connected manager proxy, if the fallback is active.
    pub fn manager(&self) -> Option<Arc<Proxy>> {
        self.current.lock().clone()
    }

    fn activate(&self, descriptor: &ClientDescriptor, loader: &ProxyLoader) -> Result<()> {
        self.tracker.activate(|| {
            let proxy = loader.load(descriptor, ProxyKind::PluginManager)?;
            tracing::debug!(address = %proxy.address(), "activated plugin-manager fallback");
            *self.current.lock() = Some(proxy);
            Ok(())
        })?;
        Ok(())
    }

    fn deactivate(&self) {
        let result = self.tracker.deactivate(|| {
            tracing::debug!("tearing down plugin-manager fallback");
            *self.current.lock() = None;
            Ok(())
        });
        if let Err(err) = result {
            tracing::error!(%err, "plugin-manager fallback teardown failed");
        }
    }
}

/// Deactivates the fallback on every exit path, including panics.
struct FallbackGuard<'a> {
    fallback: &'a ManagerFallback,
}

impl Drop for FallbackGuard<'_> {
    fn drop(&mut self) {
        self.fallback.deactivate();
    }
}

/// Shared state the service layer threads through every call.
///
/// Built once at startup: registries are written then, read afterwards.
pub struct ServiceCore {
    loader: Arc<ProxyLoader>,
    plugins: Arc<PluginRegistry>,
    fallback: ManagerFallback,
}

impl ServiceCore {
    /// Assemble the service core.
    pub fn new(loader: Arc<ProxyLoader>, plugins: Arc<PluginRegistry>) -> Self {
        Self {
            loader,
            plugins,
            fallback: ManagerFallback::new(),
        }
    }

    /// The proxy loader shared by handlers.
    pub fn loader(&self) -> &Arc<ProxyLoader> {
        &self.loader
    }

    /// The plugin-manager fallback, for handlers needing the remote manager.
    pub fn fallback(&self) -> &ManagerFallback {
        &self.fallback
    }

    /// Run `f` with a [`ServiceInfo`] built from call metadata.
    ///
    /// Requires `plugin_name` in the metadata, failing with Missing-metadata
    /// otherwise. If the metadata carries a plugin-manager descriptor the
    /// process-wide fallback is activated first; it is deactivated on every
    /// exit path, tearing down only when the last concurrent user leaves.
    pub fn with_info<R, F>(&self, metadata: &CallMetadata, f: F) -> Result<R>
    where
        F: FnOnce(&ServiceInfo) -> Result<R>,
    {
        let plugin_name = metadata.require_plugin_name()?.to_string();

        let _guard = match &metadata.plugin_manager {
            Some(descriptor) => {
                self.fallback.activate(descriptor, &self.loader)?;
                Some(FallbackGuard {
                    fallback: &self.fallback,
                })
            }
            None => None,
        };

        let info = ServiceInfo {
            plugin_name,
            broker: self.loader.broker().clone(),
        };
        tracing::trace!(plugin = %info.plugin_name, "entering call scope");
        f(&info)
    }

    /// As [`ServiceCore::with_info`], additionally resolving the component
    /// registered under the caller's plugin name for one of `kinds`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the plugin registered no component of the
    /// requested kinds.
    pub fn with_plugin<R, F>(
        &self,
        metadata: &CallMetadata,
        kinds: &[ComponentKind],
        f: F,
    ) -> Result<R>
    where
        F: FnOnce(&ServiceInfo, &Arc<dyn PluginComponent>) -> Result<R>,
    {
        self.with_info(metadata, |info| {
            let component = self
                .plugins
                .resolve(&info.plugin_name, kinds)
                .ok_or_else(|| {
                    PlugwireError::NotFound(format!(
                        "component of kinds {kinds:?} for plugin `{}'",
                        info.plugin_name
                    ))
                })?;
            f(info, &component)
        })
    }
}
