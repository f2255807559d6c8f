//! Plugin component registry.
//!
//! Maps plugin names to the components they registered, by kind. Built once
//! at startup by the host application, then shared read-only with the service
//! layer.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Category a plugin component belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Guest OS support.
    Guest,
    /// Host OS support.
    Host,
    /// Synced-folder support.
    SyncedFolder,
    /// Machine provider.
    Provider,
    /// Provisioner.
    Provisioner,
    /// Communicator.
    Communicator,
    /// Command.
    Command,
}

/// A concrete implementation a plugin registered for a component kind.
///
/// Callers downcast through [`PluginComponent::as_any`] to the concrete type
/// they expect for the kind.
pub trait PluginComponent: Send + Sync {
    /// The kind this component was registered for.
    fn kind(&self) -> ComponentKind;

    /// Downcast access to the concrete component.
    fn as_any(&self) -> &dyn Any;
}

/// Registry of plugin components: plugin name to kind to implementation.
#[derive(Default)]
pub struct PluginRegistry {
    components: HashMap<String, HashMap<ComponentKind, Arc<dyn PluginComponent>>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component under a plugin name. Replaces any prior
    /// registration for the same kind.
    pub fn register(&mut self, plugin_name: impl Into<String>, component: Arc<dyn PluginComponent>) {
        self.components
            .entry(plugin_name.into())
            .or_default()
            .insert(component.kind(), component);
    }

    /// Resolve the component registered under `plugin_name` for the first of
    /// `kinds` that has one.
    pub fn resolve(
        &self,
        plugin_name: &str,
        kinds: &[ComponentKind],
    ) -> Option<Arc<dyn PluginComponent>> {
        let by_kind = self.components.get(plugin_name)?;
        kinds.iter().find_map(|kind| by_kind.get(kind).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubComponent(ComponentKind);

    impl PluginComponent for StubComponent {
        fn kind(&self) -> ComponentKind {
            self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_resolve_by_kind_preference() {
        let mut registry = PluginRegistry::new();
        registry.register("docker", Arc::new(StubComponent(ComponentKind::Provider)));
        registry.register("docker", Arc::new(StubComponent(ComponentKind::Provisioner)));

        let got = registry
            .resolve("docker", &[ComponentKind::Guest, ComponentKind::Provisioner])
            .unwrap();
        assert_eq!(got.kind(), ComponentKind::Provisioner);
    }

    #[test]
    fn test_resolve_missing() {
        let registry = PluginRegistry::new();
        assert!(registry.resolve("nope", &[ComponentKind::Guest]).is_none());
    }
}
