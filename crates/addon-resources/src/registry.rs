//! Resource registry lookup
//!
//! The registry is written by the provisioning layer and only read while
//! add-on configuration is composed.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::handle::ResourceHandle;

/// Lookup of previously provisioned resources by logical name.
pub trait ResourceRegistry: Send + Sync {
    /// Get the resource registered under `name`.
    fn get(&self, name: &str) -> Option<ResourceHandle>;

    /// Like [`get`](Self::get) but absent resources are an error.
    fn require(&self, name: &str) -> Result<ResourceHandle> {
        self.get(name).ok_or_else(|| Error::ResourceNotFound {
            name: name.to_string(),
        })
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl<T: ResourceRegistry + ?Sized> ResourceRegistry for Arc<T> {
    fn get(&self, name: &str) -> Option<ResourceHandle> {
        (**self).get(name)
    }
}

impl<T: ResourceRegistry + ?Sized> ResourceRegistry for &T {
    fn get(&self, name: &str) -> Option<ResourceHandle> {
        (**self).get(name)
    }
}

/// Registry backed by a map, filled up front.
///
/// # Example
///
/// ```
/// use addon_resources::{InMemoryRegistry, ResourceHandle, ResourceRegistry};
///
/// let mut registry = InMemoryRegistry::new();
/// registry.register(ResourceHandle::new("backstage-db", "rds-instance"));
/// assert!(registry.contains("backstage-db"));
/// assert!(registry.get("missing").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    handles: BTreeMap<String, ResourceHandle>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle under its own name, replacing any previous one.
    pub fn register(&mut self, handle: ResourceHandle) {
        tracing::debug!(resource = handle.name(), kind = handle.kind(), "Registering resource");
        self.handles.insert(handle.name().to_string(), handle);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, handle: ResourceHandle) -> Self {
        self.register(handle);
        self
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.handles.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl ResourceRegistry for InMemoryRegistry {
    fn get(&self, name: &str) -> Option<ResourceHandle> {
        self.handles.get(name).cloned()
    }
}

impl FromIterator<ResourceHandle> for InMemoryRegistry {
    fn from_iter<I: IntoIterator<Item = ResourceHandle>>(iter: I) -> Self {
        let mut registry = Self::new();
        for handle in iter {
            registry.register(handle);
        }
        registry
    }
}
