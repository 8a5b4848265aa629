//! Registry for managing book catalog plugins.

use std::sync::Arc;

use super::{Source, SourceError};
use crate::config::Config;
use crate::models::SourceId;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const TITLE_SEARCH = 1 << 0;
        const AUTHOR_SEARCH = 1 << 1;
        const ISBN_LOOKUP = 1 << 2;
        const NATIVE_SORT = 1 << 3;
    }
}

/// Registry for all configured catalogs
///
/// Sources are kept in registration order so that iteration is
/// deterministic. Identifiers are unique; registering a source whose id is
/// already present replaces the earlier one in place.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration.
    ///
    /// Only catalogs compiled in and listed in `[sources] enabled` are
    /// registered. Rakuten is skipped when no application id is configured.
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let mut registry = Self::new();

        #[cfg(feature = "source-google_books")]
        if config.sources.is_enabled(&SourceId::GoogleBooks) {
            registry.register(Arc::new(super::GoogleBooksSource::new(config)?));
        }

        #[cfg(feature = "source-ndl")]
        if config.sources.is_enabled(&SourceId::Ndl) {
            registry.register(Arc::new(super::NdlSource::new(config)?));
        }

        #[cfg(feature = "source-rakuten")]
        if config.sources.is_enabled(&SourceId::Rakuten) {
            if config.api_keys.rakuten().is_some() {
                registry.register(Arc::new(super::RakutenSource::new(config)?));
            } else {
                tracing::info!(
                    "Rakuten Books disabled: set RAKUTEN_APPLICATION_ID to enable it"
                );
            }
        }

        for id in &config.sources.enabled {
            if !registry.has(id) && SourceId::from_id(id) != SourceId::Rakuten {
                tracing::warn!("Ignoring unknown or disabled source '{}'", id);
            }
        }

        tracing::debug!("Registered sources: {:?}", registry.ids().collect::<Vec<_>>());
        Ok(registry)
    }

    /// Register a new source
    pub fn register(&mut self, source: Arc<dyn Source>) {
        match self.sources.iter().position(|s| s.id() == source.id()) {
            Some(index) => self.sources[index] = source,
            None => self.sources.push(source),
        }
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        let wanted = SourceId::from_id(id);
        self.sources
            .iter()
            .find(|s| s.id() == id || s.source_id() == wanted)
    }

    /// Get a source by ID, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Source>, SourceError> {
        self.get(id)
            .ok_or_else(|| SourceError::InvalidRequest(format!("Source '{}' not found", id)))
    }

    /// Get all registered sources in registration order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    /// Get all source IDs
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    /// Sources arranged by `order`: listed ones first in that order, then
    /// any remaining sources in registration order
    pub fn ordered(&self, order: &[SourceId]) -> Vec<Arc<dyn Source>> {
        let mut result: Vec<Arc<dyn Source>> = Vec::with_capacity(self.sources.len());

        for wanted in order {
            if let Some(source) = self.sources.iter().find(|s| &s.source_id() == wanted) {
                if !result.iter().any(|r| r.id() == source.id()) {
                    result.push(Arc::clone(source));
                }
            }
        }

        for source in &self.sources {
            if !result.iter().any(|r| r.id() == source.id()) {
                result.push(Arc::clone(source));
            }
        }

        result
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
