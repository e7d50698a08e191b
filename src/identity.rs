//! Raw marketplace id → SKU resolution.
//!
//! The marketplace assigns every product card a numeric id; the catalog
//! team keys everything else (history, reports, charts) on internal SKU
//! codes. The mapping is configuration data loaded once at startup.

use std::collections::HashMap;

/// Static mapping from raw marketplace ids to internal SKU codes.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    map: HashMap<u64, String>,
}

impl IdentityMap {
    pub fn new(map: HashMap<u64, String>) -> Self {
        Self { map }
    }

    /// Resolve a raw marketplace id to a SKU.
    ///
    /// Total: ids absent from the map resolve to their decimal string
    /// form, so every observation always carries a non-empty SKU.
    pub fn resolve(&self, raw_id: u64) -> String {
        match self.map.get(&raw_id) {
            Some(sku) => sku.clone(),
            None => raw_id.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
