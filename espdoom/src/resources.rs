//! Engine lump lookup.

use std::sync::Arc;

use hashbrown::HashMap;

/// Read-only access to the engine's resource cache.
pub trait ResourceLookup: Send + Sync {
    /// Full lump data by name, case-insensitively. `None` if absent.
    fn lump(&self, name: &str) -> Option<Arc<[u8]>>;
}

/// Lumps held in memory, keyed by upper-cased name.
#[derive(Debug, Default, Clone)]
pub struct LumpCache {
    lumps: HashMap<String, Arc<[u8]>>,
}

impl LumpCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a lump.
    pub fn insert(&mut self, name: &str, data: impl Into<Arc<[u8]>>) {
        self.lumps.insert(name.to_ascii_uppercase(), data.into());
    }

    pub fn len(&self) -> usize {
        self.lumps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lumps.is_empty()
    }
}

impl ResourceLookup for LumpCache {
    fn lump(&self, name: &str) -> Option<Arc<[u8]>> {
        self.lumps.get(&name.to_ascii_uppercase()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let mut cache = LumpCache::new();
        cache.insert("dspistol", vec![1u8, 2, 3]);
        assert_eq!(cache.lump("DSPISTOL").as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(cache.lump("DsPiStOl").as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(cache.lump("DSOOF").is_none());
        assert_eq!(cache.len(), 1);
    }
}
