//! Single-entry cache of the last decode plan.

use tracing::trace;

use crate::error::Error;
use crate::plan::DecodePlan;

/// Erasure pattern plus the valid-index set it was derived against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub erased: Vec<usize>,
    pub valid: Vec<usize>,
}

/// Holds the most recently derived plan and rebuilds it whenever the key
/// changes. Owned by a decoder and guarded by `&mut` access.
#[derive(Debug, Default)]
pub struct DecodeCache {
    entry: Option<(CacheKey, DecodePlan)>,
    builds: u64,
    hits: u64,
}

impl DecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan for `key`, reusing the cached one when the key matches.
    ///
    /// A failed build leaves the cache empty.
    ///
    /// # Errors
    /// Propagates the error from `build`.
    pub fn plan<F>(&mut self, key: CacheKey, build: F) -> Result<&DecodePlan, Error>
    where
        F: FnOnce(&CacheKey) -> Result<DecodePlan, Error>,
    {
        let entry = match self.entry.take() {
            Some(entry) if entry.0 == key => {
                self.hits += 1;
                trace!(erased = ?key.erased, "decode plan cache hit");
                entry
            }
            _ => {
                let plan = build(&key)?;
                self.builds += 1;
                (key, plan)
            }
        };
        Ok(&self.entry.insert(entry).1)
    }

    /// Number of plans derived so far.
    pub fn builds(&self) -> u64 {
        self.builds
    }

    /// Number of lookups served from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn key(&self) -> Option<&CacheKey> {
        self.entry.as_ref().map(|(key, _)| key)
    }

    /// The plan the next matching lookup will reuse.
    pub fn cached(&self) -> Option<&DecodePlan> {
        self.entry.as_ref().map(|(_, plan)| plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct;

    fn key(erased: &[usize], valid: &[usize]) -> CacheKey {
        CacheKey {
            erased: erased.to_vec(),
            valid: valid.to_vec(),
        }
    }

    #[test]
    fn test_hit_and_rebuild() {
        let g = construct::cauchy_matrix(6, 4).unwrap();
        let build = |k: &CacheKey| DecodePlan::from_generator(&g, &k.erased, &k.valid);
        let mut cache = DecodeCache::new();

        cache.plan(key(&[0], &[1, 2, 3, 4, 5]), build).unwrap();
        cache.plan(key(&[0], &[1, 2, 3, 4, 5]), build).unwrap();
        assert_eq!((cache.builds(), cache.hits()), (1, 1));

        // Same erasures, different valid set.
        let plan = cache.plan(key(&[0], &[1, 2, 3, 4]), build).unwrap();
        assert_eq!(plan.inputs, vec![1, 2, 3, 4]);
        assert_eq!(cache.builds(), 2);

        let plan = cache.plan(key(&[1], &[0, 2, 3, 4, 5]), build).unwrap();
        assert_eq!(plan.outputs, vec![1]);
        assert_eq!(cache.builds(), 3);

        cache.invalidate();
        assert!(cache.key().is_none());
    }

    #[test]
    fn test_failed_build_clears_entry() {
        let g = construct::cauchy_matrix(6, 4).unwrap();
        let build = |k: &CacheKey| DecodePlan::from_generator(&g, &k.erased, &k.valid);
        let mut cache = DecodeCache::new();
        cache.plan(key(&[0], &[1, 2, 3, 4, 5]), build).unwrap();
        assert!(cache.plan(key(&[0, 1], &[2, 3, 4]), build).is_err());
        assert!(cache.key().is_none());
        assert!(cache.plan(key(&[0], &[1, 2, 3, 4, 5]), build).is_ok());
    }
}
