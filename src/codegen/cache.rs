//! Memoized compiled modules
//!
//! The cache maps a [`ModuleKey`] to the module built for it. It is
//! append-only: entries are never evicted or replaced, so a module handed out
//! once stays valid for every later lookup of the same key.
//!
//! # Thread Safety
//!
//! Each key owns a slot with its own lock. The map lock is only held long
//! enough to find or create the slot; the build runs under the slot lock, so
//! concurrent resolutions of one key build it at most once while different
//! keys build in parallel.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use super::{BuildRequest, CodeGenerator, CompiledModule, Kernel, ModuleKey, NativeBackend};
use crate::error::Result;

type Slot = Arc<Mutex<Option<Arc<dyn CompiledModule>>>>;

/// Counters of a [`ModuleCache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Resolutions answered from the cache
    pub hits: u64,
    /// Resolutions that had to build
    pub misses: u64,
    /// Successful builds
    pub builds: u64,
    /// Modules stored
    pub entries: usize,
}

/// Lookup-or-build store of compiled modules
pub struct ModuleCache {
    generator: Arc<dyn CodeGenerator>,
    slots: Mutex<HashMap<ModuleKey, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
}

static GLOBAL: OnceLock<Arc<ModuleCache>> = OnceLock::new();

impl ModuleCache {
    /// Create an empty cache building with `generator`
    pub fn new(generator: Arc<dyn CodeGenerator>) -> Self {
        Self {
            generator,
            slots: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            builds: AtomicU64::new(0),
        }
    }

    /// Process-wide cache using the [`NativeBackend`]
    pub fn global() -> Arc<ModuleCache> {
        GLOBAL
            .get_or_init(|| Arc::new(ModuleCache::new(Arc::new(NativeBackend::new()))))
            .clone()
    }

    /// Name of the backend building modules
    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Return the module for `key`, building it on first use
    ///
    /// # Arguments
    ///
    /// * `key` - Cache key
    /// * `kernel` - Lowered assignment for kernel modules, `None` for
    ///   iteration-only modules
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the build fails. A failed build stores
    /// nothing and drops the key's slot, so a later resolution retries it.
    pub fn resolve(
        &self,
        key: &ModuleKey,
        kernel: Option<&Kernel>,
    ) -> Result<Arc<dyn CompiledModule>> {
        let slot = {
            let mut slots = self.slots.lock();
            slots.entry(key.clone()).or_default().clone()
        };

        let mut module = slot.lock();
        if let Some(module) = module.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(module.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        log::debug!("building module {key} with {}", self.generator.name());
        let built = match self.generator.build(&BuildRequest { key, kernel }) {
            Ok(built) => built,
            Err(e) => {
                drop(module);
                self.discard_empty_slot(key, &slot);
                return Err(e);
            }
        };
        self.builds.fetch_add(1, Ordering::Relaxed);
        *module = Some(built.clone());
        Ok(built)
    }

    /// Remove `slot` from the map if it is still empty and nobody else holds it
    ///
    /// Takes the map lock before the slot lock, the same order as `len`.
    fn discard_empty_slot(&self, key: &ModuleKey, slot: &Slot) {
        let mut slots = self.slots.lock();
        let ours = slots.get(key).is_some_and(|s| Arc::ptr_eq(s, slot));
        if ours && Arc::strong_count(slot) == 2 && slot.lock().is_none() {
            slots.remove(key);
        }
    }

    /// Module stored for `key`, without building
    pub fn get(&self, key: &ModuleKey) -> Option<Arc<dyn CompiledModule>> {
        let slot = self.slots.lock().get(key)?.clone();
        slot.lock().clone()
    }

    /// Number of stored modules
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.lock().is_some())
            .count()
    }

    /// Returns true if no module has been built yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl std::fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCache")
            .field("generator", &self.generator.name())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::IterateFn;
    use crate::dtype::DType;
    use crate::error::Error;
    use crate::format::Format;
    use crate::storage::TensorStorage;
    use std::ffi::c_void;
    use std::sync::atomic::AtomicUsize;

    unsafe extern "C" fn empty_iterate(_args: *mut *mut c_void) -> i32 {
        0
    }

    #[derive(Debug)]
    struct FakeModule {
        key: ModuleKey,
    }

    impl CompiledModule for FakeModule {
        fn key(&self) -> &ModuleKey {
            &self.key
        }

        fn source(&self) -> &str {
            "fake"
        }

        fn iterate_entry(&self) -> IterateFn {
            empty_iterate
        }

        fn assemble(&self, _: &mut TensorStorage, _: &[&TensorStorage]) -> Result<()> {
            Ok(())
        }

        fn compute(&self, _: &mut TensorStorage, _: &[&TensorStorage]) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingGenerator {
        builds: AtomicUsize,
        fail_first: bool,
    }

    impl CodeGenerator for CountingGenerator {
        fn name(&self) -> &str {
            "counting"
        }

        fn build(&self, request: &BuildRequest<'_>) -> Result<Arc<dyn CompiledModule>> {
            let n = self.builds.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(Error::Codegen("first build fails".into()));
            }
            Ok(Arc::new(FakeModule {
                key: request.key.clone(),
            }))
        }
    }

    fn key(dims: &[usize]) -> ModuleKey {
        ModuleKey::iteration(&Format::sparse(dims.len()), DType::F64, dims)
    }

    #[test]
    fn test_hit_returns_same_module() {
        let cache = ModuleCache::new(Arc::new(CountingGenerator::default()));
        let a = cache.resolve(&key(&[3, 3]), None).unwrap();
        let b = cache.resolve(&key(&[3, 3]), None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.builds, stats.entries), (1, 1, 1, 1));
    }

    #[test]
    fn test_shape_is_part_of_key() {
        let cache = ModuleCache::new(Arc::new(CountingGenerator::default()));
        let a = cache.resolve(&key(&[3, 3]), None).unwrap();
        let b = cache.resolve(&key(&[3, 4]), None).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_build_is_retried() {
        let generator = Arc::new(CountingGenerator {
            fail_first: true,
            ..Default::default()
        });
        let cache = ModuleCache::new(generator.clone());
        assert!(cache.resolve(&key(&[2]), None).is_err());
        assert!(cache.is_empty());
        assert!(cache.get(&key(&[2])).is_none());
        assert!(cache.slots.lock().is_empty());
        assert!(cache.resolve(&key(&[2]), None).is_ok());
        assert_eq!(cache.slots.lock().len(), 1);
        assert_eq!(generator.builds.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().builds, 1);
    }

    #[test]
    fn test_concurrent_resolve_builds_once() {
        let generator = Arc::new(CountingGenerator::default());
        let cache = Arc::new(ModuleCache::new(generator.clone()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.resolve(&key(&[16, 16]), None).unwrap())
            })
            .collect();
        let modules: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(generator.builds.load(Ordering::SeqCst), 1);
        assert!(modules.iter().all(|m| Arc::ptr_eq(m, &modules[0])));
    }
}
