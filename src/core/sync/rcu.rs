/*!
 * Read-Copy-Update (RCU) Pattern
 * Zero-contention reads for read-mostly state such as rule and CCD maps
 */

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;

/// RCU-protected value with zero-contention reads
///
/// Readers take an `Arc` snapshot and never observe a partially-updated
/// value. Writers are serialized, build a full replacement from the current
/// value, and swap it in wholesale.
///
/// # Example
///
/// ```ignore
/// let rules = RcuCell::new(HashMap::new());
///
/// // Read (lock-free)
/// let matched = rules.load().contains_key("game");
///
/// // Fallible write: persist first, swap only on success
/// rules.try_update(|current| {
///     let mut next = current.clone();
///     next.insert("game".to_string(), rule);
///     store.save(&next)?;
///     Ok::<_, StoreError>(next)
/// })?;
/// ```
pub struct RcuCell<T> {
    inner: Arc<ArcSwap<T>>,
    writer: Arc<Mutex<()>>,
}

impl<T> RcuCell<T> {
    /// Create new RCU cell
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(value)),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Load current value (zero-contention)
    #[inline(always)]
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Replace value entirely
    #[inline]
    pub fn store(&self, new_value: T) {
        let _guard = self.writer.lock();
        self.inner.store(Arc::new(new_value));
    }

    /// Clone-modify-swap under the writer lock
    pub fn update<F>(&self, f: F) -> Arc<T>
    where
        F: FnOnce(&T) -> T,
    {
        let _guard = self.writer.lock();
        let next = Arc::new(f(&self.inner.load()));
        self.inner.store(Arc::clone(&next));
        next
    }

    /// Fallible clone-modify-swap
    ///
    /// The replacement is only published when `f` returns `Ok`; on error the
    /// current value stays visible to readers unchanged.
    pub fn try_update<F, E>(&self, f: F) -> Result<Arc<T>, E>
    where
        F: FnOnce(&T) -> Result<T, E>,
    {
        let _guard = self.writer.lock();
        let next = Arc::new(f(&self.inner.load())?);
        self.inner.store(Arc::clone(&next));
        Ok(next)
    }
}

impl<T> Clone for RcuCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<T: Default> Default for RcuCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RcuCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RcuCell").field(&*self.load()).finish()
    }
}
