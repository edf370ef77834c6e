use crate::Id;
use portable_atomic::{AtomicI64, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Identifiers cannot be zero, so every fresh or rewound counter starts here.
const FIRST_ID: i64 = 1;

/// A lock-free, in-process sequential allocator.
///
/// Hands out `1, 2, 3, ...` from a single [`AtomicI64`]. Identifiers from this
/// allocator are only unique within the lifetime of the counter, so it must
/// only be used where nothing relies on global uniqueness: unit tests and
/// pipeline workers whose entities are never persisted.
///
/// ## Features
///
/// - ✅ Thread-safe, never blocks
/// - ✅ Concurrent callers starting from `k` receive exactly `k..k + n`
/// - ❌ Globally unique
///
/// # Example
///
/// ```
/// use idalloc::LocalAllocator;
///
/// let allocator = LocalAllocator::new();
/// assert_eq!(allocator.allocate().get(), 1);
/// assert_eq!(allocator.allocate().get(), 2);
///
/// allocator.reset();
/// assert_eq!(allocator.allocate().get(), 1);
/// ```
#[derive(Debug)]
pub struct LocalAllocator {
    next: AtomicI64,
}

impl LocalAllocator {
    /// Creates a counter whose first identifier is `1`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicI64::new(FIRST_ID),
        }
    }

    /// Returns the next identifier and advances the counter.
    ///
    /// The read-modify-write is a single `fetch_add`, so no two callers can
    /// observe the same value and no value is skipped.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn allocate(&self) -> Id {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        debug_assert!(raw >= FIRST_ID, "self-allocated id space exhausted");
        match Id::new(raw) {
            Some(id) => id,
            // Reaching zero takes 2^64 allocations without a reset.
            None => unreachable!("self-allocated counter wrapped around to zero"),
        }
    }

    /// Rewinds the counter so the next identifier is `1`.
    ///
    /// This is unconditional. Callers that need the environment guard go
    /// through [`IdService::reset_self_allocated_id`].
    ///
    /// [`IdService::reset_self_allocated_id`]: crate::IdService::reset_self_allocated_id
    pub fn reset(&self) {
        self.next.store(FIRST_ID, Ordering::Relaxed);
    }

    /// Returns the value the next [`Self::allocate`] would hand out, without
    /// consuming it.
    #[must_use]
    pub fn peek(&self) -> i64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for LocalAllocator {
    fn default() -> Self {
        Self::new()
    }
}
