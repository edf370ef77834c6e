use crate::{AllocationAuthority, Error, Result};
use core::future::Future;
use parking_lot::Mutex;
use std::collections::HashMap;

/// An in-process [`AllocationAuthority`].
///
/// Keeps one counter per `kind`, each starting at `1`, and hands out
/// contiguous ranges from it. Uniqueness holds for the lifetime of the value,
/// which makes it a stand-in for the real authority in development setups and
/// tests that exercise the remote path.
#[derive(Debug, Default)]
pub struct MemoryAuthority {
    pools: Mutex<HashMap<String, i64>>,
}

impl MemoryAuthority {
    /// Largest `count` a single [`Self::reserve`] accepts.
    pub const MAX_IDS_PER_REQUEST: u32 = 10_000;

    /// Creates an authority with no pools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `count` consecutive identifiers from `kind`.
    ///
    /// # Errors
    ///
    /// [`Error::AllocationUnavailable`] when `count` exceeds
    /// [`Self::MAX_IDS_PER_REQUEST`] or once the pool's `i64` space is spent.
    /// Nothing is reserved in either case.
    pub fn reserve(&self, kind: &str, count: u32) -> Result<Vec<i64>> {
        if count > Self::MAX_IDS_PER_REQUEST {
            return Err(Error::unavailable(format!(
                "requested {count} identifiers from `{kind}`, at most {} per request",
                Self::MAX_IDS_PER_REQUEST
            )));
        }
        let mut pools = self.pools.lock();
        let next = pools.entry(kind.to_owned()).or_insert(1);
        let start = *next;
        let end = start.checked_add(i64::from(count)).ok_or_else(|| {
            Error::unavailable(format!("identifier pool `{kind}` is exhausted"))
        })?;
        *next = end;
        Ok((start..end).collect())
    }

    /// The next identifier `kind` would hand out.
    #[must_use]
    pub fn next_id(&self, kind: &str) -> i64 {
        self.pools.lock().get(kind).copied().unwrap_or(1)
    }
}

impl AllocationAuthority for MemoryAuthority {
    fn allocate_ids(
        &self,
        kind: &str,
        count: u32,
    ) -> impl Future<Output = Result<Vec<i64>>> + Send {
        core::future::ready(self.reserve(kind, count))
    }
}
