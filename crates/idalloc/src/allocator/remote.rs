use crate::{Error, Id, Result};
use core::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// An external service that reserves identifiers which are unique across
/// every process and machine drawing from the same `kind`.
///
/// A response carries at most `count` identifiers, in order. An empty
/// response means the authority could not allocate. The authority alone
/// guarantees that no identifier is ever handed out twice for a `kind`.
pub trait AllocationAuthority: Send + Sync {
    /// Reserves up to `count` identifiers from the pool named `kind`.
    fn allocate_ids(
        &self,
        kind: &str,
        count: u32,
    ) -> impl Future<Output = Result<Vec<i64>>> + Send;
}

impl<A: AllocationAuthority> AllocationAuthority for &A {
    fn allocate_ids(
        &self,
        kind: &str,
        count: u32,
    ) -> impl Future<Output = Result<Vec<i64>>> + Send {
        (**self).allocate_ids(kind, count)
    }
}

impl<A: AllocationAuthority> AllocationAuthority for Arc<A> {
    fn allocate_ids(
        &self,
        kind: &str,
        count: u32,
    ) -> impl Future<Output = Result<Vec<i64>>> + Send {
        (**self).allocate_ids(kind, count)
    }
}

/// An authority that is never reachable.
///
/// For binaries that only ever run self-allocated (unit tests, pipeline
/// workers) and have no authority configured. Any remote allocation fails
/// with [`Error::AllocationUnavailable`].
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAuthority;

impl AllocationAuthority for NoAuthority {
    fn allocate_ids(
        &self,
        kind: &str,
        _count: u32,
    ) -> impl Future<Output = Result<Vec<i64>>> + Send {
        core::future::ready(Err(Error::unavailable(format!(
            "no allocation authority configured for kind `{kind}`"
        ))))
    }
}

/// Allocates single identifiers from an [`AllocationAuthority`].
///
/// Every call asks the authority for exactly one identifier. Failures are
/// returned as-is and never retried.
#[derive(Clone, Debug)]
pub struct RemoteAllocator<A> {
    authority: A,
}

impl<A: AllocationAuthority> RemoteAllocator<A> {
    /// Wraps `authority`.
    pub const fn new(authority: A) -> Self {
        Self { authority }
    }

    /// The wrapped authority.
    pub const fn authority(&self) -> &A {
        &self.authority
    }

    /// Requests one identifier from the pool named `kind`.
    ///
    /// # Errors
    ///
    /// [`Error::AllocationUnavailable`] when the authority fails, answers with
    /// no identifiers, or answers with zero.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub async fn allocate(&self, kind: &str) -> Result<Id> {
        let ids = self.authority.allocate_ids(kind, 1).await?;
        first_id(kind, &ids)
    }

    /// Like [`Self::allocate`], but gives up as soon as `cancel` fires.
    ///
    /// An already cancelled token returns before the authority is contacted.
    /// If the authority committed an identifier but the answer is dropped, that
    /// identifier is simply lost; it is never handed out again.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] if the token fires first, otherwise as
    /// [`Self::allocate`].
    pub async fn allocate_with_cancel(
        &self,
        kind: &str,
        cancel: &CancellationToken,
    ) -> Result<Id> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            res = self.allocate(kind) => res,
        }
    }
}

fn first_id(kind: &str, ids: &[i64]) -> Result<Id> {
    let Some(&raw) = ids.first() else {
        return Err(Error::unavailable(format!(
            "authority returned no identifiers for kind `{kind}`"
        )));
    };
    #[cfg(feature = "tracing")]
    {
        if ids.len() > 1 {
            tracing::warn!(kind, extra = ids.len() - 1, "authority over-allocated, dropping extras");
        }
    }
    Id::new(raw).ok_or_else(|| {
        Error::unavailable(format!(
            "authority returned a zero identifier for kind `{kind}`"
        ))
    })
}
