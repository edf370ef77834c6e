use crate::{
    AllocationAuthority, CancellationToken, EnvironmentProbe, Error, Id, LocalAllocator,
    ProcessEnvironment, RemoteAllocator, Result,
};
use std::sync::Arc;
#[cfg(feature = "tracing")]
use tracing::instrument;


/// The allocation kind every caller shares.
///
/// Using one kind application-wide makes every caller draw from a single
/// global pool instead of fragmenting uniqueness per call site.
pub const APP_WIDE_ALLOCATION_KIND: &str = "common";

/// The allocation entry point.
///
/// Each call asks the [`EnvironmentProbe`] whether the process may
/// self-allocate. If so, the identifier comes from the shared
/// [`LocalAllocator`]; otherwise it is requested from the authority under
/// [`APP_WIDE_ALLOCATION_KIND`]. The verdict is never cached.
///
/// # Example
///
/// ```
/// use idalloc::{Environment, IdService, MemoryAuthority, SwitchableEnvironment};
///
/// let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// rt.block_on(async {
///     let probe = SwitchableEnvironment::new(Environment::Production);
///     let service = IdService::new(&probe, MemoryAuthority::new());
///
///     // Remote: the authority's "common" pool.
///     assert_eq!(service.allocate_id().await.unwrap().get(), 1);
///     assert_eq!(service.allocate_id().await.unwrap().get(), 2);
///
///     // Local: the in-process counter, untouched by the remote calls.
///     probe.set_environment(Environment::UnitTest);
///     assert_eq!(service.allocate_id().await.unwrap().get(), 1);
/// });
/// ```
#[derive(Debug)]
pub struct IdService<P, A> {
    probe: P,
    remote: RemoteAllocator<A>,
    local: Arc<LocalAllocator>,
}

impl<A: AllocationAuthority> IdService<ProcessEnvironment, A> {
    /// A service routed by the process environment variables.
    pub fn from_env(authority: A) -> Self {
        Self::new(ProcessEnvironment::new(), authority)
    }
}

impl<P, A> IdService<P, A>
where
    P: EnvironmentProbe,
    A: AllocationAuthority,
{
    /// Creates a service with its own local counter.
    pub fn new(probe: P, authority: A) -> Self {
        Self::with_local(probe, authority, Arc::new(LocalAllocator::new()))
    }

    /// Creates a service sharing an existing local counter.
    pub fn with_local(probe: P, authority: A, local: Arc<LocalAllocator>) -> Self {
        Self {
            probe,
            remote: RemoteAllocator::new(authority),
            local,
        }
    }

    /// Whether calls made right now would be self-allocated.
    pub fn is_self_allocated(&self) -> bool {
        self.probe.is_self_allocated()
    }

    /// Allocates one identifier.
    ///
    /// # Errors
    ///
    /// Never fails when self-allocated. Otherwise returns
    /// [`Error::AllocationUnavailable`] if the authority cannot deliver.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub async fn allocate_id(&self) -> Result<Id> {
        if self.probe.is_self_allocated() {
            return Ok(self.local.allocate());
        }
        self.remote.allocate(APP_WIDE_ALLOCATION_KIND).await
    }

    /// Allocates one identifier, abandoning the remote request when `cancel`
    /// fires.
    ///
    /// The local path never waits, so the token is not consulted there.
    ///
    /// # Errors
    ///
    /// As [`Self::allocate_id`], plus [`Error::Cancelled`].
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    pub async fn allocate_id_with_cancel(&self, cancel: &CancellationToken) -> Result<Id> {
        if self.probe.is_self_allocated() {
            return Ok(self.local.allocate());
        }
        self.remote
            .allocate_with_cancel(APP_WIDE_ALLOCATION_KIND, cancel)
            .await
    }

    /// Rewinds the self-allocated counter so the next local identifier is
    /// `1`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside of unit tests and pipeline workers. The
    /// counter is left untouched in that case.
    pub fn reset_self_allocated_id(&self) -> Result<()> {
        if !self.probe.is_self_allocated() {
            return Err(Error::invalid_state(
                "can only reset self-allocated ids in unit tests or pipeline workers",
            ));
        }
        self.local.reset();
        #[cfg(feature = "tracing")]
        tracing::debug!("self-allocated id counter reset");
        Ok(())
    }

    /// The environment probe.
    pub const fn probe(&self) -> &P {
        &self.probe
    }

    /// The remote allocator.
    pub const fn remote(&self) -> &RemoteAllocator<A> {
        &self.remote
    }

    /// The local counter, shareable with other services.
    pub const fn local(&self) -> &Arc<LocalAllocator> {
        &self.local
    }
}
