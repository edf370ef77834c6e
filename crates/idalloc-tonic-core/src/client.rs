//! gRPC-backed allocation authority.
//!
//! [`GrpcAuthority`] implements [`AllocationAuthority`] on top of the
//! generated `IdAllocator` client, so an [`idalloc::IdService`] can delegate
//! production allocations to a remote `idalloc-tonic-server` (or any other
//! server speaking `idalloc.proto`).
//!
//! Every transport failure and every non-OK status surfaces as
//! [`idalloc::Error::AllocationUnavailable`]. Nothing is retried here.

use crate::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT,
    proto::{AllocateIdsRequest, id_allocator_client::IdAllocatorClient},
};
use core::{future::Future, time::Duration};
use idalloc::{AllocationAuthority, Error};
use tonic::{
    Request, Status,
    transport::{Channel, Endpoint},
};

/// Connection settings for a [`GrpcAuthority`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrpcAuthorityConfig {
    /// Authority URI, e.g. `http://ids.internal:50051`.
    pub endpoint: String,
    /// Deadline applied to each allocation round trip. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Deadline for establishing the connection. `None` waits forever.
    pub connect_timeout: Option<Duration>,
}

impl GrpcAuthorityConfig {
    /// Settings for `endpoint` with the default timeouts.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn to_endpoint(&self) -> idalloc::Result<Endpoint> {
        let mut endpoint = Endpoint::from_shared(self.endpoint.clone()).map_err(|e| {
            Error::unavailable(format!("invalid authority endpoint `{}`: {e}", self.endpoint))
        })?;
        if let Some(timeout) = self.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }
        if let Some(timeout) = self.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }
        Ok(endpoint)
    }
}

impl Default for GrpcAuthorityConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

/// An [`AllocationAuthority`] reached over gRPC.
///
/// Cloning is cheap; clones share the underlying channel.
#[derive(Clone, Debug)]
pub struct GrpcAuthority {
    client: IdAllocatorClient<Channel>,
    request_timeout: Option<Duration>,
}

impl GrpcAuthority {
    /// Connects to the authority, failing if it cannot be reached now.
    ///
    /// # Errors
    ///
    /// [`Error::AllocationUnavailable`] for a malformed endpoint or a failed
    /// connection attempt.
    pub async fn connect(config: &GrpcAuthorityConfig) -> idalloc::Result<Self> {
        let channel = config.to_endpoint()?.connect().await.map_err(|e| {
            Error::unavailable(format!(
                "failed to connect to authority `{}`: {e}",
                config.endpoint
            ))
        })?;
        #[cfg(feature = "tracing")]
        tracing::info!(endpoint = %config.endpoint, "connected to allocation authority");
        Ok(Self::from_channel(channel, config.request_timeout))
    }

    /// Creates a client that connects on first use.
    ///
    /// Reachability problems then surface on the first allocation instead.
    ///
    /// # Errors
    ///
    /// [`Error::AllocationUnavailable`] for a malformed endpoint.
    pub fn connect_lazy(config: &GrpcAuthorityConfig) -> idalloc::Result<Self> {
        let channel = config.to_endpoint()?.connect_lazy();
        Ok(Self::from_channel(channel, config.request_timeout))
    }

    /// Wraps an existing channel.
    ///
    /// `request_timeout` is propagated to the server as the gRPC deadline.
    pub fn from_channel(channel: Channel, request_timeout: Option<Duration>) -> Self {
        Self {
            client: IdAllocatorClient::new(channel),
            request_timeout,
        }
    }
}

impl AllocationAuthority for GrpcAuthority {
    fn allocate_ids(
        &self,
        kind: &str,
        count: u32,
    ) -> impl Future<Output = idalloc::Result<Vec<i64>>> + Send {
        let mut client = self.client.clone();
        let mut request = Request::new(AllocateIdsRequest {
            kind: kind.to_owned(),
            count,
        });
        if let Some(timeout) = self.request_timeout {
            request.set_timeout(timeout);
        }

        async move {
            let response = client
                .allocate_ids(request)
                .await
                .map_err(|status| status_to_error(&status))?;
            Ok(response.into_inner().ids)
        }
    }
}

fn status_to_error(status: &Status) -> Error {
    #[cfg(feature = "tracing")]
    tracing::debug!(code = ?status.code(), message = status.message(), "authority call failed");
    Error::unavailable(format!(
        "authority returned {:?}: {}",
        status.code(),
        status.message()
    ))
}
