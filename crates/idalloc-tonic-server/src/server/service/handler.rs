//! gRPC service implementation for identifier allocation.
//!
//! [`AllocatorService`] implements the [`IdAllocator`] service from
//! `idalloc.proto`. It validates each request and hands it to the shared
//! [`Reservations`] table, which guarantees that no identifier is ever
//! returned twice for a kind.

use crate::server::{
    config::{MAX_KIND_LEN, ServerConfig},
    reservation::Reservations,
    telemetry::{increment_errors, increment_ids_allocated, increment_requests, record_duration},
};
use idalloc_tonic_core::{
    Error,
    proto::{AllocateIdsRequest, AllocateIdsResponse, id_allocator_server::IdAllocator},
};
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// The allocation authority's gRPC front end.
///
/// Cheap to clone; clones share the same reservation table.
#[derive(Clone)]
pub struct AllocatorService {
    config: ServerConfig,
    reservations: Arc<Reservations>,
}

impl AllocatorService {
    pub fn new(config: ServerConfig, reservations: Arc<Reservations>) -> Self {
        Self {
            config,
            reservations,
        }
    }

    fn validate(&self, req: &AllocateIdsRequest) -> Result<(), Error> {
        if req.kind.is_empty() {
            return Err(Error::InvalidRequest {
                reason: "Kind must not be empty".to_string(),
            });
        }

        if req.kind.len() > MAX_KIND_LEN {
            return Err(Error::InvalidRequest {
                reason: format!("Kind exceeds {MAX_KIND_LEN} bytes"),
            });
        }

        if req.count == 0 {
            return Err(Error::InvalidRequest {
                reason: "Count must be greater than 0".to_string(),
            });
        }

        if req.count > self.config.max_ids_per_request {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "Count {} exceeds maximum allowed ({})",
                    req.count, self.config.max_ids_per_request
                ),
            });
        }

        Ok(())
    }
}

#[tonic::async_trait]
impl IdAllocator for AllocatorService {
    /// Reserves `count` identifiers from `kind`.
    ///
    /// If `metrics` is enabled, emits telemetry for:
    /// - request rate
    /// - number of IDs allocated
    /// - request duration
    /// - errors
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip_all, fields(kind = %req.get_ref().kind, count = req.get_ref().count))
    )]
    async fn allocate_ids(
        &self,
        req: Request<AllocateIdsRequest>,
    ) -> Result<Response<AllocateIdsResponse>, Status> {
        let start = std::time::Instant::now();
        let req = req.into_inner();

        if let Err(e) = self.validate(&req) {
            increment_errors();
            #[cfg(feature = "tracing")]
            tracing::debug!("Rejected request: {}", e);
            return Err(e.into());
        }

        increment_requests();

        // Crossing a block boundary fsyncs the state file under the pool lock.
        let reservations = Arc::clone(&self.reservations);
        let AllocateIdsRequest { kind, count } = req;
        let allocated = tokio::task::spawn_blocking(move || reservations.allocate(&kind, count))
            .await
            .map_err(|e| {
                increment_errors();
                #[cfg(feature = "tracing")]
                tracing::error!("Allocation task failed: {}", e);
                Status::internal(format!("allocation task failed: {e}"))
            })?;

        match allocated {
            Ok(ids) => {
                increment_ids_allocated(ids.len() as u64);
                record_duration(start.elapsed().as_secs_f64() * 1000.0);
                Ok(Response::new(AllocateIdsResponse { ids }))
            }
            Err(e) => {
                increment_errors();
                #[cfg(feature = "tracing")]
                tracing::warn!("Allocation failed: {}", e);
                Err(e.into())
            }
        }
    }
}
