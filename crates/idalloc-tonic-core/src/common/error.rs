//! Error types for the allocation authority.
//!
//! [`Error`] covers everything the server can refuse a request for. It
//! converts into [`tonic::Status`] so handlers can use `?` and clients see a
//! meaningful status code.
//!
//! ## Error Cases
//! - `InvalidRequest`: empty kind, zero count, or a count above the limit.
//! - `Exhausted`: the kind's `i64` space has been handed out.
//! - `Storage`: the high-water mark could not be persisted, so nothing from
//!   the new block may be handed out.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the allocation authority.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The client request was invalid or exceeded constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// No identifiers are left for the kind.
    #[error("Identifier space exhausted for kind `{kind}`")]
    Exhausted { kind: String },

    /// Reserving a new block failed.
    #[error("Storage error: {context}")]
    Storage { context: String },
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::Exhausted { kind } => {
                Status::resource_exhausted(format!("Identifier space exhausted for kind `{kind}`"))
            }
            Error::Storage { context } => Status::unavailable(format!("Storage error: {context}")),
        }
    }
}
