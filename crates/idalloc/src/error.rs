/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors an allocation call can surface.
///
/// Nothing in this crate retries or swallows these; they are returned to the
/// immediate caller, which owns the retry policy.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The allocation authority could not be reached, failed, or answered
    /// without a usable identifier.
    ///
    /// An authority outage surfaces here on every call. Retrying blindly
    /// would only hide it, so no retry happens inside the crate.
    #[error("allocation unavailable: {reason}")]
    AllocationUnavailable {
        /// Human readable cause, e.g. the transport error or `"empty
        /// response"`.
        reason: String,
    },

    /// An operation was invoked in a context that does not allow it.
    ///
    /// Returned by [`IdService::reset_self_allocated_id`] outside of unit
    /// tests and pipeline workers.
    ///
    /// [`IdService::reset_self_allocated_id`]: crate::IdService::reset_self_allocated_id
    #[error("invalid state: {reason}")]
    InvalidState {
        /// Which contract was violated.
        reason: String,
    },

    /// The caller's cancellation token fired before the authority answered.
    #[error("allocation cancelled by caller")]
    Cancelled,
}

impl Error {
    /// Shorthand for [`Error::AllocationUnavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::AllocationUnavailable {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::InvalidState`].
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }
}
