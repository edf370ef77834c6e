//! Protocol-level constants shared by the client and the server.

use core::time::Duration;

/// Default address of a locally running authority.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:50051";

/// Default upper bound on a single allocation round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default upper bound on establishing the connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum number of identifiers a server hands out per request.
pub const DEFAULT_MAX_IDS_PER_REQUEST: u32 = 10_000;
