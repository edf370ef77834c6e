use anyhow::bail;
use clap::Parser;
use idalloc_tonic_core::DEFAULT_MAX_IDS_PER_REQUEST;
use std::path::PathBuf;

/// Longest accepted allocation kind, in bytes.
pub const MAX_KIND_LEN: usize = 256;

/// Runtime configuration for the `idalloc-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables, with
/// defaults suitable for a single-node deployment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "idalloc-tonic-server",
    version,
    about = "A gRPC authority for never-reused 64-bit IDs"
)]
pub struct CliArgs {
    /// Maximum number of IDs a single request may ask for.
    ///
    /// Environment variable: `MAX_IDS_PER_REQUEST`
    #[arg(long, env = "MAX_IDS_PER_REQUEST", default_value_t = DEFAULT_MAX_IDS_PER_REQUEST)]
    pub max_ids_per_request: u32,

    /// Number of IDs reserved per kind each time the current block runs out.
    ///
    /// Every reservation costs one write of the state file. Larger blocks
    /// mean fewer writes but more IDs lost on restart.
    ///
    /// Environment variable: `BLOCK_SIZE`
    #[arg(long, env = "BLOCK_SIZE", default_value_t = 1000)]
    pub block_size: i64,

    /// JSON file holding each kind's high-water mark.
    ///
    /// Without it the server keeps its counters in memory only and may reissue
    /// IDs after a restart.
    ///
    /// Environment variable: `STATE_FILE`
    #[arg(long, env = "STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/idalloc.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_ids_per_request: u32,
    pub block_size: i64,
    pub state_file: Option<PathBuf>,
    pub server_addr: String,
    pub uds: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.max_ids_per_request == 0 {
            bail!("MAX_IDS_PER_REQUEST must be greater than 0");
        }

        if args.block_size <= 0 {
            bail!("BLOCK_SIZE must be greater than 0");
        }

        Ok(Self {
            max_ids_per_request: args.max_ids_per_request,
            block_size: args.block_size,
            state_file: args.state_file,
            server_addr: args.server_addr,
            uds: args.uds,
        })
    }
}

#[cfg(test)]
impl ServerConfig {
    /// An in-memory configuration for handler tests.
    pub fn for_tests(block_size: i64, max_ids_per_request: u32) -> Self {
        Self {
            max_ids_per_request,
            block_size,
            state_file: None,
            server_addr: String::from("127.0.0.1:0"),
            uds: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let args = CliArgs::try_parse_from(["idalloc-tonic-server"]).unwrap();
        let config = ServerConfig::try_from(args).unwrap();

        assert_eq!(config.max_ids_per_request, DEFAULT_MAX_IDS_PER_REQUEST);
        assert_eq!(config.block_size, 1000);
        assert_eq!(config.state_file, None);
        assert_eq!(config.server_addr, "0.0.0.0:50051");
        assert!(!config.uds);
    }

    #[test]
    fn flags_override_defaults() {
        let args = CliArgs::try_parse_from([
            "idalloc-tonic-server",
            "--block-size",
            "50",
            "--state-file",
            "/tmp/state.json",
            "--uds",
            "--server-addr",
            "/tmp/idalloc.sock",
        ])
        .unwrap();
        let config = ServerConfig::try_from(args).unwrap();

        assert_eq!(config.block_size, 50);
        assert_eq!(config.state_file, Some(PathBuf::from("/tmp/state.json")));
        assert!(config.uds);
    }

    #[test]
    fn rejects_non_positive_block_size() {
        let args =
            CliArgs::try_parse_from(["idalloc-tonic-server", "--block-size", "0"]).unwrap();
        assert!(ServerConfig::try_from(args).is_err());
    }

    #[test]
    fn rejects_zero_request_limit() {
        let args =
            CliArgs::try_parse_from(["idalloc-tonic-server", "--max-ids-per-request", "0"])
                .unwrap();
        assert!(ServerConfig::try_from(args).is_err());
    }
}
