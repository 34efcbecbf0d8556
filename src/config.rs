//! Configuration for narthex
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::types::{NarthexError, Result};

/// Narthex - REST facade over congregation records
///
/// "Enter his gates with thanksgiving" - Psalm 100:4
#[derive(Parser, Debug, Clone)]
#[command(name = "narthex")]
#[command(about = "REST facade over congregation records in MongoDB")]
pub struct Args {
    /// Unique node identifier for this facade instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:7100")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "DB_URI", default_value = "mongodb://localhost:27017")]
    pub db_uri: String,

    /// MongoDB database name (namespace)
    #[arg(long, env = "NS", default_value = "church")]
    pub db_name: String,

    /// Connection pool size reported by config-options and applied to the client
    #[arg(long, env = "POOL_SIZE", default_value = "50")]
    pub pool_size: u32,

    /// Write timeout in milliseconds, applied to majority writes
    #[arg(long, env = "WTIMEOUT_MS", default_value = "2500")]
    pub wtimeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(NarthexError::Config(
                "POOL_SIZE must be greater than zero".to_string(),
            ));
        }

        if self.wtimeout_ms == 0 {
            return Err(NarthexError::Config(
                "WTIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_positive_limits() {
        let args = Args::parse_from(["narthex", "--pool-size", "50", "--wtimeout-ms", "2500"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_pool_size() {
        let args = Args::parse_from(["narthex", "--pool-size", "0", "--wtimeout-ms", "2500"]);
        let err = args.validate().unwrap_err();
        assert!(matches!(err, NarthexError::Config(_)));
        assert!(err.to_string().contains("POOL_SIZE"));
    }

    #[test]
    fn test_validate_rejects_zero_wtimeout() {
        let args = Args::parse_from(["narthex", "--pool-size", "50", "--wtimeout-ms", "0"]);
        let err = args.validate().unwrap_err();
        assert!(matches!(err, NarthexError::Config(_)));
        assert!(err.to_string().contains("WTIMEOUT_MS"));
    }
}
