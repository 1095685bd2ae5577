//! Error types shared by the discovery adapters and the scan orchestrator.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to run {program}: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}: {stderr}")]
    CommandFailed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("failed to parse nmap XML output: {0}")]
    XmlParse(String),

    #[error("invalid subnet: {0}")]
    InvalidSubnet(String),

    #[error("invalid port specification: {0}")]
    InvalidPortSpec(String),

    #[error("vendor database unavailable")]
    VendorUnavailable,

    #[error("Scan already in progress")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
