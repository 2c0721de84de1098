use std::io;

/// Errors surfaced by the cache engine and its construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Address is negative, does not fit the address width, or lies past the end of memory.
    #[error("address {address} is out of range (limit {limit})")]
    OutOfRange { address: i128, limit: u64 },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("unrecognized replacement policy: {0}")]
    UnknownPolicy(String),
}

/// Errors raised while reading a trace.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("trace I/O failed: {0}")]
    Io(#[from] io::Error),

    /// Line numbers are 1-based.
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}
