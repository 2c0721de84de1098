//! A set-associative, write-back data cache in front of a flat byte memory,
//! driven by a text trace of reads, writes and miss-rate queries.

pub mod addr;
pub mod cache;
pub mod config;
pub mod error;
pub mod geometry;
pub mod memory;
pub mod replace;
pub mod runner;
pub mod trace;

pub use cache::{Cache, CacheStats, IsCache};
pub use config::Config;
pub use error::{CacheError, TraceError};
pub use geometry::Geometry;
pub use replace::Outcome;
