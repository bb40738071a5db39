//! Range I/O layer for HDF5 reading.
//!
//! This crate provides the pieces below the format walker: URL
//! recognition, positioned-read back-ends for local files and S3-style
//! objects, and a two-tier line cache shared across dataset reads.
//! Nothing in here interprets HDF5 bytes.

pub mod backend;
pub mod cache;
pub mod error;
pub mod url;

pub use backend::{open_url, FileBackend, MemBackend, RangeIo, S3Backend};
pub use cache::{CacheSlice, CacheStats, IoCache};
pub use error::IoError;
pub use url::{parse_url, BackendKind};
