//! Error types for the range I/O layer.

use std::fmt;

/// Errors surfaced by URL parsing, back-ends, and the I/O cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    /// The URL scheme is not `file://` or `s3://`, or the S3 resource
    /// has no `<bucket>/<key>` split.
    InvalidUrl(String),
    /// The back-end could not open the resource.
    OpenFailed(String),
    /// The back-end returned fewer bytes than the request required.
    ShortRead {
        /// Bytes the caller needed.
        requested: u64,
        /// Bytes the back-end produced.
        got: u64,
    },
    /// The back-end failed mid-read (seek failure, HTTP error, ...).
    Backend(String),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::InvalidUrl(url) => write!(f, "invalid url: {url}"),
            IoError::OpenFailed(what) => write!(f, "failed to open resource: {what}"),
            IoError::ShortRead { requested, got } => {
                write!(f, "failed to read at least {requested} bytes of data: {got}")
            }
            IoError::Backend(what) => write!(f, "backend read failed: {what}"),
        }
    }
}

impl std::error::Error for IoError {}
