//! The public error value: one kind, a message, and the dataset path.

use std::fmt;

use rangehdf5_format::FormatError;
use rangehdf5_io::IoError;

/// The closed set of failure kinds `read` can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unrecognised scheme or malformed S3 path.
    InvalidUrl,
    /// The back-end could not open the resource.
    OpenFailed,
    /// The back-end returned fewer bytes than required.
    ShortRead,
    /// Signature mismatch, unsupported version or feature, or
    /// inconsistent metadata.
    Format,
    /// The request falls outside the dataset or its stored data.
    Bounds,
    /// DEFLATE failed or SHUFFLE hit a bad element size.
    Filter,
    /// No coercion rule applies for the requested value type.
    Translation,
}

/// Error returned by [`read`](crate::read): a kind, a human-readable
/// message, and the dataset path the read was for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Description of the failure.
    pub message: String,
    /// Dataset path of the failed read; empty until `read` attaches it.
    pub dataset: String,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Error {
        Error {
            kind,
            message: message.into(),
            dataset: String::new(),
        }
    }

    pub(crate) fn for_dataset(mut self, dataset: &str) -> Error {
        self.dataset = dataset.to_string();
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dataset.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} ({})", self.message, self.dataset)
        }
    }
}

impl std::error::Error for Error {}

impl From<IoError> for Error {
    fn from(e: IoError) -> Error {
        let kind = match e {
            IoError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            IoError::OpenFailed(_) => ErrorKind::OpenFailed,
            IoError::ShortRead { .. } => ErrorKind::ShortRead,
            IoError::Backend(_) => ErrorKind::OpenFailed,
        };
        Error::new(kind, e.to_string())
    }
}

impl From<FormatError> for Error {
    fn from(e: FormatError) -> Error {
        let kind = match &e {
            FormatError::Io(io) => return Error::from(io.clone()),
            FormatError::Filter(_) => ErrorKind::Filter,
            FormatError::ReadExceedsRows { .. }
            | FormatError::ReadExceedsData { .. }
            | FormatError::ChunkOutOfBounds { .. } => ErrorKind::Bounds,
            _ => ErrorKind::Format,
        };
        Error::new(kind, e.to_string())
    }
}
