//! Error types for HDF5 format walking.

use std::fmt;

use rangehdf5_filters::FilterError;
use rangehdf5_io::IoError;

/// Errors that can occur while walking the format or materialising a
/// dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
    /// Underlying range I/O failure.
    Io(IoError),
    /// Chunk filter failure.
    Filter(FilterError),
    /// The primitive decoder was asked for a field size outside
    /// {1, 2, 4, 8}.
    InvalidFieldSize(u64),
    /// A structure signature did not match.
    InvalidSignature {
        /// Which structure was being parsed.
        structure: &'static str,
        /// The bytes found, little-endian.
        found: u64,
    },
    /// A structure carried an unsupported version.
    UnsupportedVersion {
        /// Which structure was being parsed.
        structure: &'static str,
        /// The version found.
        version: u64,
    },
    /// A reserved field held a non-zero value.
    InvalidReservedField(&'static str),
    /// A feature of the format this reader does not implement.
    UnsupportedFeature(&'static str),
    /// A datatype class other than fixed- or floating-point.
    UnsupportedDataClass(u8),
    /// A filter id outside the supported table.
    UnsupportedFilter(u64),
    /// A link type other than hard, soft, or external.
    InvalidLinkType(u64),
    /// A data layout class outside compact/contiguous/chunked.
    InvalidLayoutClass(u8),
    /// The dataspace rank exceeds what the reader materialises.
    DimensionsExceeded(u64),
    /// A message reader consumed a different byte count than declared.
    MessageSizeMismatch {
        /// Bytes the reader consumed (after alignment).
        read: u64,
        /// Bytes the message header declared.
        declared: u64,
    },
    /// A name or memo URL exceeded its fixed bound.
    NameTooLong(&'static str),
    /// The dataset path is empty or has an empty component.
    InvalidDatasetPath(String),
    /// No datatype message was found before the data read.
    MissingTypeInfo,
    /// The requested row range extends past the first dimension.
    ReadExceedsRows {
        /// First requested row.
        start: u64,
        /// Number of requested rows.
        rows: u64,
        /// Extent of the first dimension.
        dim0: u64,
    },
    /// The stored data is smaller than the requested range.
    ReadExceedsData {
        /// Stored size in bytes.
        size: u64,
        /// Bytes the request needs.
        needed: u64,
    },
    /// The data address is the invalid sentinel.
    InvalidDataAddress,
    /// A chunk's position falls outside the computed buffer window.
    ChunkOutOfBounds {
        /// Chunk byte offset within the dataset.
        chunk_offset: u64,
        /// Byte offset of the requested window.
        buffer_offset: u64,
    },
    /// An uncompressed chunk's stored size disagrees with its extent.
    ChunkSizeMismatch {
        /// Bytes stored on file.
        stored: u64,
        /// Bytes the chunk extent implies.
        expected: u64,
    },
    /// Chunk metadata is internally inconsistent.
    InconsistentMetadata(&'static str),
    /// A fractal heap block yielded more bytes than its size allows.
    HeapBlockOverrun {
        /// Bytes the block traversal consumed.
        read: u64,
        /// The block size from the doubling table.
        block: u64,
    },
    /// A B-tree key's trailing field was not a typesize multiple.
    InvalidChunkKey(u64),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::Io(e) => write!(f, "{e}"),
            FormatError::Filter(e) => write!(f, "{e}"),
            FormatError::InvalidFieldSize(size) => write!(f, "invalid field size: {size}"),
            FormatError::InvalidSignature { structure, found } => {
                write!(f, "invalid {structure} signature: 0x{found:x}")
            }
            FormatError::UnsupportedVersion { structure, version } => {
                write!(f, "invalid {structure} version: {version}")
            }
            FormatError::InvalidReservedField(what) => {
                write!(f, "invalid reserved field in {what}")
            }
            FormatError::UnsupportedFeature(what) => write!(f, "unsupported: {what}"),
            FormatError::UnsupportedDataClass(class) => {
                write!(f, "unsupported datatype class: {class}")
            }
            FormatError::UnsupportedFilter(id) => write!(f, "invalid filter specified: {id}"),
            FormatError::InvalidLinkType(ty) => write!(f, "invalid link type: {ty}"),
            FormatError::InvalidLayoutClass(class) => {
                write!(f, "invalid data layout: {class}")
            }
            FormatError::DimensionsExceeded(rank) => {
                write!(f, "unsupported number of dimensions: {rank}")
            }
            FormatError::MessageSizeMismatch { read, declared } => {
                write!(f, "message different size than specified: {read} != {declared}")
            }
            FormatError::NameTooLong(what) => write!(f, "{what} exceeded maximum length"),
            FormatError::InvalidDatasetPath(path) => {
                write!(f, "invalid dataset path: {path}")
            }
            FormatError::MissingTypeInfo => write!(f, "missing data type information"),
            FormatError::ReadExceedsRows { start, rows, dim0 } => {
                write!(f, "read exceeds number of rows: {start} + {rows} > {dim0}")
            }
            FormatError::ReadExceedsData { size, needed } => {
                write!(f, "read exceeds available data: {size} < {needed}")
            }
            FormatError::InvalidDataAddress => {
                write!(f, "data not allocated in contiguous layout")
            }
            FormatError::ChunkOutOfBounds {
                chunk_offset,
                buffer_offset,
            } => {
                write!(
                    f,
                    "invalid location to read data: {chunk_offset}, {buffer_offset}"
                )
            }
            FormatError::ChunkSizeMismatch { stored, expected } => {
                write!(f, "mismatch in chunk size: {stored}, {expected}")
            }
            FormatError::InconsistentMetadata(what) => write!(f, "{what}"),
            FormatError::HeapBlockOverrun { read, block } => {
                write!(f, "block contained more bytes than specified: {read} > {block}")
            }
            FormatError::InvalidChunkKey(trailing) => {
                write!(f, "key did not include a trailing zero: {trailing}")
            }
        }
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormatError::Io(e) => Some(e),
            FormatError::Filter(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for FormatError {
    fn from(e: IoError) -> Self {
        FormatError::Io(e)
    }
}

impl From<FilterError> for FormatError {
    fn from(e: FilterError) -> Self {
        FormatError::Filter(e)
    }
}
