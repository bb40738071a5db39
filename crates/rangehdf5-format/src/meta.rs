//! Dataset metadata collected by the format walker.

use crate::error::FormatError;

/// Maximum dataset rank the reader materialises.
pub const MAX_NDIMS: usize = 2;

/// Number of filter ids representable in the per-dataset filter table.
pub const NUM_FILTERS: usize = 3;
/// DEFLATE filter id.
pub const FILTER_DEFLATE: usize = 1;
/// SHUFFLE filter id.
pub const FILTER_SHUFFLE: usize = 2;

/// Bound on the memo URL (`<filename>/<dataset-path>`), including the
/// trailing terminator position the bound reserves.
pub const MAX_META_NAME: usize = 128;

/// Datatype classes from the datatype message's low nibble.
///
/// Only fixed- and floating-point are fully supported; the rest are
/// carried for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataTypeClass {
    #[default]
    Unknown,
    FixedPoint,
    FloatingPoint,
    Time,
    String,
    BitField,
    Opaque,
    Compound,
    Reference,
    Enumerated,
    VariableLength,
    Array,
}

impl DataTypeClass {
    /// Map the datatype message class nibble.
    pub fn from_class(class: u8) -> DataTypeClass {
        match class {
            0 => DataTypeClass::FixedPoint,
            1 => DataTypeClass::FloatingPoint,
            2 => DataTypeClass::Time,
            3 => DataTypeClass::String,
            4 => DataTypeClass::BitField,
            5 => DataTypeClass::Opaque,
            6 => DataTypeClass::Compound,
            7 => DataTypeClass::Reference,
            8 => DataTypeClass::Enumerated,
            9 => DataTypeClass::VariableLength,
            10 => DataTypeClass::Array,
            _ => DataTypeClass::Unknown,
        }
    }
}

/// Data layout classes from the layout message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutClass {
    #[default]
    Unknown,
    Compact,
    Contiguous,
    Chunked,
}

impl LayoutClass {
    /// Map the layout message class byte.
    pub fn from_class(class: u8) -> LayoutClass {
        match class {
            0 => LayoutClass::Compact,
            1 => LayoutClass::Contiguous,
            2 => LayoutClass::Chunked,
            _ => LayoutClass::Unknown,
        }
    }
}

/// Everything the layout reader needs to materialise a dataset,
/// collected by one walk and memoised across calls.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetMeta {
    /// Memo URL this metadata was parsed for.
    pub url: String,
    /// Datatype class.
    pub type_class: DataTypeClass,
    /// Element size in bytes.
    pub type_size: u64,
    /// Fill value, little-endian in the low `fill_size` bytes.
    pub fill: u64,
    /// Fill value size in bytes; 0 when undefined.
    pub fill_size: u64,
    /// Number of dimensions actually carried (≤ [`MAX_NDIMS`]).
    pub ndims: usize,
    /// Per-dimension extents.
    pub dimensions: [u64; MAX_NDIMS],
    /// Data layout kind.
    pub layout: LayoutClass,
    /// Data address: inline position (compact), data start
    /// (contiguous), or B-tree root (chunked).
    pub address: u64,
    /// Stored size in bytes (compact/contiguous); 0 when unknown.
    pub size: u64,
    /// Elements per chunk (chunked only).
    pub chunk_elements: u64,
    /// Chunk element size in bytes (chunked only).
    pub element_size: u64,
    /// Width of file offsets, from the superblock.
    pub offset_size: u64,
    /// Width of file lengths, from the superblock.
    pub length_size: u64,
    /// Present/absent per filter id.
    pub filter: [bool; NUM_FILTERS],
}

impl DatasetMeta {
    /// Fresh metadata for the given memo URL.
    pub fn new(url: String) -> DatasetMeta {
        DatasetMeta {
            url,
            type_class: DataTypeClass::Unknown,
            type_size: 0,
            fill: 0,
            fill_size: 0,
            ndims: 0,
            dimensions: [0; MAX_NDIMS],
            layout: LayoutClass::Unknown,
            address: 0,
            size: 0,
            chunk_elements: 0,
            element_size: 0,
            offset_size: 0,
            length_size: 0,
            filter: [false; NUM_FILTERS],
        }
    }
}

/// Build the memo URL `<filename>/<dataset>` for a resource + dataset
/// path pair.
///
/// Only the final path component of the resource participates, so the
/// same file reached via different prefixes shares memo entries the
/// way the key is meant to work.
pub fn meta_url(resource: &str, dataset: &str) -> Result<String, FormatError> {
    let filename = resource.rsplit('/').next().unwrap_or(resource);
    let name = dataset.strip_prefix('/').unwrap_or(dataset);
    let url = format!("{filename}/{name}");
    if url.len() > MAX_META_NAME - 2 {
        return Err(FormatError::NameTooLong("meta repository url"));
    }
    Ok(url)
}

/// Whether `value` is the all-ones invalid sentinel at `field_size`
/// bytes wide.
pub fn is_invalid_address(value: u64, field_size: u64) -> bool {
    if field_size == 0 || field_size > 8 {
        return false;
    }
    value == u64::MAX >> (64 - field_size * 8)
}
