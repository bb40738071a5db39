//! Per-read file session: back-end, cache handle, and the primitive
//! decoder every structure parser reads through.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use rangehdf5_io::backend::RangeIo;
use rangehdf5_io::cache::{CacheSlice, IoCache, L1_LINE};

use crate::error::FormatError;
use crate::meta::DatasetMeta;

/// State for one `read` call: the opened back-end, the (shared or
/// private) I/O cache, the parsed dataset path, and the metadata being
/// populated. Created on entry, dropped on exit.
pub struct FileSession {
    pub(crate) backend: Box<dyn RangeIo>,
    pub(crate) cache: Arc<IoCache>,
    pub(crate) dataset_path: Vec<String>,
    pub(crate) highest_data_level: usize,
    pub(crate) meta: DatasetMeta,
    pub(crate) data_size_hint: u64,
    pub(crate) start_row: u64,
    pub(crate) num_rows: u64,
    pub(crate) error_checking: bool,
    pub(crate) verbose: bool,
}

impl FileSession {
    /// Build a session over an opened back-end.
    ///
    /// `dataset` is the forward-slash separated path with an optional
    /// leading `/`; empty components are rejected. `memo_url` becomes
    /// the key stored with the parsed metadata.
    pub fn new(
        backend: Box<dyn RangeIo>,
        cache: Arc<IoCache>,
        dataset: &str,
        memo_url: String,
        start_row: u64,
        num_rows: u64,
    ) -> Result<FileSession, FormatError> {
        let trimmed = dataset.strip_prefix('/').unwrap_or(dataset);
        if trimmed.is_empty() || trimmed.split('/').any(str::is_empty) {
            return Err(FormatError::InvalidDatasetPath(dataset.to_string()));
        }
        let dataset_path = trimmed.split('/').map(str::to_string).collect();

        Ok(FileSession {
            backend,
            cache,
            dataset_path,
            highest_data_level: 0,
            meta: DatasetMeta::new(memo_url),
            data_size_hint: 0,
            start_row,
            num_rows,
            error_checking: true,
            verbose: false,
        })
    }

    /// Replace the session metadata with a memoised record, skipping
    /// the parser phase.
    pub fn set_meta(&mut self, meta: DatasetMeta) {
        self.meta = meta;
    }

    /// The session's metadata record.
    pub fn meta(&self) -> &DatasetMeta {
        &self.meta
    }

    /// Enable or disable format error checking (on by default).
    pub fn set_error_checking(&mut self, on: bool) {
        self.error_checking = on;
    }

    /// Enable verbose structure logging through `tracing`.
    pub fn set_verbose(&mut self, on: bool) {
        self.verbose = on;
    }

    /// Pull `size` bytes at `*pos` through the cache, advancing `*pos`.
    ///
    /// Returns the bytes and whether the call inserted a fresh cache
    /// line (i.e. actually touched the back-end).
    pub(crate) fn request(
        &mut self,
        size: u64,
        pos: &mut u64,
        hint: u64,
    ) -> Result<(CacheSlice, bool), FormatError> {
        Ok(self.cache.request(self.backend.as_mut(), size, pos, hint)?)
    }

    /// Read a little-endian unsigned field of `size` ∈ {1, 2, 4, 8}
    /// bytes at `*pos`, advancing `*pos`.
    ///
    /// A miss pulls a whole L1 line so neighbouring parser reads hit.
    pub fn read_field(&mut self, size: u64, pos: &mut u64) -> Result<u64, FormatError> {
        if !matches!(size, 1 | 2 | 4 | 8) {
            return Err(FormatError::InvalidFieldSize(size));
        }
        let (slice, _) = self.request(size, pos, L1_LINE)?;
        let bytes = slice.bytes();
        Ok(match size {
            1 => bytes[0] as u64,
            2 => LittleEndian::read_u16(bytes) as u64,
            4 => LittleEndian::read_u32(bytes) as u64,
            _ => LittleEndian::read_u64(bytes),
        })
    }

    /// Copy `dst.len()` bytes at `*pos` into `dst`, advancing `*pos`.
    pub fn read_bytes(&mut self, dst: &mut [u8], pos: &mut u64) -> Result<(), FormatError> {
        let (slice, _) = self.request(dst.len() as u64, pos, L1_LINE)?;
        dst.copy_from_slice(slice.bytes());
        Ok(())
    }

    /// Read an `offsetsize`-wide file address field.
    pub(crate) fn read_offset(&mut self, pos: &mut u64) -> Result<u64, FormatError> {
        let size = self.meta.offset_size;
        self.read_field(size, pos)
    }

    /// Read a `lengthsize`-wide file length field.
    pub(crate) fn read_length(&mut self, pos: &mut u64) -> Result<u64, FormatError> {
        let size = self.meta.length_size;
        self.read_field(size, pos)
    }
}

/// Session over an in-memory buffer, for this crate's tests.
#[cfg(test)]
pub(crate) fn test_session(data: Vec<u8>, dataset: &str) -> FileSession {
    let mut session = FileSession::new(
        Box::new(rangehdf5_io::backend::MemBackend::new(data)),
        Arc::new(IoCache::new()),
        dataset,
        format!("test.h5/{}", dataset.trim_start_matches('/')),
        0,
        0,
    )
    .unwrap();
    session.meta.offset_size = 8;
    session.meta.length_size = 8;
    session
}
