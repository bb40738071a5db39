//! Layout dispatch: materialise a row-range of a dataset into one
//! contiguous buffer.

use tracing::debug;

use crate::error::FormatError;
use crate::meta::{
    is_invalid_address, DataTypeClass, LayoutClass, FILTER_DEFLATE, FILTER_SHUFFLE,
};
use crate::session::FileSession;

use rangehdf5_io::cache::L1_LINE;

/// Sentinel for "read to the end of the first dimension".
pub const ALL_ROWS: u64 = u64::MAX;

/// Raw result of a dataset read, before any column extraction or type
/// coercion.
#[derive(Debug, Clone)]
pub struct DatasetRead {
    /// Element size in bytes.
    pub type_size: u64,
    /// Number of elements in `data`.
    pub elements: u64,
    /// Rows materialised.
    pub num_rows: u64,
    /// Columns per row: 0 for scalar data, 1 for 1-D, `dims[1]` above.
    pub num_cols: u64,
    /// Datatype class of the source data.
    pub type_class: DataTypeClass,
    /// The row-major bytes.
    pub data: Vec<u8>,
}

impl FileSession {
    /// Materialise `[start_row, start_row + num_rows)` of the dataset
    /// described by the session metadata.
    pub fn read_dataset(&mut self) -> Result<DatasetRead, FormatError> {
        if self.meta.type_size == 0 {
            return Err(FormatError::MissingTypeInfo);
        }

        // Size of one row: everything under the first dimension.
        let mut row_size = self.meta.type_size;
        for d in 1..self.meta.ndims {
            row_size *= self.meta.dimensions[d];
        }

        let first_dimension = if self.meta.ndims > 0 {
            self.meta.dimensions[0]
        } else {
            0
        };
        if self.num_rows == ALL_ROWS {
            self.num_rows = first_dimension;
        }
        if self.start_row + self.num_rows > first_dimension {
            return Err(FormatError::ReadExceedsRows {
                start: self.start_row,
                rows: self.num_rows,
                dim0: first_dimension,
            });
        }

        let buffer_size = row_size * self.num_rows;
        let mut buffer = vec![0u8; buffer_size as usize];

        // Pre-fill with the fill value, repeated at its own stride.
        if self.meta.fill_size > 0 {
            let fill = self.meta.fill.to_le_bytes();
            let fill_size = self.meta.fill_size as usize;
            let mut i = 0;
            while i + fill_size <= buffer.len() {
                buffer[i..i + fill_size].copy_from_slice(&fill[..fill_size]);
                i += fill_size;
            }
        }

        let num_cols = match self.meta.ndims {
            0 => 0,
            1 => 1,
            _ => self.meta.dimensions[1],
        };

        let buffer_offset = row_size * self.start_row;

        if self.error_checking {
            let offset_size = self.meta.offset_size;
            if is_invalid_address(self.meta.address, offset_size) {
                return Err(FormatError::InvalidDataAddress);
            }
            if self.meta.size != 0 && self.meta.size < buffer_offset + buffer_size {
                return Err(FormatError::ReadExceedsData {
                    size: self.meta.size,
                    needed: buffer_offset + buffer_size,
                });
            }
            if (self.meta.filter[FILTER_DEFLATE] || self.meta.filter[FILTER_SHUFFLE])
                && matches!(
                    self.meta.layout,
                    LayoutClass::Compact | LayoutClass::Contiguous
                )
            {
                return Err(FormatError::UnsupportedFeature(
                    "filters on non-chunked layouts",
                ));
            }
        }

        if buffer_size > 0 {
            match self.meta.layout {
                LayoutClass::Compact | LayoutClass::Contiguous => {
                    let mut data_addr = self.meta.address + buffer_offset;
                    let (slice, _) = self.request(buffer_size, &mut data_addr, L1_LINE)?;
                    buffer.copy_from_slice(slice.bytes());
                }
                LayoutClass::Chunked => {
                    if self.error_checking {
                        if self.meta.element_size != self.meta.type_size {
                            return Err(FormatError::InconsistentMetadata(
                                "chunk element size does not match data element size",
                            ));
                        }
                        if self.meta.chunk_elements == 0 {
                            return Err(FormatError::InconsistentMetadata(
                                "invalid number of chunk elements",
                            ));
                        }
                    }

                    let scratch_size = self.meta.chunk_elements * self.meta.type_size;
                    let mut scratch = vec![0u8; scratch_size as usize];

                    // Prefetch the whole span from the data start when
                    // that grows the transfer by at most 2x; a fresh
                    // prefetch line means chunk reads will hit it, so
                    // their own hint can drop to one L1 line.
                    self.data_size_hint = buffer_size;
                    if buffer_offset < buffer_size {
                        let mut prefetch_pos = self.meta.address;
                        let span = buffer_offset + buffer_size;
                        let (_, fresh) = self.request(0, &mut prefetch_pos, span)?;
                        if fresh {
                            self.data_size_hint = L1_LINE;
                        }
                    }

                    debug!(
                        start_row = self.start_row,
                        num_rows = self.num_rows,
                        buffer_size,
                        hint = self.data_size_hint,
                        "chunked read"
                    );

                    let btree_root = self.meta.address;
                    self.read_btree_v1(btree_root, &mut buffer, buffer_offset, &mut scratch)?;
                }
                LayoutClass::Unknown => {
                    if self.error_checking {
                        return Err(FormatError::InvalidLayoutClass(255));
                    }
                }
            }
        }

        Ok(DatasetRead {
            type_size: self.meta.type_size,
            elements: buffer_size / self.meta.type_size,
            num_rows: self.num_rows,
            num_cols,
            type_class: self.meta.type_class,
            data: buffer,
        })
    }
}
