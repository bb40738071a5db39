//! B-tree v1 type 1 traversal: the chunk index of chunked datasets.
//!
//! Keys carry the chunk's starting slice coordinates in element units;
//! only children whose row-key range overlaps the requested row range
//! are visited. Matching leaf chunks are fetched, run through the
//! filter pipeline, and copied into the output buffer window.

use rangehdf5_filters::{inflate_into, unshuffle};
use tracing::trace;

use crate::error::FormatError;
use crate::group::TREE_SIGNATURE_LE;
use crate::meta::{FILTER_DEFLATE, FILTER_SHUFFLE, MAX_NDIMS};
use crate::session::FileSession;

use rangehdf5_io::cache::L1_LINE;

/// One key slot of a chunk B-tree node.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BTreeNodeV1 {
    /// Chunk byte size on file (after filters).
    chunk_size: u32,
    /// Per-filter exclusion mask (0 = all filters applied).
    #[allow(dead_code)]
    filter_mask: u32,
    /// Starting slice coordinates, element units.
    slice: [u64; MAX_NDIMS],
    /// First slice coordinate: the row this chunk starts at.
    row_key: u64,
}

impl FileSession {
    /// Traverse the chunk B-tree node at `pos`, copying overlapping
    /// leaf chunks into `buffer` (the window starting `buffer_offset`
    /// bytes into the dataset). `scratch` holds one decompressed
    /// chunk.
    pub(crate) fn read_btree_v1(
        &mut self,
        pos: u64,
        buffer: &mut [u8],
        buffer_offset: u64,
        scratch: &mut [u8],
    ) -> Result<(), FormatError> {
        let starting_position = pos;
        let mut pos = pos;
        let data_key1 = self.start_row;
        let data_key2 = self.start_row + self.num_rows - 1;

        if self.error_checking {
            let signature = self.read_field(4, &mut pos)?;
            if signature != TREE_SIGNATURE_LE {
                return Err(FormatError::InvalidSignature {
                    structure: "chunk b-tree",
                    found: signature,
                });
            }
            let node_type = self.read_field(1, &mut pos)?;
            if node_type != 1 {
                return Err(FormatError::UnsupportedFeature(
                    "only raw data chunk b-trees supported",
                ));
            }
        } else {
            pos += 5;
        }

        let node_level = self.read_field(1, &mut pos)?;
        let entries_used = self.read_field(2, &mut pos)?;
        trace!(
            node = format_args!("0x{starting_position:x}"),
            node_level,
            entries_used,
            "chunk b-tree node"
        );

        // Sibling addresses are not needed: overlap pruning drives the
        // descent.
        pos += self.meta.offset_size * 2;

        let mut curr_node = self.read_btree_node_v1(&mut pos)?;

        for _ in 0..entries_used {
            let mut child_addr = self.read_offset(&mut pos)?;
            let next_node = self.read_btree_node_v1(&mut pos)?;

            let child_key1 = curr_node.row_key;
            let mut child_key2 = next_node.row_key;
            if next_node.chunk_size == 0 && self.meta.ndims > 0 {
                // The final key is synthetic; close the range at the
                // dataset's first extent.
                child_key2 = self.meta.dimensions[0];
            }

            let overlaps = (data_key1 >= child_key1 && data_key1 < child_key2)
                || (data_key2 >= child_key1 && data_key2 < child_key2)
                || (child_key1 >= data_key1 && child_key1 <= data_key2)
                || (child_key2 > data_key1 && child_key2 < data_key2);

            if overlaps {
                if node_level > 0 {
                    self.read_btree_v1(child_addr, buffer, buffer_offset, scratch)?;
                } else {
                    self.read_chunk(&curr_node, &mut child_addr, buffer, buffer_offset, scratch)?;
                }
            }

            curr_node = next_node;
        }

        Ok(())
    }

    /// Read one key out of a node.
    fn read_btree_node_v1(&mut self, pos: &mut u64) -> Result<BTreeNodeV1, FormatError> {
        let mut node = BTreeNodeV1 {
            chunk_size: self.read_field(4, pos)? as u32,
            filter_mask: self.read_field(4, pos)? as u32,
            ..BTreeNodeV1::default()
        };
        for d in 0..self.meta.ndims {
            node.slice[d] = self.read_field(8, pos)?;
        }

        let trailing = self.read_field(8, pos)?;
        if self.error_checking && trailing % self.meta.type_size != 0 {
            return Err(FormatError::InvalidChunkKey(trailing));
        }

        node.row_key = node.slice[0];
        Ok(node)
    }

    /// Fetch a leaf chunk, apply filters, and copy the overlapping
    /// bytes into the output window.
    fn read_chunk(
        &mut self,
        node: &BTreeNodeV1,
        child_addr: &mut u64,
        buffer: &mut [u8],
        buffer_offset: u64,
        scratch: &mut [u8],
    ) -> Result<(), FormatError> {
        let type_size = self.meta.type_size;
        let buffer_size = buffer.len() as u64;
        let scratch_size = scratch.len() as u64;

        // Byte offset of this chunk within the dataset, row-major.
        let mut chunk_offset = 0u64;
        for i in 0..self.meta.ndims {
            let mut slice_size = node.slice[i] * type_size;
            for j in i + 1..self.meta.ndims {
                slice_size *= self.meta.dimensions[j];
            }
            chunk_offset += slice_size;
        }

        // Where the chunk lands in the output buffer.
        let mut buffer_index = 0u64;
        if chunk_offset > buffer_offset {
            buffer_index = chunk_offset - buffer_offset;
            if buffer_index >= buffer_size {
                return Err(FormatError::ChunkOutOfBounds {
                    chunk_offset,
                    buffer_offset,
                });
            }
        }

        // Where the requested window starts inside the chunk.
        let mut chunk_index = 0u64;
        if buffer_offset > chunk_offset {
            chunk_index = buffer_offset - chunk_offset;
            if chunk_index >= scratch_size {
                return Err(FormatError::ChunkOutOfBounds {
                    chunk_offset,
                    buffer_offset,
                });
            }
        }

        let mut chunk_bytes = scratch_size - chunk_index;
        if buffer_index + chunk_bytes > buffer_size {
            chunk_bytes = buffer_size - buffer_index;
        }

        let bi = buffer_index as usize;
        let ci = chunk_index as usize;
        let cb = chunk_bytes as usize;

        if self.meta.filter[FILTER_DEFLATE] {
            let hint = self.data_size_hint;
            let (slice, fresh) = self.request(node.chunk_size as u64, child_addr, hint)?;
            if fresh {
                self.data_size_hint = L1_LINE;
            }
            let compressed = slice.bytes();

            if chunk_bytes == scratch_size && !self.meta.filter[FILTER_SHUFFLE] {
                // Whole chunk, no shuffle: inflate straight into place.
                inflate_into(compressed, &mut buffer[bi..bi + cb])?;
            } else {
                inflate_into(compressed, scratch)?;
                if self.meta.filter[FILTER_SHUFFLE] {
                    unshuffle(scratch, &mut buffer[bi..bi + cb], ci, type_size as usize)?;
                } else {
                    buffer[bi..bi + cb].copy_from_slice(&scratch[ci..ci + cb]);
                }
            }
        } else {
            if self.error_checking {
                if self.meta.filter[FILTER_SHUFFLE] {
                    return Err(FormatError::UnsupportedFeature(
                        "shuffle filter on uncompressed chunk",
                    ));
                }
                if chunk_bytes == scratch_size && node.chunk_size as u64 != chunk_bytes {
                    return Err(FormatError::ChunkSizeMismatch {
                        stored: node.chunk_size as u64,
                        expected: chunk_bytes,
                    });
                }
            }

            let hint = self.data_size_hint;
            let (slice, fresh) = self.request(node.chunk_size as u64, child_addr, hint)?;
            if fresh {
                self.data_size_hint = L1_LINE;
            }
            buffer[bi..bi + cb].copy_from_slice(&slice.bytes()[ci..ci + cb]);
        }

        Ok(())
    }
}
