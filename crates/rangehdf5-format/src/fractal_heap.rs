//! Fractal heap traversal for dense (new-style) group link storage.
//!
//! The heap holds LINK messages as managed objects. The walker does
//! not decode heap ids; it sweeps every direct block in heap order and
//! parses the packed messages until a zero peek or block exhaustion,
//! stopping as soon as the dataset path matches one level deeper.

use tracing::debug;

use crate::error::FormatError;
use crate::message_type::MessageType;
use crate::meta::is_invalid_address;
use crate::session::FileSession;

/// `FRHP`, little-endian.
pub const FRHP_SIGNATURE_LE: u64 = u32::from_le_bytes(*b"FRHP") as u64;
/// `FHDB`, little-endian.
pub const FHDB_SIGNATURE_LE: u64 = u32::from_le_bytes(*b"FHDB") as u64;
/// `FHIB`, little-endian.
pub const FHIB_SIGNATURE_LE: u64 = u32::from_le_bytes(*b"FHIB") as u64;

const FRHP_CHECKSUM_DIRECT_BLOCKS: u64 = 0x02;

/// Carries the doubling-table geometry of one heap traversal.
pub(crate) struct HeapWalkState {
    table_width: u64,
    curr_num_rows: u64,
    starting_blk_size: u64,
    max_dblk_size: u64,
    blk_offset_size: u64,
    dblk_checksum: bool,
    msg_type: MessageType,
    num_objects: u64,
    cur_objects: u64,
}

/// Position of the highest set bit, 0 for 0.
fn highest_bit(value: u64) -> u64 {
    (64 - value.leading_zeros() as u64).saturating_sub(1)
}

impl FileSession {
    /// Walk the fractal heap at `pos`, parsing `msg_type` messages out
    /// of its direct blocks.
    pub(crate) fn read_fractal_heap(
        &mut self,
        msg_type: MessageType,
        pos: u64,
        hdr_flags: u64,
        dlvl: usize,
    ) -> Result<u64, FormatError> {
        let starting_position = pos;
        let mut pos = pos;

        if self.error_checking {
            let signature = self.read_field(4, &mut pos)?;
            if signature != FRHP_SIGNATURE_LE {
                return Err(FormatError::InvalidSignature {
                    structure: "fractal heap",
                    found: signature,
                });
            }
            let version = self.read_field(1, &mut pos)?;
            if version != 0 {
                return Err(FormatError::UnsupportedVersion {
                    structure: "fractal heap",
                    version,
                });
            }
        } else {
            pos += 5;
        }

        let _heap_obj_id_len = self.read_field(2, &mut pos)?;
        let io_filter_len = self.read_field(2, &mut pos)?;
        let flags = self.read_field(1, &mut pos)?;
        let _max_size_mg_obj = self.read_field(4, &mut pos)?;
        let _next_huge_obj_id = self.read_length(&mut pos)?;
        let _btree_addr_huge_obj = self.read_offset(&mut pos)?;
        let _free_space_mg_blks = self.read_length(&mut pos)?;
        let _addr_free_space_mg = self.read_offset(&mut pos)?;
        let _mg_space = self.read_length(&mut pos)?;
        let _alloc_mg_space = self.read_length(&mut pos)?;
        let _dblk_alloc_iter = self.read_length(&mut pos)?;
        let mg_objs = self.read_length(&mut pos)?;
        let _huge_obj_size = self.read_length(&mut pos)?;
        let _huge_objs = self.read_length(&mut pos)?;
        let _tiny_obj_size = self.read_length(&mut pos)?;
        let _tiny_objs = self.read_length(&mut pos)?;
        let table_width = self.read_field(2, &mut pos)?;
        let starting_blk_size = self.read_length(&mut pos)?;
        let max_dblk_size = self.read_length(&mut pos)?;
        let max_heap_size = self.read_field(2, &mut pos)?;
        let _start_num_rows = self.read_field(2, &mut pos)?;
        let root_blk_addr = self.read_offset(&mut pos)?;
        let curr_num_rows = self.read_field(2, &mut pos)?;

        if self.verbose {
            debug!(
                dlvl,
                table_width,
                starting_blk_size,
                max_dblk_size,
                curr_num_rows,
                root = format_args!("0x{root_blk_addr:x}"),
                "fractal heap"
            );
        }

        if io_filter_len > 0 {
            return Err(FormatError::UnsupportedFeature("filtering on fractal heap"));
        }

        let _checksum = self.read_field(4, &mut pos)?;

        let mut heap = HeapWalkState {
            table_width,
            curr_num_rows,
            starting_blk_size,
            max_dblk_size,
            blk_offset_size: (max_heap_size + 7) / 8,
            dblk_checksum: flags & FRHP_CHECKSUM_DIRECT_BLOCKS != 0,
            msg_type,
            num_objects: mg_objs,
            cur_objects: 0,
        };

        if heap.curr_num_rows == 0 {
            let block_size = heap.starting_blk_size;
            let bytes_read = self.read_direct_block(&mut heap, block_size, root_blk_addr, hdr_flags, dlvl)?;
            if self.error_checking && bytes_read > heap.starting_blk_size {
                return Err(FormatError::HeapBlockOverrun {
                    read: bytes_read,
                    block: heap.starting_blk_size,
                });
            }
            pos += heap.starting_blk_size;
        } else {
            let bytes_read = self.read_indirect_block(&mut heap, 0, root_blk_addr, hdr_flags, dlvl)?;
            pos += bytes_read;
        }

        if self.verbose {
            debug!(
                parsed = heap.cur_objects,
                managed = heap.num_objects,
                "fractal heap walk done"
            );
        }

        Ok(pos - starting_position)
    }

    fn read_direct_block(
        &mut self,
        heap: &mut HeapWalkState,
        block_size: u64,
        pos: u64,
        hdr_flags: u64,
        dlvl: usize,
    ) -> Result<u64, FormatError> {
        let starting_position = pos;
        let mut pos = pos;

        if self.error_checking {
            let signature = self.read_field(4, &mut pos)?;
            if signature != FHDB_SIGNATURE_LE {
                return Err(FormatError::InvalidSignature {
                    structure: "direct block",
                    found: signature,
                });
            }
            let version = self.read_field(1, &mut pos)?;
            if version != 0 {
                return Err(FormatError::UnsupportedVersion {
                    structure: "direct block",
                    version,
                });
            }
        } else {
            pos += 5;
        }

        // Heap header address + this block's offset in heap space.
        pos += self.meta.offset_size + heap.blk_offset_size;
        if heap.dblk_checksum {
            pos += 4;
        }

        let header_size =
            5 + self.meta.offset_size + heap.blk_offset_size + (heap.dblk_checksum as u64) * 4;
        let mut data_left = block_size.saturating_sub(header_size);

        while data_left > 0 {
            // A run of zeros where the next message would start means
            // the rest of the block is free space.
            let mut peek_addr = pos;
            let peek_size = (1 << highest_bit(data_left)).min(8);
            if self.read_field(peek_size, &mut peek_addr)? == 0 {
                break;
            }

            let data_read = self.read_message(heap.msg_type, data_left, pos, hdr_flags, false, dlvl)?;
            if self.error_checking && data_read > data_left {
                return Err(FormatError::HeapBlockOverrun {
                    read: data_read,
                    block: data_left,
                });
            }
            pos += data_read;
            data_left -= data_read;

            // More links than managed objects is normal; the object
            // count cannot terminate this loop.
            heap.cur_objects += 1;

            if self.highest_data_level > dlvl {
                break; // dataset found
            }
        }

        pos += data_left;

        Ok(pos - starting_position)
    }

    fn read_indirect_block(
        &mut self,
        heap: &mut HeapWalkState,
        block_size: u64,
        pos: u64,
        hdr_flags: u64,
        dlvl: usize,
    ) -> Result<u64, FormatError> {
        let starting_position = pos;
        let mut pos = pos;

        if self.error_checking {
            let signature = self.read_field(4, &mut pos)?;
            if signature != FHIB_SIGNATURE_LE {
                return Err(FormatError::InvalidSignature {
                    structure: "indirect block",
                    found: signature,
                });
            }
            let version = self.read_field(1, &mut pos)?;
            if version != 0 {
                return Err(FormatError::UnsupportedVersion {
                    structure: "indirect block",
                    version,
                });
            }
        } else {
            pos += 5;
        }

        pos += self.meta.offset_size + heap.blk_offset_size;

        // Rows in this block: the root indirect block uses the header
        // count, nested ones derive it from their block size.
        let mut nrows = heap.curr_num_rows;
        if block_size > 0 {
            nrows = highest_bit(block_size)
                - highest_bit(heap.starting_blk_size * heap.table_width)
                + 1;
        }

        for row in 0..nrows {
            let row_block_size = if row <= 1 {
                heap.starting_blk_size
            } else {
                heap.starting_blk_size << (row - 1)
            };

            for _entry in 0..heap.table_width {
                let child_addr = self.read_offset(&mut pos)?;
                let offset_size = self.meta.offset_size;
                if is_invalid_address(child_addr, offset_size) || dlvl < self.highest_data_level {
                    continue;
                }

                if row_block_size <= heap.max_dblk_size {
                    let bytes_read =
                        self.read_direct_block(heap, row_block_size, child_addr, hdr_flags, dlvl)?;
                    if self.error_checking && bytes_read > row_block_size {
                        return Err(FormatError::HeapBlockOverrun {
                            read: bytes_read,
                            block: row_block_size,
                        });
                    }
                } else {
                    self.read_indirect_block(heap, row_block_size, child_addr, hdr_flags, dlvl)?;
                }
            }
        }

        let _checksum = self.read_field(4, &mut pos)?;

        Ok(pos - starting_position)
    }
}
