//! Object header parsing (versions 1 and 2) and the message loop.
//!
//! Headers are walked in file order; every message reader returns the
//! byte count it consumed so the loop can advance and, under error
//! checking, verify the declared message size. The walk short-circuits
//! as soon as the dataset path has been matched one level deeper.

use tracing::trace;

use crate::error::FormatError;
use crate::message_type::MessageType;
use crate::session::FileSession;

/// `OHDR`, little-endian.
pub const OHDR_SIGNATURE_LE: u64 = u32::from_le_bytes(*b"OHDR") as u64;
/// `OCHK`, little-endian.
pub const OCHK_SIGNATURE_LE: u64 = u32::from_le_bytes(*b"OCHK") as u64;

const SIZE_OF_CHUNK_0_MASK: u64 = 0x03;
const ATTR_CREATION_TRACK_BIT: u64 = 0x04;
const STORE_CHANGE_PHASE_BIT: u64 = 0x10;
const FILE_STATS_BIT: u64 = 0x20;

const SIZE_OF_V1_PREFIX: u64 = 8;

impl FileSession {
    /// Read the object header at `pos`, descending into links that
    /// match the dataset path at `dlvl`. Returns the bytes consumed.
    pub fn read_object_header(&mut self, pos: u64, dlvl: usize) -> Result<u64, FormatError> {
        let starting_position = pos;

        // V1 headers have no signature; peek at the version byte.
        let mut peek_pos = pos;
        let peek = self.read_field(1, &mut peek_pos)?;
        if peek == 1 {
            return self.read_object_header_v1(starting_position, dlvl);
        }

        let mut pos = pos;
        if self.error_checking {
            let signature = self.read_field(4, &mut pos)?;
            if signature != OHDR_SIGNATURE_LE {
                return Err(FormatError::InvalidSignature {
                    structure: "object header",
                    found: signature,
                });
            }
            let version = self.read_field(1, &mut pos)?;
            if version != 2 {
                return Err(FormatError::UnsupportedVersion {
                    structure: "object header",
                    version,
                });
            }
        } else {
            pos += 5;
        }

        let hdr_flags = self.read_field(1, &mut pos)?;
        if hdr_flags & FILE_STATS_BIT != 0 {
            pos += 16; // access, modification, change, birth times
        }
        if hdr_flags & STORE_CHANGE_PHASE_BIT != 0 {
            pos += 4; // max compact / min dense attribute counts
        }

        let size_of_chunk0 = self.read_field(1 << (hdr_flags & SIZE_OF_CHUNK_0_MASK), &mut pos)?;
        let end_of_hdr = pos + size_of_chunk0;
        pos += self.read_messages(pos, end_of_hdr, hdr_flags, dlvl)?;

        let _checksum = self.read_field(4, &mut pos)?;

        Ok(pos - starting_position)
    }

    /// Walk compact-form (v2) messages in `[pos, end)`.
    pub(crate) fn read_messages(
        &mut self,
        pos: u64,
        end: u64,
        hdr_flags: u64,
        dlvl: usize,
    ) -> Result<u64, FormatError> {
        let starting_position = pos;
        let mut pos = pos;

        while pos < end {
            let msg_type = self.read_field(1, &mut pos)? as u16;
            let msg_size = self.read_field(2, &mut pos)?;
            let _msg_flags = self.read_field(1, &mut pos)?;
            if hdr_flags & ATTR_CREATION_TRACK_BIT != 0 {
                pos += 2; // creation order
            }

            let bytes_read =
                self.read_message(MessageType::from_u16(msg_type), msg_size, pos, hdr_flags, false, dlvl)?;
            if self.error_checking && bytes_read != msg_size {
                return Err(FormatError::MessageSizeMismatch {
                    read: bytes_read,
                    declared: msg_size,
                });
            }

            if self.highest_data_level > dlvl {
                pos = end; // dataset found
                break;
            }

            pos += bytes_read;
        }

        if self.error_checking && pos != end {
            return Err(FormatError::MessageSizeMismatch {
                read: pos - starting_position,
                declared: end - starting_position,
            });
        }

        Ok(pos - starting_position)
    }

    fn read_object_header_v1(&mut self, pos: u64, dlvl: usize) -> Result<u64, FormatError> {
        let starting_position = pos;
        let mut pos = pos;

        if self.error_checking {
            let version = self.read_field(1, &mut pos)?;
            if version != 1 {
                return Err(FormatError::UnsupportedVersion {
                    structure: "object header",
                    version,
                });
            }
            let reserved = self.read_field(1, &mut pos)?;
            if reserved != 0 {
                return Err(FormatError::InvalidReservedField("object header"));
            }
        } else {
            pos += 2;
        }

        pos += 2; // header message count
        pos += 4; // object reference count

        let obj_hdr_size = self.read_length(&mut pos)?;
        let end_of_hdr = pos + obj_hdr_size;
        pos += self.read_messages_v1(pos, end_of_hdr, 0, dlvl)?;

        Ok(pos - starting_position)
    }

    /// Walk v1-form messages in `[pos, end)`; each message is padded
    /// to an 8-byte boundary.
    pub(crate) fn read_messages_v1(
        &mut self,
        pos: u64,
        end: u64,
        hdr_flags: u64,
        dlvl: usize,
    ) -> Result<u64, FormatError> {
        let starting_position = pos;
        let mut pos = pos;

        while pos < end.saturating_sub(SIZE_OF_V1_PREFIX) {
            let msg_type = self.read_field(2, &mut pos)? as u16;
            let msg_size = self.read_field(2, &mut pos)?;
            let _msg_flags = self.read_field(1, &mut pos)?;

            if self.error_checking {
                let reserved1 = self.read_field(1, &mut pos)?;
                let reserved2 = self.read_field(2, &mut pos)?;
                if reserved1 != 0 && reserved2 != 0 {
                    return Err(FormatError::InvalidReservedField("message header"));
                }
            } else {
                pos += 3;
            }

            let mut bytes_read =
                self.read_message(MessageType::from_u16(msg_type), msg_size, pos, hdr_flags, true, dlvl)?;
            if bytes_read % 8 > 0 {
                bytes_read += 8 - bytes_read % 8;
            }
            if self.error_checking && bytes_read != msg_size {
                return Err(FormatError::MessageSizeMismatch {
                    read: bytes_read,
                    declared: msg_size,
                });
            }

            if self.highest_data_level > dlvl {
                pos = end; // dataset found
                break;
            }

            pos += bytes_read;
        }

        // Move past any trailing gap shorter than a message prefix.
        if pos < end {
            pos = end;
        }

        if self.error_checking && pos != end {
            return Err(FormatError::MessageSizeMismatch {
                read: pos - starting_position,
                declared: end - starting_position,
            });
        }

        Ok(pos - starting_position)
    }

    /// Dispatch a single message. Unknown types are skipped by their
    /// declared size.
    pub(crate) fn read_message(
        &mut self,
        msg_type: MessageType,
        size: u64,
        pos: u64,
        hdr_flags: u64,
        v1: bool,
        dlvl: usize,
    ) -> Result<u64, FormatError> {
        match msg_type {
            MessageType::Dataspace => self.read_dataspace_msg(pos, dlvl),
            MessageType::LinkInfo => self.read_link_info_msg(pos, hdr_flags, dlvl),
            MessageType::Datatype => self.read_datatype_msg(pos, dlvl),
            MessageType::FillValue => self.read_fill_value_msg(pos, dlvl),
            MessageType::Link => self.read_link_msg(pos, dlvl),
            MessageType::DataLayout => self.read_data_layout_msg(pos, dlvl),
            MessageType::FilterPipeline => self.read_filter_msg(pos, dlvl),
            MessageType::HeaderContinuation => self.read_header_cont_msg(pos, hdr_flags, v1, dlvl),
            MessageType::SymbolTable => self.read_symbol_table_msg(pos, dlvl),
            MessageType::Unknown(id) => {
                trace!(id, size, pos = format_args!("0x{pos:x}"), "skipped message");
                Ok(size)
            }
        }
    }

    /// Header continuation: jump to the continuation block and keep
    /// walking messages there.
    fn read_header_cont_msg(
        &mut self,
        pos: u64,
        hdr_flags: u64,
        v1: bool,
        dlvl: usize,
    ) -> Result<u64, FormatError> {
        let mut pos = pos;
        let hc_offset = self.read_offset(&mut pos)?;
        let hc_length = self.read_length(&mut pos)?;

        let mut block_pos = hc_offset;
        if v1 {
            // V1 continuation blocks hold raw v1 messages.
            let end_of_chdr = hc_offset + hc_length;
            self.read_messages_v1(block_pos, end_of_chdr, hdr_flags, dlvl)?;
        } else {
            if self.error_checking {
                let signature = self.read_field(4, &mut block_pos)?;
                if signature != OCHK_SIGNATURE_LE {
                    return Err(FormatError::InvalidSignature {
                        structure: "header continuation",
                        found: signature,
                    });
                }
            } else {
                block_pos += 4;
            }

            // The block's last 4 bytes are its checksum.
            let end_of_chdr = hc_offset + hc_length - 4;
            block_pos += self.read_messages(block_pos, end_of_chdr, hdr_flags, dlvl)?;
            let _checksum = self.read_field(4, &mut block_pos)?;
        }

        Ok(self.meta.offset_size + self.meta.length_size)
    }
}
