//! HDF5 superblock parsing (versions 0 and 2).

use tracing::debug;

use crate::error::FormatError;
use crate::session::FileSession;

/// The 8-byte HDF5 signature, little-endian.
pub const H5_SIGNATURE_LE: u64 = 0x0A1A_0A0D_4644_4889;

impl FileSession {
    /// Parse the superblock at file offset 0.
    ///
    /// Populates the session's offset/length sizes and returns the
    /// root group object header address.
    pub fn read_superblock(&mut self) -> Result<u64, FormatError> {
        let mut pos = 0;
        let signature = self.read_field(8, &mut pos)?;
        if signature != H5_SIGNATURE_LE {
            return Err(FormatError::InvalidSignature {
                structure: "superblock",
                found: signature,
            });
        }

        let version = self.read_field(1, &mut pos)?;
        match version {
            0 => self.read_superblock_v0(),
            2 => self.read_superblock_v2(),
            v => Err(FormatError::UnsupportedVersion {
                structure: "superblock",
                version: v,
            }),
        }
    }

    fn read_superblock_v0(&mut self) -> Result<u64, FormatError> {
        if self.error_checking {
            let mut pos = 9;
            for structure in ["free space version", "root table version", "header message version"]
            {
                let version = self.read_field(1, &mut pos)?;
                if version != 0 {
                    return Err(FormatError::UnsupportedVersion { structure, version });
                }
            }
        }

        let mut pos = 13;
        self.meta.offset_size = self.read_field(1, &mut pos)?;
        self.meta.length_size = self.read_field(1, &mut pos)?;
        let leaf_k = self.read_field(2, &mut pos)?;
        let internal_k = self.read_field(2, &mut pos)?;

        let mut pos = 64;
        let root_group_offset = self.read_offset(&mut pos)?;

        if self.verbose {
            debug!(
                offset_size = self.meta.offset_size,
                length_size = self.meta.length_size,
                leaf_k,
                internal_k,
                root = format_args!("0x{root_group_offset:x}"),
                "superblock v0"
            );
        }

        Ok(root_group_offset)
    }

    fn read_superblock_v2(&mut self) -> Result<u64, FormatError> {
        let mut pos = 9;
        self.meta.offset_size = self.read_field(1, &mut pos)?;
        self.meta.length_size = self.read_field(1, &mut pos)?;
        let _consistency_flags = self.read_field(1, &mut pos)?;

        let _base_address = self.read_offset(&mut pos)?;
        let _extension_address = self.read_offset(&mut pos)?;
        let _eof_address = self.read_offset(&mut pos)?;
        let root_group_offset = self.read_offset(&mut pos)?;
        let _checksum = self.read_field(4, &mut pos)?;

        if self.verbose {
            debug!(
                offset_size = self.meta.offset_size,
                length_size = self.meta.length_size,
                root = format_args!("0x{root_group_offset:x}"),
                "superblock v2"
            );
        }

        Ok(root_group_offset)
    }
}
