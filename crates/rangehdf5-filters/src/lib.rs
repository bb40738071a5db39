//! Chunk filters: DEFLATE inflate and byte unshuffle.
//!
//! Chunked HDF5 datasets may store each chunk zlib-compressed
//! (DEFLATE, filter id 1) and byte-shuffled (SHUFFLE, filter id 2).
//! This crate implements the decode direction of both; the reader
//! never writes.

use std::fmt;

use flate2::{Decompress, FlushDecompress, Status};

/// Errors from the chunk filter stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The zlib stream failed to inflate or did not terminate within
    /// the output buffer.
    Inflate(String),
    /// SHUFFLE was asked to operate on an element size outside [1, 8].
    InvalidTypeSize(usize),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Inflate(what) => write!(f, "failed to inflate chunk: {what}"),
            FilterError::InvalidTypeSize(size) => {
                write!(f, "invalid data size to perform shuffle on: {size}")
            }
        }
    }
}

impl std::error::Error for FilterError {}

/// Inflate a zlib stream into `output`.
///
/// The stream must terminate within `output.len()` bytes; any other
/// outcome fails. Returns the number of bytes produced.
pub fn inflate_into(input: &[u8], output: &mut [u8]) -> Result<usize, FilterError> {
    let mut stream = Decompress::new(true);
    match stream.decompress(input, output, FlushDecompress::Finish) {
        Ok(Status::StreamEnd) => Ok(stream.total_out() as usize),
        Ok(status) => Err(FilterError::Inflate(format!(
            "stream did not end: {status:?}"
        ))),
        Err(e) => Err(FilterError::Inflate(e.to_string())),
    }
}

/// Reverse the HDF5 shuffle filter for a sub-range of a chunk.
///
/// `input` holds one whole decompressed chunk laid out as `type_size`
/// byte planes of `input.len() / type_size` bytes each. The output
/// receives `output.len() / type_size` reconstructed elements starting
/// at element `output_offset / type_size` of the chunk.
pub fn unshuffle(
    input: &[u8],
    output: &mut [u8],
    output_offset: usize,
    type_size: usize,
) -> Result<(), FilterError> {
    if type_size == 0 || type_size > 8 {
        return Err(FilterError::InvalidTypeSize(type_size));
    }

    let plane_len = input.len() / type_size;
    let num_elements = output.len() / type_size;
    let start_element = output_offset / type_size;

    let mut dst = 0;
    for element in start_element..start_element + num_elements {
        for plane in 0..type_size {
            output[dst] = input[plane * plane_len + element];
            dst += 1;
        }
    }

    Ok(())
}
