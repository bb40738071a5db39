//! The `Slab`: an owning contiguous buffer plus shape and dtype
//! descriptors, with column extraction and value-type coercion.

use rangehdf5_format::{DataTypeClass, DatasetRead};

use crate::error::{Error, ErrorKind};

/// Value type of a slab, and the coercion a caller may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValType {
    /// Whatever the dataset holds, uncoerced.
    Dynamic,
    /// 32-bit signed integers.
    Integer,
    /// 64-bit floats.
    Real,
    /// Text bytes.
    Text,
}

/// The result of a read: one owned row-major buffer and its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Slab {
    /// Number of elements in `bytes`.
    pub elements: i64,
    /// Total byte size of `bytes`.
    pub byte_size: i64,
    /// Rows along the first dimension.
    pub num_rows: i64,
    /// Columns per row (1 after column extraction).
    pub num_cols: i64,
    /// Bytes per element.
    pub type_size: i32,
    /// Value type of the elements.
    pub dtype: ValType,
    /// The data, little-endian elements in row-major order.
    pub bytes: Vec<u8>,
}

/// Assemble a slab from a raw dataset read: extract the requested
/// column when the data has several, then coerce to the requested
/// value type.
pub(crate) fn build_slab(raw: DatasetRead, valtype: ValType, col: i64) -> Result<Slab, Error> {
    let mut bytes = raw.data;
    let mut elements = raw.elements;
    let mut type_size = raw.type_size;
    let mut num_cols = raw.num_cols;
    let num_rows = raw.num_rows;

    let mut dtype = match raw.type_class {
        DataTypeClass::FixedPoint => ValType::Integer,
        DataTypeClass::FloatingPoint => ValType::Real,
        DataTypeClass::String => ValType::Text,
        _ => ValType::Dynamic,
    };

    if num_rows == 0 {
        // Empty range: zero counts, no buffer.
        return Ok(Slab {
            elements: 0,
            byte_size: 0,
            num_rows: 0,
            num_cols: 0,
            type_size: type_size as i32,
            dtype,
            bytes: Vec::new(),
        });
    }

    if num_cols > 1 {
        if col < 0 || col as u64 >= num_cols {
            return Err(Error::new(
                ErrorKind::Bounds,
                format!("column out of range: {col} of {num_cols}"),
            ));
        }
        bytes = extract_column(&bytes, num_rows, num_cols, col as u64);
        elements /= num_cols;
        num_cols = 1;
    }

    match valtype {
        ValType::Integer => {
            let values = coerce_to_i32(&bytes, dtype, type_size)?;
            bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            type_size = 4;
            dtype = ValType::Integer;
        }
        ValType::Real => {
            let values = coerce_to_f64(&bytes, dtype, type_size)?;
            bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            type_size = 8;
            dtype = ValType::Real;
        }
        ValType::Dynamic | ValType::Text => {}
    }

    Ok(Slab {
        elements: elements as i64,
        byte_size: bytes.len() as i64,
        num_rows: num_rows as i64,
        num_cols: num_cols as i64,
        type_size: type_size as i32,
        dtype,
        bytes,
    })
}

/// Copy one column out of a row-major matrix buffer.
fn extract_column(data: &[u8], num_rows: u64, num_cols: u64, col: u64) -> Vec<u8> {
    let row_bytes = data.len() as u64 / num_rows;
    let col_bytes = row_bytes / num_cols;
    let mut out = Vec::with_capacity((data.len() as u64 / num_cols) as usize);
    for row in 0..num_rows {
        let start = (row * row_bytes + col * col_bytes) as usize;
        out.extend_from_slice(&data[start..start + col_bytes as usize]);
    }
    out
}

fn coerce_to_i32(bytes: &[u8], dtype: ValType, type_size: u64) -> Result<Vec<i32>, Error> {
    let ts = type_size as usize;
    let chunks = bytes.chunks_exact(ts);
    let values = match (dtype, type_size) {
        (ValType::Real, 4) => chunks
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()) as i32)
            .collect(),
        (ValType::Real, 8) => chunks
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()) as i32)
            .collect(),
        (ValType::Integer, 1) => chunks.map(|c| c[0] as i32).collect(),
        (ValType::Integer, 2) => chunks
            .map(|c| u16::from_le_bytes(c.try_into().unwrap()) as i32)
            .collect(),
        (ValType::Integer, 4) => chunks
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()) as i32)
            .collect(),
        (ValType::Integer, 8) => chunks
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()) as i32)
            .collect(),
        _ => {
            return Err(Error::new(
                ErrorKind::Translation,
                format!("data translation failed: {dtype:?}[{type_size}] --> INTEGER"),
            ))
        }
    };
    Ok(values)
}

fn coerce_to_f64(bytes: &[u8], dtype: ValType, type_size: u64) -> Result<Vec<f64>, Error> {
    let ts = type_size as usize;
    let chunks = bytes.chunks_exact(ts);
    let values = match (dtype, type_size) {
        (ValType::Real, 4) => chunks
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()) as f64)
            .collect(),
        (ValType::Real, 8) => chunks
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect(),
        (ValType::Integer, 1) => chunks.map(|c| c[0] as f64).collect(),
        (ValType::Integer, 2) => chunks
            .map(|c| u16::from_le_bytes(c.try_into().unwrap()) as f64)
            .collect(),
        (ValType::Integer, 4) => chunks
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()) as f64)
            .collect(),
        (ValType::Integer, 8) => chunks
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()) as f64)
            .collect(),
        _ => {
            return Err(Error::new(
                ErrorKind::Translation,
                format!("data translation failed: {dtype:?}[{type_size}] --> REAL"),
            ))
        }
    };
    Ok(values)
}
