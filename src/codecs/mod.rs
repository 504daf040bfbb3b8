//! Element payload codec: typed buffers to and from the raw little-endian
//! bytes that follow an NPY header.

pub mod bytes;

use std::io::{self, Read, Write};

use crate::error::{NpyError, NpyResult};
use crate::types::{ArrayData, ElementType, Shape};

/// Number of payload bytes an array of `dtype` and `shape` occupies.
pub fn payload_len(dtype: ElementType, shape: &Shape) -> NpyResult<usize> {
    shape
        .checked_elem_count()
        .and_then(|n| n.checked_mul(dtype.byte_size()))
        .ok_or_else(|| NpyError::Format(format!("payload size overflows for shape {shape}")))
}

/// Read exactly `shape.elem_count()` elements of `dtype` from `reader`.
///
/// A stream that ends early yields an `UnexpectedEof` I/O error.
pub fn decode_payload<R: Read>(
    reader: &mut R,
    dtype: ElementType,
    shape: &Shape,
) -> NpyResult<ArrayData> {
    let expected = payload_len(dtype, shape)?;

    // Grow the buffer as bytes arrive rather than trusting the header's size.
    let mut raw = Vec::new();
    reader.by_ref().take(expected as u64).read_to_end(&mut raw)?;
    if raw.len() != expected {
        return Err(NpyError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "payload ended after {} of {expected} bytes for {dtype} {shape}",
                raw.len()
            ),
        )));
    }

    bytes::bytes_to_array_data(dtype, &raw)
}

/// Write `data` as raw little-endian bytes. bf16 and f8e4m3 are refused.
pub fn encode_payload<W: Write>(writer: &mut W, data: &ArrayData) -> NpyResult<()> {
    let dtype = data.dtype();
    if !dtype.is_writable() {
        return Err(NpyError::UnsupportedType(format!(
            "{dtype} is not supported for writing"
        )));
    }

    match data {
        ArrayData::U8(v) => writer.write_all(v)?,
        other => writer.write_all(&bytes::array_data_to_bytes(other))?,
    }
    Ok(())
}
