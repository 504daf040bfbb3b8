use byteorder::{ByteOrder, LittleEndian};
use half::{bf16, f16};

use crate::error::{NpyError, NpyResult};
use crate::types::{ArrayData, ElementType};

// ---------------------------------------------------------------------------
// Raw little-endian bytes -> typed buffer
// ---------------------------------------------------------------------------

/// Interpret raw little-endian bytes as a typed buffer of `dtype`.
pub fn bytes_to_array_data(dtype: ElementType, data: &[u8]) -> NpyResult<ArrayData> {
    let width = dtype.byte_size();
    if data.len() % width != 0 {
        return Err(NpyError::Format(format!(
            "{} bytes is not a whole number of {dtype} elements",
            data.len()
        )));
    }
    let count = data.len() / width;

    let out = match dtype {
        ElementType::U8 => ArrayData::U8(data.to_vec()),
        ElementType::F8E4M3 => ArrayData::F8E4M3(data.to_vec()),
        ElementType::U32 => ArrayData::U32(read_vec(data, count, LittleEndian::read_u32_into)),
        ElementType::I64 => ArrayData::I64(read_vec(data, count, LittleEndian::read_i64_into)),
        ElementType::F32 => ArrayData::F32(read_vec(data, count, LittleEndian::read_f32_into)),
        ElementType::F64 => ArrayData::F64(read_vec(data, count, LittleEndian::read_f64_into)),
        ElementType::F16 => ArrayData::F16(
            read_vec(data, count, LittleEndian::read_u16_into)
                .into_iter()
                .map(f16::from_bits)
                .collect(),
        ),
        ElementType::BF16 => ArrayData::BF16(
            read_vec(data, count, LittleEndian::read_u16_into)
                .into_iter()
                .map(bf16::from_bits)
                .collect(),
        ),
    };
    Ok(out)
}

fn read_vec<T: Default + Clone>(data: &[u8], count: usize, fill: fn(&[u8], &mut [T])) -> Vec<T> {
    let mut out = vec![T::default(); count];
    fill(data, &mut out);
    out
}

// ---------------------------------------------------------------------------
// Typed buffer -> raw little-endian bytes
// ---------------------------------------------------------------------------

/// Lay out a typed buffer as raw little-endian bytes. Single-byte buffers are
/// copied as they are.
pub fn array_data_to_bytes(data: &ArrayData) -> Vec<u8> {
    match data {
        ArrayData::U8(v) | ArrayData::F8E4M3(v) => v.clone(),
        ArrayData::U32(v) => write_vec(v.as_slice(), 4, LittleEndian::write_u32_into),
        ArrayData::I64(v) => write_vec(v.as_slice(), 8, LittleEndian::write_i64_into),
        ArrayData::F32(v) => write_vec(v.as_slice(), 4, LittleEndian::write_f32_into),
        ArrayData::F64(v) => write_vec(v.as_slice(), 8, LittleEndian::write_f64_into),
        ArrayData::F16(v) => {
            let bits: Vec<u16> = v.iter().map(|x| x.to_bits()).collect();
            write_vec(bits.as_slice(), 2, LittleEndian::write_u16_into)
        }
        ArrayData::BF16(v) => {
            let bits: Vec<u16> = v.iter().map(|x| x.to_bits()).collect();
            write_vec(bits.as_slice(), 2, LittleEndian::write_u16_into)
        }
    }
}

fn write_vec<T>(values: &[T], width: usize, fill: fn(&[T], &mut [u8])) -> Vec<u8> {
    let mut out = vec![0u8; values.len() * width];
    fill(values, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_u32() {
        let data = [1u8, 0, 0, 0, 0, 1, 0, 0];
        let out = bytes_to_array_data(ElementType::U32, &data).unwrap();
        assert_eq!(out, ArrayData::U32(vec![1, 256]));
    }

    #[test]
    fn decodes_half_precision_bits() {
        // 1.0 in f16 is 0x3C00, in bf16 0x3F80
        let out = bytes_to_array_data(ElementType::F16, &[0x00, 0x3C]).unwrap();
        assert_eq!(out, ArrayData::F16(vec![f16::from_f32(1.0)]));
        let out = bytes_to_array_data(ElementType::BF16, &[0x80, 0x3F]).unwrap();
        assert_eq!(out, ArrayData::BF16(vec![bf16::from_f32(1.0)]));
    }

    #[test]
    fn f8e4m3_keeps_raw_bits() {
        let out = bytes_to_array_data(ElementType::F8E4M3, &[0x38, 0xff]).unwrap();
        assert_eq!(out, ArrayData::F8E4M3(vec![0x38, 0xff]));
    }

    #[test]
    fn rejects_partial_element() {
        let err = bytes_to_array_data(ElementType::F64, &[0u8; 12]).unwrap_err();
        assert!(matches!(err, NpyError::Format(_)));
    }

    #[test]
    fn encodes_little_endian() {
        let bytes = array_data_to_bytes(&ArrayData::I64(vec![-2]));
        assert_eq!(bytes, (-2i64).to_le_bytes().to_vec());
        let bytes = array_data_to_bytes(&ArrayData::F32(vec![1.0, 2.0]));
        assert_eq!(bytes, [1.0f32.to_le_bytes(), 2.0f32.to_le_bytes()].concat());
    }
}
