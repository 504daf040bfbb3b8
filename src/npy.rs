//! Single-array NPY framing: magic, version, header length, header text,
//! payload.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

use crate::codecs::{decode_payload, encode_payload};
use crate::error::{NpyError, NpyResult};
use crate::metadata::Header;
use crate::types::Array;

/// Leading bytes of every NPY stream.
pub const MAGIC: [u8; 6] = *b"\x93NUMPY";

/// Version written by [`write_array`]. Version 1 uses a 2-byte header length.
pub const WRITE_VERSION: [u8; 2] = [1, 0];

/// The magic, version and header length must end on this boundary.
pub const HEADER_ALIGNMENT: usize = 16;

/// File extension of an NPY entry, also used for NPZ entry names.
pub const NPY_SUFFIX: &str = ".npy";

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Read the magic, version and length prefix, and return the raw header text.
pub fn read_header_text<R: Read>(reader: &mut R) -> NpyResult<String> {
    let mut magic = [0u8; MAGIC.len()];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(NpyError::Format("magic string mismatch".into()));
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let header_len = match version[0] {
        1 => reader.read_u16::<LittleEndian>()? as usize,
        2 => reader.read_u32::<LittleEndian>()? as usize,
        major => {
            return Err(NpyError::Format(format!(
                "unsupported version {major}.{}",
                version[1]
            )));
        }
    };

    let mut text = Vec::new();
    reader.by_ref().take(header_len as u64).read_to_end(&mut text)?;
    if text.len() != header_len {
        return Err(NpyError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("header ended after {} of {header_len} bytes", text.len()),
        )));
    }
    String::from_utf8(text)
        .map_err(|e| NpyError::Format(format!("header is not valid text: {e}")))
}

/// Read and parse the header, leaving `reader` positioned at the payload.
/// Column-major headers are refused.
pub fn read_header<R: Read>(reader: &mut R) -> NpyResult<Header> {
    let text = read_header_text(reader)?;
    let header = Header::parse(&text)?;
    if header.fortran_order {
        return Err(NpyError::Format("fortran order not supported".into()));
    }
    Ok(header)
}

/// Decode a complete array.
pub fn read_array<R: Read>(reader: &mut R) -> NpyResult<Array> {
    let header = read_header(reader)?;
    let data = decode_payload(reader, header.dtype, &header.shape)?;
    Array::new(data, header.shape)
}

/// Decode the array stored in the NPY file at `path`.
pub fn read_npy(path: impl AsRef<Path>) -> NpyResult<Array> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading npy file");
    let mut reader = BufReader::new(File::open(path)?);
    read_array(&mut reader)
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Header text padded with spaces and a final newline so that the prefix
/// (magic + version + 2-byte length + text) is a multiple of
/// [`HEADER_ALIGNMENT`].
pub fn padded_header_text(header: &Header) -> NpyResult<String> {
    let mut text = header.render()?;
    // the trailing newline counts toward the prefix
    let prefix_len = MAGIC.len() + WRITE_VERSION.len() + 2 + text.len() + 1;
    let pad = (HEADER_ALIGNMENT - prefix_len % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
    text.extend(std::iter::repeat_n(' ', pad));
    text.push('\n');
    Ok(text)
}

/// Write the full framing for `header`: magic, version 1.0, length and
/// padded header text.
pub fn write_header<W: Write>(writer: &mut W, header: &Header) -> NpyResult<()> {
    let text = padded_header_text(header)?;
    let len = u16::try_from(text.len()).map_err(|_| {
        NpyError::Format(format!(
            "header of {} bytes does not fit a version 1.0 length field",
            text.len()
        ))
    })?;

    writer.write_all(&MAGIC)?;
    writer.write_all(&WRITE_VERSION)?;
    writer.write_u16::<LittleEndian>(len)?;
    writer.write_all(text.as_bytes())?;
    Ok(())
}

/// Encode `array` as NPY. Nothing is written for bf16 or f8e4m3 arrays.
pub fn write_array<W: Write>(writer: &mut W, array: &Array) -> NpyResult<()> {
    let header = Header::new(array.dtype(), array.shape().clone());
    write_header(writer, &header)?;
    encode_payload(writer, array.data())
}

/// Write `array` to a new NPY file at `path`, replacing any existing file.
pub fn write_npy(path: impl AsRef<Path>, array: &Array) -> NpyResult<()> {
    let path = path.as_ref();
    debug!(path = %path.display(), dtype = %array.dtype(), shape = %array.shape(), "writing npy file");
    let mut writer = BufWriter::new(File::create(path)?);
    write_array(&mut writer, array)?;
    writer.flush()?;
    Ok(())
}

impl Array {
    /// Encode this array as an in-memory NPY buffer.
    pub fn to_npy_bytes(&self) -> NpyResult<Vec<u8>> {
        let mut out = Vec::with_capacity(128 + self.data().byte_len());
        write_array(&mut out, self)?;
        Ok(out)
    }

    /// Decode an array from an in-memory NPY buffer.
    pub fn from_npy_bytes(mut bytes: &[u8]) -> NpyResult<Self> {
        read_array(&mut bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArrayData, ElementType, Shape};
    use half::{bf16, f16};
    use pretty_assertions::assert_eq;

    fn npy_with_header(version: [u8; 2], text: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.extend_from_slice(&version);
        match version[0] {
            2 => out.extend_from_slice(&(text.len() as u32).to_le_bytes()),
            _ => out.extend_from_slice(&(text.len() as u16).to_le_bytes()),
        }
        out.extend_from_slice(text.as_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn f32_payload(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn writes_f32_matrix() {
        let array = Array::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], [2, 2]).unwrap();
        let bytes = array.to_npy_bytes().unwrap();

        assert_eq!(&bytes[..6], b"\x93NUMPY");
        assert_eq!(&bytes[6..8], b"\x01\x00");
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % 16, 0);
        assert_eq!(bytes[10 + header_len - 1], b'\n');
        assert_eq!(bytes.len(), 10 + header_len + 16);

        let back = Array::from_npy_bytes(&bytes).unwrap();
        assert_eq!(back.shape(), &Shape::from([2, 2]));
        assert_eq!(back.dtype(), ElementType::F32);
        assert_eq!(back.as_slice::<f32>().unwrap(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn payload_starts_on_alignment_boundary() {
        let shapes: [&[usize]; 4] = [&[], &[5], &[2, 2], &[1, 1, 4]];
        for dims in shapes {
            let shape = Shape::from(dims);
            let array = Array::from_vec(vec![0.25f32; shape.elem_count()], shape.clone()).unwrap();
            let bytes = array.to_npy_bytes().unwrap();
            let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
            assert_eq!((10 + header_len) % HEADER_ALIGNMENT, 0, "shape {shape}");
            assert_eq!(bytes.len() - (10 + header_len), 4 * shape.elem_count());
        }
    }

    #[test]
    fn header_text_matches_numpy_layout() {
        let array = Array::from_vec(vec![7i64; 3], [3]).unwrap();
        let bytes = array.to_npy_bytes().unwrap();
        let text = read_header_text(&mut bytes.as_slice()).unwrap();
        assert!(text.starts_with("{'descr': '<i8', 'fortran_order': False, 'shape': (3,), }"));
        assert!(text.ends_with(" \n") || text.ends_with("}\n"));
    }

    #[test]
    fn round_trips_every_writable_type_and_shape() {
        let shapes: [&[usize]; 4] = [&[], &[5], &[2, 3], &[1, 1, 4]];
        for dims in shapes {
            let shape = Shape::from(dims);
            let n = shape.elem_count();
            let buffers = [
                ArrayData::U8((0..n).map(|i| i as u8).collect()),
                ArrayData::U32((0..n).map(|i| i as u32 * 1000).collect()),
                ArrayData::I64((0..n).map(|i| -(i as i64) * 7).collect()),
                ArrayData::F16((0..n).map(|i| f16::from_f32(i as f32 / 4.0)).collect()),
                ArrayData::F32((0..n).map(|i| i as f32 * 1.5).collect()),
                ArrayData::F64((0..n).map(|i| i as f64 / 3.0).collect()),
            ];
            for data in buffers {
                let array = Array::new(data, shape.clone()).unwrap();
                let bytes = array.to_npy_bytes().unwrap();
                let back = Array::from_npy_bytes(&bytes).unwrap();
                assert_eq!(back, array, "{} {}", array.dtype(), shape);
            }
        }
    }

    #[test]
    fn reads_version_2_headers() {
        let text = "{'descr': '<f4', 'fortran_order': False, 'shape': (2,), }\n";
        let bytes = npy_with_header([2, 0], text, &f32_payload(&[0.5, 1.5]));
        let array = Array::from_npy_bytes(&bytes).unwrap();
        assert_eq!(array.as_slice::<f32>().unwrap(), &[0.5, 1.5]);
    }

    #[test]
    fn rejects_unknown_versions() {
        let text = "{'descr': '<f4', 'fortran_order': False, 'shape': (1,), }\n";
        let bytes = npy_with_header([3, 0], text, &f32_payload(&[1.0]));
        let err = Array::from_npy_bytes(&bytes).unwrap_err();
        assert!(matches!(err, NpyError::Format(msg) if msg.contains("version")));
    }

    #[test]
    fn rejects_corrupted_magic() {
        let array = Array::from_vec(vec![1u8, 2, 3], [3]).unwrap();
        let mut bytes = array.to_npy_bytes().unwrap();
        bytes[1] = b'n';
        let err = Array::from_npy_bytes(&bytes).unwrap_err();
        assert!(matches!(err, NpyError::Format(msg) if msg.contains("magic")));
    }

    #[test]
    fn rejects_fortran_order() {
        let text = "{'descr': '<f4', 'fortran_order': True, 'shape': (2, 2), }\n";
        let bytes = npy_with_header([1, 0], text, &f32_payload(&[1.0, 2.0, 3.0, 4.0]));
        let err = Array::from_npy_bytes(&bytes).unwrap_err();
        assert!(matches!(err, NpyError::Format(msg) if msg.contains("fortran")));
    }

    #[test]
    fn rejects_big_endian_descr() {
        let text = "{'descr': '>f4', 'fortran_order': False, 'shape': (1,), }\n";
        let bytes = npy_with_header([1, 0], text, &[0x3f, 0x80, 0, 0]);
        let err = Array::from_npy_bytes(&bytes).unwrap_err();
        assert!(matches!(err, NpyError::Format(msg) if msg.contains("big-endian")));
    }

    #[test]
    fn bool_arrays_decode_as_unsigned_bytes() {
        let text = "{'descr': '|b1', 'fortran_order': False, 'shape': (3,), }\n";
        let bytes = npy_with_header([1, 0], text, &[1, 0, 1]);
        let array = Array::from_npy_bytes(&bytes).unwrap();
        assert_eq!(array.dtype(), ElementType::U8);
        assert_eq!(array.as_slice::<u8>().unwrap(), &[1, 0, 1]);
    }

    #[test]
    fn truncated_streams_are_io_errors() {
        let array = Array::from_vec(vec![1.0f64, 2.0], [2]).unwrap();
        let bytes = array.to_npy_bytes().unwrap();
        for cut in [3, 9, 20, bytes.len() - 1] {
            let err = Array::from_npy_bytes(&bytes[..cut]).unwrap_err();
            assert!(matches!(err, NpyError::Io(_)), "cut at {cut}: {err}");
        }
    }

    #[test]
    fn refuses_to_write_read_only_types() {
        let bf = Array::from_vec(vec![bf16::ONE], [1]).unwrap();
        assert!(matches!(bf.to_npy_bytes(), Err(NpyError::UnsupportedType(_))));

        let f8 = Array::new(ArrayData::F8E4M3(vec![0x38]), [1]).unwrap();
        let mut out = Vec::new();
        assert!(matches!(write_array(&mut out, &f8), Err(NpyError::UnsupportedType(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn file_helpers_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.npy");
        let array = Array::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], [2, 2]).unwrap();

        write_npy(&path, &array).unwrap();
        let back = read_npy(&path).unwrap();
        assert_eq!(back, array);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_npy(dir.path().join("absent.npy")).unwrap_err();
        assert!(matches!(err, NpyError::Io(e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prefix_is_always_aligned(
                dims in prop::collection::vec(0usize..1_000_000_000, 0..8),
            ) {
                let header = Header::new(ElementType::F64, Shape(dims));
                let text = padded_header_text(&header).unwrap();
                prop_assert_eq!((MAGIC.len() + 2 + 2 + text.len()) % HEADER_ALIGNMENT, 0);
                prop_assert!(text.ends_with('\n'));
            }

            #[test]
            fn f64_values_survive_encoding(values in prop::collection::vec(any::<f64>(), 0..64)) {
                let n = values.len();
                let array = Array::from_vec(values.clone(), [n]).unwrap();
                let back = Array::from_npy_bytes(&array.to_npy_bytes().unwrap()).unwrap();
                let decoded = back.into_vec::<f64>().unwrap();
                let same_bits = decoded.iter().zip(&values).all(|(a, b)| a.to_bits() == b.to_bits());
                prop_assert!(same_bits);
            }
        }
    }
}
