use half::{bf16, f16};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{NpyError, NpyResult};

/// Location tag given to every decoded array.
pub const DEFAULT_DEVICE: &str = "cpu";

// ---------------------------------------------------------------------------
// ElementType
// ---------------------------------------------------------------------------

/// The closed set of element kinds the codec understands.
///
/// Booleans have no variant of their own: `?` / `b1` descriptors decode as
/// [`ElementType::U8`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    U8,
    U32,
    I64,
    F16,
    BF16,
    F32,
    F64,
    F8E4M3,
}

impl ElementType {
    pub const ALL: [ElementType; 8] = [
        ElementType::U8,
        ElementType::U32,
        ElementType::I64,
        ElementType::F16,
        ElementType::BF16,
        ElementType::F32,
        ElementType::F64,
        ElementType::F8E4M3,
    ];

    /// Number of bytes per element.
    pub fn byte_size(&self) -> usize {
        match self {
            ElementType::U8 | ElementType::F8E4M3 => 1,
            ElementType::F16 | ElementType::BF16 => 2,
            ElementType::U32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::F64 => 8,
        }
    }

    /// Whether arrays of this type can be written out. bf16 and f8e4m3 have
    /// no descriptor in the header grammar and are read-only.
    pub fn is_writable(&self) -> bool {
        !matches!(self, ElementType::BF16 | ElementType::F8E4M3)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ElementType::U8 => "u8",
            ElementType::U32 => "u32",
            ElementType::I64 => "i64",
            ElementType::F16 => "f16",
            ElementType::BF16 => "bf16",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::F8E4M3 => "f8e4m3",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Shape
// ---------------------------------------------------------------------------

/// Ordered dimension sizes. An empty shape is a scalar holding one element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(pub Vec<usize>);

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Shape(dims.into())
    }

    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Number of elements, saturating at `usize::MAX`.
    pub fn elem_count(&self) -> usize {
        self.checked_elem_count().unwrap_or(usize::MAX)
    }

    /// Number of elements, or `None` when it does not fit a `usize`.
    pub fn checked_elem_count(&self) -> Option<usize> {
        if self.0.contains(&0) {
            return Some(0);
        }
        self.0.iter().try_fold(1usize, |acc, d| acc.checked_mul(*d))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape(dims.to_vec())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ArrayData  (typed element buffer)
// ---------------------------------------------------------------------------

/// One owned buffer per [`ElementType`]. f8e4m3 values are kept as raw bits.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    U8(Vec<u8>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    F16(Vec<f16>),
    BF16(Vec<bf16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    F8E4M3(Vec<u8>),
}

impl ArrayData {
    pub fn dtype(&self) -> ElementType {
        match self {
            ArrayData::U8(_) => ElementType::U8,
            ArrayData::U32(_) => ElementType::U32,
            ArrayData::I64(_) => ElementType::I64,
            ArrayData::F16(_) => ElementType::F16,
            ArrayData::BF16(_) => ElementType::BF16,
            ArrayData::F32(_) => ElementType::F32,
            ArrayData::F64(_) => ElementType::F64,
            ArrayData::F8E4M3(_) => ElementType::F8E4M3,
        }
    }

    /// Number of elements in the buffer.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::U8(v) | ArrayData::F8E4M3(v) => v.len(),
            ArrayData::U32(v) => v.len(),
            ArrayData::I64(v) => v.len(),
            ArrayData::F16(v) => v.len(),
            ArrayData::BF16(v) => v.len(),
            ArrayData::F32(v) => v.len(),
            ArrayData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the buffer once laid out as raw bytes.
    pub fn byte_len(&self) -> usize {
        self.len() * self.dtype().byte_size()
    }
}

impl fmt::Display for ArrayData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayData::U8(v) | ArrayData::F8E4M3(v) => write!(f, "{v:?}"),
            ArrayData::U32(v) => write!(f, "{v:?}"),
            ArrayData::I64(v) => write!(f, "{v:?}"),
            ArrayData::F16(v) => write!(f, "{v:?}"),
            ArrayData::BF16(v) => write!(f, "{v:?}"),
            ArrayData::F32(v) => write!(f, "{v:?}"),
            ArrayData::F64(v) => write!(f, "{v:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Element  (Rust scalar <-> ArrayData variant)
// ---------------------------------------------------------------------------

/// Rust scalar types that map onto exactly one [`ArrayData`] variant.
pub trait Element: Copy + Sized + 'static {
    const DTYPE: ElementType;

    fn into_data(values: Vec<Self>) -> ArrayData;

    fn from_data(data: &ArrayData) -> Option<&[Self]>;

    fn from_data_owned(data: ArrayData) -> Result<Vec<Self>, ArrayData>;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: ElementType = ElementType::$variant;

            fn into_data(values: Vec<Self>) -> ArrayData {
                ArrayData::$variant(values)
            }

            fn from_data(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            fn from_data_owned(data: ArrayData) -> Result<Vec<Self>, ArrayData> {
                match data {
                    ArrayData::$variant(v) => Ok(v),
                    other => Err(other),
                }
            }
        }
    };
}

impl_element!(u8, U8);
impl_element!(u32, U32);
impl_element!(i64, I64);
impl_element!(f16, F16);
impl_element!(bf16, BF16);
impl_element!(f32, F32);
impl_element!(f64, F64);

// ---------------------------------------------------------------------------
// Array
// ---------------------------------------------------------------------------

/// A typed, shaped, row-major buffer. The buffer length always equals the
/// shape's element count.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    data: ArrayData,
    shape: Shape,
    device: String,
}

impl Array {
    pub fn new(data: ArrayData, shape: impl Into<Shape>) -> NpyResult<Self> {
        let shape = shape.into();
        let expected = shape.checked_elem_count().ok_or_else(|| {
            NpyError::Format(format!("shape {shape} holds more elements than fit in memory"))
        })?;
        if data.len() != expected {
            return Err(NpyError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            shape,
            device: DEFAULT_DEVICE.to_string(),
        })
    }

    pub fn from_vec<T: Element>(values: Vec<T>, shape: impl Into<Shape>) -> NpyResult<Self> {
        Self::new(T::into_data(values), shape)
    }

    /// Replace the location tag.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> ElementType {
        self.data.dtype()
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn elem_count(&self) -> usize {
        self.data.len()
    }

    /// Borrow the elements as `T`, or `None` if `T` is not this array's type.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::from_data(&self.data)
    }

    /// Take the elements as `T`. On a type mismatch the array is handed back.
    pub fn into_vec<T: Element>(self) -> Result<Vec<T>, Self> {
        let Self {
            data,
            shape,
            device,
        } = self;
        T::from_data_owned(data).map_err(|data| Self {
            data,
            shape,
            device,
        })
    }

    pub fn into_parts(self) -> (ArrayData, Shape, String) {
        (self.data, self.shape, self.device)
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Array(shape={}, dtype={}, device={}, data={})",
            self.shape,
            self.dtype(),
            self.device,
            self.data
        )
    }
}
