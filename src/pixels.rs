//! Typed pixel buffers and the OME pixel type vocabulary.
use std::fmt::{self, Display};
use std::mem;
use std::str::FromStr;

use ndarray::{ArrayD, IxDyn};
use thiserror::Error;

/// The byte order multi-byte samples are stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    pub const fn native() -> Self {
        if u16::from_ne_bytes([1, 0]) == 1 {
            Self::LittleEndian
        } else {
            Self::BigEndian
        }
    }

    pub const fn is_native(&self) -> bool {
        matches!(
            (self, Self::native()),
            (Self::LittleEndian, Self::LittleEndian) | (Self::BigEndian, Self::BigEndian)
        )
    }
}

/// The in-memory element type of a [`PixelArray`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl DType {
    /// Get the size in bytes of a single value of this type
    pub const fn width(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// Map to the OME pixel type vocabulary. 64-bit integers have no OME equivalent.
    pub fn pixel_type(&self) -> Result<PixelType, UnsupportedPixelType> {
        match self {
            Self::U8 => Ok(PixelType::Uint8),
            Self::I8 => Ok(PixelType::Int8),
            Self::U16 => Ok(PixelType::Uint16),
            Self::I16 => Ok(PixelType::Int16),
            Self::U32 => Ok(PixelType::Uint32),
            Self::I32 => Ok(PixelType::Int32),
            Self::F32 => Ok(PixelType::Float),
            Self::F64 => Ok(PixelType::Double),
            Self::U64 => Err(UnsupportedPixelType("uint64".into())),
            Self::I64 => Err(UnsupportedPixelType("int64".into())),
        }
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "uint8",
            Self::I8 => "int8",
            Self::U16 => "uint16",
            Self::I16 => "int16",
            Self::U32 => "uint32",
            Self::I32 => "int32",
            Self::U64 => "uint64",
            Self::I64 => "int64",
            Self::F32 => "float32",
            Self::F64 => "float64",
        };
        f.write_str(name)
    }
}

/// A pixel type with no mapping between the array and document vocabularies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported pixel type: {0}")]
pub struct UnsupportedPixelType(pub String);

/// The `Type` attribute of an OME `Pixels` element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelType {
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
    Float,
    Double,
    Bit,
    Complex,
    DoubleComplex,
}

impl PixelType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bit => "bit",
            Self::Complex => "complex",
            Self::DoubleComplex => "double-complex",
        }
    }

    /// The in-memory element type used to hold pixels of this type
    pub fn dtype(&self) -> Result<DType, UnsupportedPixelType> {
        match self {
            Self::Int8 => Ok(DType::I8),
            Self::Int16 => Ok(DType::I16),
            Self::Int32 => Ok(DType::I32),
            Self::Uint8 => Ok(DType::U8),
            Self::Uint16 => Ok(DType::U16),
            Self::Uint32 => Ok(DType::U32),
            Self::Float => Ok(DType::F32),
            Self::Double => Ok(DType::F64),
            Self::Bit | Self::Complex | Self::DoubleComplex => {
                Err(UnsupportedPixelType(self.as_str().into()))
            }
        }
    }
}

impl Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixelType {
    type Err = UnsupportedPixelType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int8" => Ok(Self::Int8),
            "int16" => Ok(Self::Int16),
            "int32" => Ok(Self::Int32),
            "uint8" => Ok(Self::Uint8),
            "uint16" => Ok(Self::Uint16),
            "uint32" => Ok(Self::Uint32),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            "bit" => Ok(Self::Bit),
            "complex" => Ok(Self::Complex),
            "double-complex" => Ok(Self::DoubleComplex),
            _ => Err(UnsupportedPixelType(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum PixelDataError {
    #[error("expected {expected} bytes for shape {shape:?}, got {found}")]
    LengthMismatch {
        shape: Vec<usize>,
        expected: usize,
        found: usize,
    },
    #[error("could not build array: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
}

/// A numeric type that can live inside a [`PixelArray`]
pub trait Element: bytemuck::Pod + Default + 'static {
    const DTYPE: DType;

    fn wrap(array: ArrayD<Self>) -> PixelArray;
}

/// An N-dimensional pixel buffer of one of the supported element types
#[derive(Debug, Clone, PartialEq)]
pub enum PixelArray {
    U8(ArrayD<u8>),
    I8(ArrayD<i8>),
    U16(ArrayD<u16>),
    I16(ArrayD<i16>),
    U32(ArrayD<u32>),
    I32(ArrayD<i32>),
    U64(ArrayD<u64>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

macro_rules! dispatch {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            PixelArray::U8($arr) => $body,
            PixelArray::I8($arr) => $body,
            PixelArray::U16($arr) => $body,
            PixelArray::I16($arr) => $body,
            PixelArray::U32($arr) => $body,
            PixelArray::I32($arr) => $body,
            PixelArray::U64($arr) => $body,
            PixelArray::I64($arr) => $body,
            PixelArray::F32($arr) => $body,
            PixelArray::F64($arr) => $body,
        }
    };
}

macro_rules! map_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            PixelArray::U8($arr) => PixelArray::U8($body),
            PixelArray::I8($arr) => PixelArray::I8($body),
            PixelArray::U16($arr) => PixelArray::U16($body),
            PixelArray::I16($arr) => PixelArray::I16($body),
            PixelArray::U32($arr) => PixelArray::U32($body),
            PixelArray::I32($arr) => PixelArray::I32($body),
            PixelArray::U64($arr) => PixelArray::U64($body),
            PixelArray::I64($arr) => PixelArray::I64($body),
            PixelArray::F32($arr) => PixelArray::F32($body),
            PixelArray::F64($arr) => PixelArray::F64($body),
        }
    };
}

macro_rules! impl_element {
    ($($t:ty => $variant:ident), +) => {$(
        impl Element for $t {
            const DTYPE: DType = DType::$variant;

            fn wrap(array: ArrayD<Self>) -> PixelArray {
                PixelArray::$variant(array)
            }
        }

        impl From<ArrayD<$t>> for PixelArray {
            fn from(value: ArrayD<$t>) -> Self {
                PixelArray::$variant(value)
            }
        }
    )+};
}

impl_element!(
    u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32,
    i32 => I32, u64 => U64, i64 => I64, f32 => F32, f64 => F64
);

fn decode_elements<T: Element>(
    shape: &[usize],
    bytes: &[u8],
    byte_order: ByteOrder,
) -> Result<ArrayD<T>, PixelDataError> {
    let width = mem::size_of::<T>();
    let expected = shape.iter().product::<usize>() * width;
    if bytes.len() != expected {
        return Err(PixelDataError::LengthMismatch {
            shape: shape.to_vec(),
            expected,
            found: bytes.len(),
        });
    }
    let data: Vec<T> = if byte_order.is_native() || width == 1 {
        bytemuck::allocation::pod_collect_to_vec(bytes)
    } else {
        let mut swapped = bytes.to_vec();
        swapped
            .chunks_exact_mut(width)
            .for_each(|chunk| chunk.reverse());
        bytemuck::allocation::pod_collect_to_vec(&swapped)
    };
    Ok(ArrayD::from_shape_vec(IxDyn(shape), data)?)
}

impl PixelArray {
    /// An array of zeros, mostly useful for tests and metadata-only workflows
    pub fn zeros(dtype: DType, shape: &[usize]) -> Self {
        let shape = IxDyn(shape);
        match dtype {
            DType::U8 => Self::U8(ArrayD::zeros(shape)),
            DType::I8 => Self::I8(ArrayD::zeros(shape)),
            DType::U16 => Self::U16(ArrayD::zeros(shape)),
            DType::I16 => Self::I16(ArrayD::zeros(shape)),
            DType::U32 => Self::U32(ArrayD::zeros(shape)),
            DType::I32 => Self::I32(ArrayD::zeros(shape)),
            DType::U64 => Self::U64(ArrayD::zeros(shape)),
            DType::I64 => Self::I64(ArrayD::zeros(shape)),
            DType::F32 => Self::F32(ArrayD::zeros(shape)),
            DType::F64 => Self::F64(ArrayD::zeros(shape)),
        }
    }

    /// Rebuild an array of `shape` from raw sample bytes stored in `byte_order`
    pub fn from_raw(
        dtype: DType,
        shape: &[usize],
        bytes: &[u8],
        byte_order: ByteOrder,
    ) -> Result<Self, PixelDataError> {
        let array = match dtype {
            DType::U8 => u8::wrap(decode_elements(shape, bytes, byte_order)?),
            DType::I8 => i8::wrap(decode_elements(shape, bytes, byte_order)?),
            DType::U16 => u16::wrap(decode_elements(shape, bytes, byte_order)?),
            DType::I16 => i16::wrap(decode_elements(shape, bytes, byte_order)?),
            DType::U32 => u32::wrap(decode_elements(shape, bytes, byte_order)?),
            DType::I32 => i32::wrap(decode_elements(shape, bytes, byte_order)?),
            DType::U64 => u64::wrap(decode_elements(shape, bytes, byte_order)?),
            DType::I64 => i64::wrap(decode_elements(shape, bytes, byte_order)?),
            DType::F32 => f32::wrap(decode_elements(shape, bytes, byte_order)?),
            DType::F64 => f64::wrap(decode_elements(shape, bytes, byte_order)?),
        };
        Ok(array)
    }

    pub fn dtype(&self) -> DType {
        match self {
            Self::U8(_) => DType::U8,
            Self::I8(_) => DType::I8,
            Self::U16(_) => DType::U16,
            Self::I16(_) => DType::I16,
            Self::U32(_) => DType::U32,
            Self::I32(_) => DType::I32,
            Self::U64(_) => DType::U64,
            Self::I64(_) => DType::I64,
            Self::F32(_) => DType::F32,
            Self::F64(_) => DType::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        dispatch!(self, arr => arr.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// The number of elements
    pub fn len(&self) -> usize {
        dispatch!(self, arr => arr.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_width(&self) -> usize {
        self.dtype().width()
    }

    /// Element count times element width
    pub fn byte_size(&self) -> u64 {
        self.len() as u64 * self.element_width() as u64
    }

    /// Insert `n` length-1 axes in front of the existing ones. The element buffer is
    /// reused as-is.
    pub fn insert_leading_axes(self, n: usize) -> Self {
        map_array!(self, arr => {
            let mut arr = arr;
            for _ in 0..n {
                arr = arr.insert_axis(ndarray::Axis(0));
            }
            arr
        })
    }

    /// Copy out `count` entries of the first axis starting at `start`, clamped to
    /// what the array holds
    pub fn select_leading(&self, start: usize, count: usize) -> Self {
        let n = self.shape().first().copied().unwrap_or(0);
        let start = start.min(n);
        let end = start.saturating_add(count).min(n);
        map_array!(self, arr => arr
            .slice_axis(ndarray::Axis(0), ndarray::Slice::from(start..end))
            .to_owned())
    }

    /// Give the elements a new shape with the same element count, in row-major order
    pub fn reshape(self, shape: &[usize]) -> Result<Self, PixelDataError> {
        let shape = IxDyn(shape);
        let array = match self {
            Self::U8(arr) => Self::U8(arr.as_standard_layout().into_owned().into_shape(shape)?),
            Self::I8(arr) => Self::I8(arr.as_standard_layout().into_owned().into_shape(shape)?),
            Self::U16(arr) => Self::U16(arr.as_standard_layout().into_owned().into_shape(shape)?),
            Self::I16(arr) => Self::I16(arr.as_standard_layout().into_owned().into_shape(shape)?),
            Self::U32(arr) => Self::U32(arr.as_standard_layout().into_owned().into_shape(shape)?),
            Self::I32(arr) => Self::I32(arr.as_standard_layout().into_owned().into_shape(shape)?),
            Self::U64(arr) => Self::U64(arr.as_standard_layout().into_owned().into_shape(shape)?),
            Self::I64(arr) => Self::I64(arr.as_standard_layout().into_owned().into_shape(shape)?),
            Self::F32(arr) => Self::F32(arr.as_standard_layout().into_owned().into_shape(shape)?),
            Self::F64(arr) => Self::F64(arr.as_standard_layout().into_owned().into_shape(shape)?),
        };
        Ok(array)
    }

    /// The samples in logical (row-major) order as native-endian bytes
    pub fn to_native_bytes(&self) -> Vec<u8> {
        dispatch!(self, arr => {
            let values: Vec<_> = arr.iter().copied().collect();
            bytemuck::cast_slice(&values).to_vec()
        })
    }
}
