//! In-memory numeric arrays.
//!
//! A [`Tensor`] is a shape, a dtype and the elements in C order, held as
//! little-endian bytes. Keeping the payload untyped lets the chunk codec move
//! data around without caring about the element type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// Element type of a tensor. Names follow the Zarr v3 `data_type` strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn item_size(self) -> usize {
        match self {
            DType::Bool | DType::Int8 | DType::Uint8 => 1,
            DType::Int16 | DType::Uint16 => 2,
            DType::Int32 | DType::Uint32 | DType::Float32 => 4,
            DType::Int64 | DType::Uint64 | DType::Float64 => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Uint8 => "uint8",
            DType::Uint16 => "uint16",
            DType::Uint32 => "uint32",
            DType::Uint64 => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    pub fn parse(name: &str) -> CacheResult<Self> {
        Ok(match name {
            "bool" => DType::Bool,
            "int8" => DType::Int8,
            "int16" => DType::Int16,
            "int32" => DType::Int32,
            "int64" => DType::Int64,
            "uint8" => DType::Uint8,
            "uint16" => DType::Uint16,
            "uint32" => DType::Uint32,
            "uint64" => DType::Uint64,
            "float32" => DType::Float32,
            "float64" => DType::Float64,
            other => {
                return Err(CacheError::Unsupported {
                    what: format!("data type '{}'", other),
                })
            }
        })
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rust scalar types that can be stored in a [`Tensor`].
pub trait Element: Copy + Send + Sync + 'static {
    const DTYPE: DType;

    fn write_le(self, out: &mut Vec<u8>);

    /// Decode from exactly `DTYPE.item_size()` little-endian bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_element!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// A dense n-dimensional array.
///
/// Equality compares dtype, shape and raw element bytes, so `NaN` payloads
/// compare equal to themselves.
#[derive(Clone, PartialEq, Eq)]
pub struct Tensor {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl Tensor {
    /// Build a tensor from C-ordered elements.
    pub fn from_vec<T: Element>(shape: impl Into<Vec<usize>>, values: Vec<T>) -> CacheResult<Self> {
        let shape = shape.into();
        let expected = checked_len(&shape, T::DTYPE)?;
        if values.len() != expected {
            return Err(CacheError::Shape {
                shape,
                expected,
                actual: values.len(),
            });
        }
        let mut data = Vec::with_capacity(expected * T::DTYPE.item_size());
        for v in values {
            v.write_le(&mut data);
        }
        Ok(Self {
            dtype: T::DTYPE,
            shape,
            data,
        })
    }

    /// Build a tensor from little-endian element bytes.
    pub fn from_le_bytes(
        dtype: DType,
        shape: impl Into<Vec<usize>>,
        data: Vec<u8>,
    ) -> CacheResult<Self> {
        let shape = shape.into();
        let expected = checked_len(&shape, dtype)?;
        if data.len() != expected * dtype.item_size() {
            return Err(CacheError::Shape {
                shape,
                expected,
                actual: data.len() / dtype.item_size(),
            });
        }
        Ok(Self { dtype, shape, data })
    }

    /// A tensor of zeros (`false` for bool).
    pub fn zeros(dtype: DType, shape: impl Into<Vec<usize>>) -> CacheResult<Self> {
        let shape = shape.into();
        let len = checked_len(&shape, dtype)? * dtype.item_size();
        Ok(Self {
            dtype,
            shape,
            data: vec![0u8; len],
        })
    }

    /// A 0-dimensional tensor holding one value.
    pub fn scalar<T: Element>(value: T) -> Self {
        let mut data = Vec::with_capacity(T::DTYPE.item_size());
        value.write_le(&mut data);
        Self {
            dtype: T::DTYPE,
            shape: Vec::new(),
            data,
        }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        element_count(&self.shape)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the element payload in bytes.
    pub fn nbytes(&self) -> usize {
        self.data.len()
    }

    /// Raw C-ordered little-endian element bytes.
    pub fn as_le_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_le_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Copy the elements out as `T`. Fails unless `T` matches the dtype.
    pub fn to_vec<T: Element>(&self) -> CacheResult<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(CacheError::TypeMismatch {
                expected: self.dtype.to_string(),
                actual: T::DTYPE.to_string(),
            });
        }
        Ok(self
            .data
            .chunks_exact(self.dtype.item_size())
            .map(T::read_le)
            .collect())
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("dtype", &self.dtype)
            .field("shape", &self.shape)
            .field("nbytes", &self.data.len())
            .finish()
    }
}

/// Product of dimensions; 1 for a 0-d shape.
///
/// Only for shapes already checked by [`checked_byte_len`].
pub(crate) fn element_count(shape: &[usize]) -> usize {
    if shape.contains(&0) {
        return 0;
    }
    shape.iter().product()
}

/// Byte size of an array, or `None` if it overflows or exceeds `isize::MAX`.
pub(crate) fn checked_byte_len(shape: &[usize], item_size: usize) -> Option<usize> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))?
        .checked_mul(item_size)
        .filter(|&n| isize::try_from(n).is_ok())
}

/// Element count of a shape that fits in memory.
fn checked_len(shape: &[usize], dtype: DType) -> CacheResult<usize> {
    checked_byte_len(shape, dtype.item_size())
        .map(|bytes| bytes / dtype.item_size())
        .ok_or_else(|| CacheError::TooLarge {
            shape: shape.to_vec(),
            item_size: dtype.item_size(),
        })
}
