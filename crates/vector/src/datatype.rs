//! Vector datatypes and codecs
//!
//! Two storage representations for embeddings:
//!
//! | Constructor | Identifier | Stored as |
//! |-------------|------------|-----------|
//! | [`vector`] | `vector[<shape>]` | the value itself |
//! | [`sqlvector`] | `sqlvector[<shape>]` | contiguous little-endian float64 bytes |
//!
//! The shape is only metadata: it is rendered into the identifier and used
//! to check that an index and its listeners agree on dimensionality.

use crate::error::{VectorError, VectorResult};
use byteorder::{ByteOrder, LittleEndian};
use conflux_core::{ConfluxError, Value};
use serde::{Deserialize, Serialize};

const F64_WIDTH: usize = 8;

/// How values of a datatype are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encodable {
    /// Stored as-is
    Native,
    /// Stored as little-endian float64 bytes
    Float64Bytes,
}

/// A named storage representation with a fixed shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataType {
    /// `vector[...]` or `sqlvector[...]`
    pub identifier: String,
    /// Non-empty list of dimensions
    pub shape: Vec<usize>,
    /// Storage representation
    pub encodable: Encodable,
}

/// Typed numeric array handed to the byte codec.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    /// float64 elements
    F64(Vec<f64>),
    /// float32 elements
    F32(Vec<f32>),
    /// int32 elements
    I32(Vec<i32>),
    /// int64 elements
    I64(Vec<i64>),
}

impl NumericArray {
    /// Element type name
    pub fn dtype(&self) -> &'static str {
        match self {
            NumericArray::F64(_) => "float64",
            NumericArray::F32(_) => "float32",
            NumericArray::I32(_) => "int32",
            NumericArray::I64(_) => "int64",
        }
    }

    /// Infer an array from a value: any float (or no elements at all) makes
    /// the array float64, all-integer arrays are int64. Nested arrays are
    /// flattened row-major.
    pub fn from_value(value: &Value) -> VectorResult<NumericArray> {
        let mut flat = Vec::new();
        flatten(value, &mut flat)?;
        if flat.is_empty() || flat.iter().any(|v| matches!(v, Value::Float(_))) {
            Ok(NumericArray::F64(
                flat.iter().filter_map(|v| v.as_number()).collect(),
            ))
        } else {
            Ok(NumericArray::I64(flat.iter().filter_map(|v| v.as_int()).collect()))
        }
    }
}

fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) -> VectorResult<()> {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten(item, out)?;
            }
            Ok(())
        }
        Value::Int(_) | Value::Float(_) => {
            out.push(value);
            Ok(())
        }
        other => Err(VectorError::InvalidEmbedding(format!(
            "expected numeric array, found {}",
            other.type_name()
        ))),
    }
}

/// Render a shape as `d0xd1x...`.
pub fn str_shape(shape: &[usize]) -> VectorResult<String> {
    if shape.is_empty() {
        return Err(VectorError::EmptyShape);
    }
    Ok(shape
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("x"))
}

/// Native vector datatype.
pub fn vector(shape: &[usize]) -> VectorResult<DataType> {
    Ok(DataType {
        identifier: format!("vector[{}]", str_shape(shape)?),
        shape: shape.to_vec(),
        encodable: Encodable::Native,
    })
}

/// SQL-compatible vector datatype storing float64 bytes.
pub fn sqlvector(shape: &[usize]) -> VectorResult<DataType> {
    Ok(DataType {
        identifier: format!("sqlvector[{}]", str_shape(shape)?),
        shape: shape.to_vec(),
        encodable: Encodable::Float64Bytes,
    })
}

/// Encode a float64 array as contiguous little-endian bytes.
///
/// Any other element type is rejected with `DtypeMismatch`.
pub fn encode_array(array: &NumericArray) -> VectorResult<Vec<u8>> {
    match array {
        NumericArray::F64(values) => {
            let mut buf = vec![0u8; values.len() * F64_WIDTH];
            LittleEndian::write_f64_into(values, &mut buf);
            Ok(buf)
        }
        other => Err(ConfluxError::DtypeMismatch {
            expected: "float64".to_string(),
            actual: other.dtype().to_string(),
        }
        .into()),
    }
}

/// Decode little-endian float64 bytes into a flat list.
pub fn decode_array(bytes: &[u8]) -> VectorResult<Vec<f64>> {
    if bytes.len() % F64_WIDTH != 0 {
        return Err(VectorError::InvalidEmbedding(format!(
            "buffer size {} is not a multiple of {}",
            bytes.len(),
            F64_WIDTH
        )));
    }
    let mut out = vec![0f64; bytes.len() / F64_WIDTH];
    LittleEndian::read_f64_into(bytes, &mut out);
    Ok(out)
}

impl DataType {
    /// Last dimension of the shape
    pub fn dimensions(&self) -> Option<usize> {
        self.shape.last().copied()
    }

    /// Storage form of `value`
    pub fn encode(&self, value: &Value) -> VectorResult<Value> {
        match self.encodable {
            Encodable::Native => Ok(value.clone()),
            Encodable::Float64Bytes => {
                let array = NumericArray::from_value(value)?;
                Ok(Value::Bytes(encode_array(&array)?))
            }
        }
    }

    /// Value form of stored data
    pub fn decode(&self, stored: &Value) -> VectorResult<Value> {
        match self.encodable {
            Encodable::Native => Ok(stored.clone()),
            Encodable::Float64Bytes => match stored {
                Value::Bytes(bytes) => Ok(Value::from(decode_array(bytes)?)),
                other => Err(VectorError::InvalidEmbedding(format!(
                    "{} expects bytes, found {}",
                    self.identifier,
                    other.type_name()
                ))),
            },
        }
    }
}
