//! `zarr.json` document for a single array node.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{CacheError, CacheResult};
use crate::tensor::DType;

/// File name of the array metadata document inside an entry.
pub const METADATA_KEY: &str = "zarr.json";

/// A `{"name": ..., "configuration": {...}}` object as used by chunk grids,
/// key encodings and codecs.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct NamedConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Value>,
}

impl NamedConfig {
    pub fn new(name: &str, configuration: Value) -> Self {
        Self {
            name: name.to_string(),
            configuration: Some(configuration),
        }
    }

    /// Look up one configuration field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.configuration.as_ref().and_then(|c| c.get(field))
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ArrayMetadata {
    pub zarr_format: u8,
    pub node_type: String,
    pub shape: Vec<usize>,
    pub data_type: String,
    pub chunk_grid: NamedConfig,
    pub chunk_key_encoding: NamedConfig,
    pub fill_value: Value,
    pub codecs: Vec<NamedConfig>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_names: Option<Vec<Option<String>>>,
}

impl ArrayMetadata {
    pub fn parse(bytes: &[u8], path: &str) -> CacheResult<Self> {
        let meta: Self = serde_json::from_slice(bytes)
            .map_err(|e| CacheError::corrupt(path, format!("invalid array metadata: {}", e)))?;
        if meta.zarr_format != 3 {
            return Err(CacheError::Unsupported {
                what: format!("zarr_format {}", meta.zarr_format),
            });
        }
        if meta.node_type != "array" {
            return Err(CacheError::corrupt(
                path,
                format!("expected array node, found '{}'", meta.node_type),
            ));
        }
        Ok(meta)
    }

    pub fn to_bytes(&self) -> CacheResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| CacheError::Io {
            message: format!("failed to serialize array metadata: {}", e),
        })
    }

    /// `chunk_shape` of a `regular` chunk grid.
    pub fn regular_chunk_shape(&self, path: &str) -> CacheResult<Vec<usize>> {
        if self.chunk_grid.name != "regular" {
            return Err(CacheError::Unsupported {
                what: format!("chunk grid '{}'", self.chunk_grid.name),
            });
        }
        let chunk_shape: Vec<usize> = self
            .chunk_grid
            .get("chunk_shape")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| CacheError::corrupt(path, format!("invalid chunk_shape: {}", e)))?
            .ok_or_else(|| CacheError::corrupt(path, "chunk grid has no chunk_shape"))?;

        if chunk_shape.len() != self.shape.len() {
            return Err(CacheError::corrupt(
                path,
                format!(
                    "chunk_shape {:?} does not match array shape {:?}",
                    chunk_shape, self.shape
                ),
            ));
        }
        if chunk_shape.contains(&0) {
            return Err(CacheError::corrupt(path, "chunk_shape contains zero"));
        }
        Ok(chunk_shape)
    }
}

/// The `fill_value` written for new arrays: zero of the dtype.
pub fn zero_fill_value(dtype: DType) -> Value {
    match dtype {
        DType::Bool => json!(false),
        DType::Float32 | DType::Float64 => json!(0.0),
        _ => json!(0),
    }
}

/// Encode a JSON `fill_value` as one little-endian element.
pub fn fill_value_bytes(dtype: DType, value: &Value, path: &str) -> CacheResult<Vec<u8>> {
    let bad = || {
        CacheError::corrupt(
            path,
            format!("fill_value {} is not a valid {}", value, dtype),
        )
    };

    macro_rules! int {
        ($ty:ty) => {{
            let v = if let Some(v) = value.as_i64() {
                <$ty>::try_from(v).map_err(|_| bad())?
            } else if let Some(v) = value.as_u64() {
                <$ty>::try_from(v).map_err(|_| bad())?
            } else {
                return Err(bad());
            };
            v.to_le_bytes().to_vec()
        }};
    }

    let float = || -> CacheResult<f64> {
        match value {
            Value::Number(n) => n.as_f64().ok_or_else(bad),
            Value::String(s) => match s.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                _ => Err(bad()),
            },
            _ => Err(bad()),
        }
    };

    Ok(match dtype {
        DType::Bool => vec![u8::from(value.as_bool().ok_or_else(bad)?)],
        DType::Int8 => int!(i8),
        DType::Int16 => int!(i16),
        DType::Int32 => int!(i32),
        DType::Int64 => int!(i64),
        DType::Uint8 => int!(u8),
        DType::Uint16 => int!(u16),
        DType::Uint32 => int!(u32),
        DType::Uint64 => int!(u64),
        DType::Float32 => (float()? as f32).to_le_bytes().to_vec(),
        DType::Float64 => float()?.to_le_bytes().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "zarr_format": 3,
        "node_type": "array",
        "shape": [10, 20],
        "data_type": "float64",
        "chunk_grid": {"name": "regular", "configuration": {"chunk_shape": [5, 20]}},
        "chunk_key_encoding": {"name": "default", "configuration": {"separator": "/"}},
        "fill_value": "NaN",
        "codecs": [{"name": "bytes", "configuration": {"endian": "little"}}],
        "attributes": {},
        "dimension_names": null
    }"#;

    #[test]
    fn test_parse_foreign_metadata() {
        let meta = ArrayMetadata::parse(SAMPLE.as_bytes(), "a/zarr.json").unwrap();
        assert_eq!(meta.shape, vec![10, 20]);
        assert_eq!(meta.regular_chunk_shape("a").unwrap(), vec![5, 20]);
        let fill = fill_value_bytes(DType::Float64, &meta.fill_value, "a").unwrap();
        assert!(f64::from_le_bytes(fill.try_into().unwrap()).is_nan());
    }

    #[test]
    fn test_rejects_v2_and_groups() {
        let v2 = SAMPLE.replace("\"zarr_format\": 3", "\"zarr_format\": 2");
        assert!(matches!(
            ArrayMetadata::parse(v2.as_bytes(), "a"),
            Err(CacheError::Unsupported { .. })
        ));
        let group = SAMPLE.replace("\"node_type\": \"array\"", "\"node_type\": \"group\"");
        assert!(matches!(
            ArrayMetadata::parse(group.as_bytes(), "a"),
            Err(CacheError::Corrupt { .. })
        ));
        assert!(ArrayMetadata::parse(b"not json", "a").is_err());
    }

    #[test]
    fn test_fill_value_ranges() {
        assert_eq!(
            fill_value_bytes(DType::Uint8, &json!(255), "a").unwrap(),
            vec![255]
        );
        assert!(fill_value_bytes(DType::Uint8, &json!(256), "a").is_err());
        assert!(fill_value_bytes(DType::Int8, &json!(-1), "a").is_ok());
        assert_eq!(
            fill_value_bytes(DType::Bool, &json!(true), "a").unwrap(),
            vec![1]
        );
        assert!(fill_value_bytes(DType::Bool, &json!(1), "a").is_err());
    }
}
