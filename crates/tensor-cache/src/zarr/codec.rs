//! Chunk codec pipeline: `bytes` (endianness) followed by optional `gzip`.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::json;

use super::metadata::NamedConfig;
use crate::config::Compression;
use crate::error::{CacheError, CacheResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Decoded form of the `codecs` list of an array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecChain {
    endian: Endian,
    gzip_level: Option<u32>,
}

impl CodecChain {
    pub fn for_compression(compression: Compression) -> Self {
        Self {
            endian: Endian::Little,
            gzip_level: match compression {
                Compression::None => None,
                Compression::Gzip { level } => Some(level),
            },
        }
    }

    pub fn from_metadata(codecs: &[NamedConfig]) -> CacheResult<Self> {
        let mut iter = codecs.iter();

        let endian = match iter.next() {
            Some(codec) if codec.name == "bytes" => match codec.get("endian") {
                None => Endian::Little,
                Some(v) if v == "little" => Endian::Little,
                Some(v) if v == "big" => Endian::Big,
                Some(v) => {
                    return Err(CacheError::Unsupported {
                        what: format!("bytes codec endian {}", v),
                    })
                }
            },
            Some(codec) => {
                return Err(CacheError::Unsupported {
                    what: format!("codec '{}' before bytes codec", codec.name),
                })
            }
            None => {
                return Err(CacheError::Unsupported {
                    what: "empty codec list".to_string(),
                })
            }
        };

        let mut gzip_level = None;
        for codec in iter {
            match codec.name.as_str() {
                "gzip" if gzip_level.is_none() => {
                    let level = codec.get("level").and_then(|v| v.as_u64()).unwrap_or(5);
                    gzip_level = Some(level.min(9) as u32);
                }
                other => {
                    return Err(CacheError::Unsupported {
                        what: format!("codec '{}'", other),
                    })
                }
            }
        }

        Ok(Self { endian, gzip_level })
    }

    pub fn to_metadata(&self) -> Vec<NamedConfig> {
        let endian = match self.endian {
            Endian::Little => "little",
            Endian::Big => "big",
        };
        let mut codecs = vec![NamedConfig::new("bytes", json!({ "endian": endian }))];
        if let Some(level) = self.gzip_level {
            codecs.push(NamedConfig::new("gzip", json!({ "level": level })));
        }
        codecs
    }

    /// Encode one chunk of little-endian elements.
    pub fn encode(&self, mut chunk: Vec<u8>, item_size: usize) -> CacheResult<Vec<u8>> {
        if self.endian == Endian::Big {
            swap_bytes(&mut chunk, item_size);
        }
        match self.gzip_level {
            None => Ok(chunk),
            Some(level) => {
                let mut encoder = GzEncoder::new(
                    Vec::with_capacity(chunk.len() / 2),
                    flate2::Compression::new(level),
                );
                encoder
                    .write_all(&chunk)
                    .and_then(|_| encoder.finish())
                    .map_err(|e| CacheError::Io {
                        message: format!("gzip encode failed: {}", e),
                    })
            }
        }
    }

    /// Decode one stored chunk back to little-endian elements of
    /// `expected_len` bytes.
    pub fn decode(
        &self,
        stored: &[u8],
        item_size: usize,
        expected_len: usize,
        path: &str,
    ) -> CacheResult<Vec<u8>> {
        let mut chunk = match self.gzip_level {
            None => stored.to_vec(),
            Some(_) => {
                let mut out = Vec::with_capacity(expected_len);
                GzDecoder::new(stored)
                    .read_to_end(&mut out)
                    .map_err(|e| CacheError::corrupt(path, format!("gzip decode failed: {}", e)))?;
                out
            }
        };
        if chunk.len() != expected_len {
            return Err(CacheError::corrupt(
                path,
                format!("chunk has {} bytes, expected {}", chunk.len(), expected_len),
            ));
        }
        if self.endian == Endian::Big {
            swap_bytes(&mut chunk, item_size);
        }
        Ok(chunk)
    }
}

fn swap_bytes(data: &mut [u8], item_size: usize) {
    if item_size > 1 {
        for item in data.chunks_exact_mut(item_size) {
            item.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codecs(json: serde_json::Value) -> Vec<NamedConfig> {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_gzip_chain_roundtrip() {
        let chain = CodecChain::for_compression(Compression::Gzip { level: 5 });
        let raw: Vec<u8> = (0..64u8).collect();
        let stored = chain.encode(raw.clone(), 4).unwrap();
        assert_ne!(stored, raw);
        assert_eq!(chain.decode(&stored, 4, 64, "c/0").unwrap(), raw);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let chain = CodecChain::for_compression(Compression::Gzip { level: 3 });
        let parsed = CodecChain::from_metadata(&chain.to_metadata()).unwrap();
        assert_eq!(parsed, chain);

        let plain = CodecChain::for_compression(Compression::None);
        assert_eq!(plain.to_metadata().len(), 1);
    }

    #[test]
    fn test_big_endian_decode() {
        let chain = CodecChain::from_metadata(&codecs(json!([
            {"name": "bytes", "configuration": {"endian": "big"}}
        ])))
        .unwrap();
        let stored = 0x0102_0304u32.to_be_bytes();
        let decoded = chain.decode(&stored, 4, 4, "c/0").unwrap();
        assert_eq!(u32::from_le_bytes(decoded.try_into().unwrap()), 0x0102_0304);
    }

    #[test]
    fn test_unsupported_codecs() {
        let transpose = codecs(json!([
            {"name": "transpose", "configuration": {"order": [1, 0]}},
            {"name": "bytes"}
        ]));
        assert!(matches!(
            CodecChain::from_metadata(&transpose),
            Err(CacheError::Unsupported { .. })
        ));
        let zstd = codecs(json!([{"name": "bytes"}, {"name": "zstd"}]));
        assert!(CodecChain::from_metadata(&zstd).is_err());
    }

    #[test]
    fn test_decode_length_mismatch_is_corrupt() {
        let chain = CodecChain::for_compression(Compression::None);
        assert!(matches!(
            chain.decode(&[0u8; 7], 4, 8, "c/0"),
            Err(CacheError::Corrupt { .. })
        ));
    }
}
