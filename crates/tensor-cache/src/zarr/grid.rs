//! Regular chunk grid: chunk shape selection, chunk keys, and copying
//! elements between a C-ordered array buffer and chunk buffers.

use crate::error::{CacheError, CacheResult};

/// Pick a chunk shape whose uncompressed size is at most `target_bytes`.
///
/// Starts from the array shape (zero-length dims count as 1) and halves the
/// largest dimension until the chunk fits. Never goes below one element.
pub fn guess_chunk_shape(shape: &[usize], item_size: usize, target_bytes: usize) -> Vec<usize> {
    let mut chunk: Vec<usize> = shape.iter().map(|&d| d.max(1)).collect();
    let target_elems = (target_bytes / item_size.max(1)).max(1);

    while chunk.iter().fold(1usize, |n, &d| n.saturating_mul(d)) > target_elems {
        let Some((axis, _)) = chunk
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d > 1)
            .max_by_key(|&(i, &d)| (d, std::cmp::Reverse(i)))
        else {
            break;
        };
        chunk[axis] = chunk[axis].div_ceil(2);
    }
    chunk
}

/// How chunk coordinates become object keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyEncoding {
    /// `c/0/1`, or `c` for a 0-d array.
    Default { separator: char },
    /// `0.1`, or `0` for a 0-d array.
    V2 { separator: char },
}

impl Default for KeyEncoding {
    fn default() -> Self {
        Self::Default { separator: '/' }
    }
}

impl KeyEncoding {
    pub fn parse(name: &str, separator: Option<&str>) -> CacheResult<Self> {
        let sep = |fallback: char| -> CacheResult<char> {
            match separator {
                None => Ok(fallback),
                Some("/") => Ok('/'),
                Some(".") => Ok('.'),
                Some(other) => Err(CacheError::Unsupported {
                    what: format!("chunk key separator '{}'", other),
                }),
            }
        };
        match name {
            "default" => Ok(Self::Default { separator: sep('/')? }),
            "v2" => Ok(Self::V2 { separator: sep('.')? }),
            other => Err(CacheError::Unsupported {
                what: format!("chunk key encoding '{}'", other),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Default { .. } => "default",
            Self::V2 { .. } => "v2",
        }
    }

    pub fn separator(&self) -> char {
        match self {
            Self::Default { separator } | Self::V2 { separator } => *separator,
        }
    }

    pub fn chunk_key(&self, coords: &[usize]) -> String {
        let sep = self.separator().to_string();
        let joined = coords
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(&sep);
        match self {
            Self::Default { .. } if coords.is_empty() => "c".to_string(),
            Self::Default { .. } => format!("c{}{}", sep, joined),
            Self::V2 { .. } if coords.is_empty() => "0".to_string(),
            Self::V2 { .. } => joined,
        }
    }
}

/// Array shape plus chunk shape, with element-copy helpers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkGrid {
    shape: Vec<usize>,
    chunk_shape: Vec<usize>,
}

impl ChunkGrid {
    /// `chunk_shape` must have the same rank as `shape` and no zero entries.
    pub fn new(shape: Vec<usize>, chunk_shape: Vec<usize>) -> Self {
        debug_assert_eq!(shape.len(), chunk_shape.len());
        debug_assert!(chunk_shape.iter().all(|&c| c > 0));
        Self { shape, chunk_shape }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn chunk_shape(&self) -> &[usize] {
        &self.chunk_shape
    }

    /// Elements in one (full-size) chunk.
    pub fn chunk_len(&self) -> usize {
        self.chunk_shape.iter().product()
    }

    /// Number of chunks along each axis.
    pub fn grid_shape(&self) -> Vec<usize> {
        self.shape
            .iter()
            .zip(&self.chunk_shape)
            .map(|(&d, &c)| d.div_ceil(c))
            .collect()
    }

    /// All chunk coordinates in C order. A 0-d array has exactly one chunk
    /// with empty coordinates; an array with a zero-length axis has none.
    pub fn chunk_coords(&self) -> Vec<Vec<usize>> {
        let grid = self.grid_shape();
        let total = crate::tensor::element_count(&grid);
        let mut out = Vec::with_capacity(total);
        if total == 0 {
            return out;
        }
        let mut idx = vec![0usize; grid.len()];
        loop {
            out.push(idx.clone());
            if !advance(&mut idx, &grid) {
                return out;
            }
        }
    }

    /// Copy the chunk at `coords` out of `array`, padding edge chunks with
    /// `fill` (one element).
    pub fn extract(&self, array: &[u8], coords: &[usize], fill: &[u8]) -> Vec<u8> {
        let item = fill.len();
        let mut chunk = fill.repeat(self.chunk_len());
        self.for_each_run(coords, item, |array_off, chunk_off, len| {
            chunk[chunk_off..chunk_off + len].copy_from_slice(&array[array_off..array_off + len]);
        });
        chunk
    }

    /// Copy a decoded chunk into `array`, dropping padding outside the array.
    pub fn insert(&self, array: &mut [u8], coords: &[usize], chunk: &[u8], item: usize) {
        self.for_each_run(coords, item, |array_off, chunk_off, len| {
            array[array_off..array_off + len].copy_from_slice(&chunk[chunk_off..chunk_off + len]);
        });
    }

    /// Visit each contiguous run (along the last axis) shared by the chunk at
    /// `coords` and the array, as `(array_byte_offset, chunk_byte_offset, byte_len)`.
    fn for_each_run(&self, coords: &[usize], item: usize, mut f: impl FnMut(usize, usize, usize)) {
        let ndim = self.shape.len();
        if ndim == 0 {
            f(0, 0, item);
            return;
        }

        let origin: Vec<usize> = coords
            .iter()
            .zip(&self.chunk_shape)
            .map(|(&c, &s)| c * s)
            .collect();
        let extent: Vec<usize> = (0..ndim)
            .map(|d| self.chunk_shape[d].min(self.shape[d].saturating_sub(origin[d])))
            .collect();
        if extent.contains(&0) {
            return;
        }

        let array_strides = strides(&self.shape);
        let chunk_strides = strides(&self.chunk_shape);
        let run_len = extent[ndim - 1] * item;

        // Odometer over every axis but the last.
        let outer = &extent[..ndim - 1];
        let mut idx = vec![0usize; ndim - 1];
        loop {
            let mut array_off = origin[ndim - 1] * array_strides[ndim - 1];
            let mut chunk_off = 0;
            for d in 0..ndim - 1 {
                array_off += (origin[d] + idx[d]) * array_strides[d];
                chunk_off += idx[d] * chunk_strides[d];
            }
            f(array_off * item, chunk_off * item, run_len);
            if !advance(&mut idx, outer) {
                return;
            }
        }
    }
}

/// C-order element strides.
fn strides(shape: &[usize]) -> Vec<usize> {
    let mut out = vec![1usize; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        out[d] = out[d + 1] * shape[d + 1];
    }
    out
}

/// Increment a multi-index in C order. Returns false after the last index.
fn advance(idx: &mut [usize], bounds: &[usize]) -> bool {
    for d in (0..idx.len()).rev() {
        idx[d] += 1;
        if idx[d] < bounds[d] {
            return true;
        }
        idx[d] = 0;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_keeps_small_arrays_whole() {
        assert_eq!(guess_chunk_shape(&[4, 4], 8, 1 << 20), vec![4, 4]);
        assert_eq!(guess_chunk_shape(&[0], 8, 1 << 20), vec![1]);
        assert_eq!(guess_chunk_shape(&[], 8, 1 << 20), Vec::<usize>::new());
    }

    #[test]
    fn test_guess_halves_largest_axis() {
        // 1000x1000 f64 = 8 MB -> must fit 1 MiB
        let chunk = guess_chunk_shape(&[1000, 1000], 8, 1 << 20);
        assert!(chunk.iter().product::<usize>() * 8 <= 1 << 20);
        assert_eq!(chunk, vec![250, 500]);

        let chunk = guess_chunk_shape(&[7], 1, 2);
        assert_eq!(chunk, vec![2]);
    }

    #[test]
    fn test_guess_and_coords_for_empty_array_with_huge_axes() {
        let shape = [usize::MAX, 0, usize::MAX];
        let chunk = guess_chunk_shape(&shape, 4, 1024);
        assert!(chunk.iter().product::<usize>() * 4 <= 1024);

        let grid = ChunkGrid::new(shape.to_vec(), chunk);
        assert!(grid.chunk_coords().is_empty());
    }

    #[test]
    fn test_chunk_keys() {
        let enc = KeyEncoding::default();
        assert_eq!(enc.chunk_key(&[0, 3]), "c/0/3");
        assert_eq!(enc.chunk_key(&[]), "c");
        let v2 = KeyEncoding::parse("v2", None).unwrap();
        assert_eq!(v2.chunk_key(&[1, 2]), "1.2");
        assert!(KeyEncoding::parse("default", Some("-")).is_err());
    }

    #[test]
    fn test_grid_coords() {
        let grid = ChunkGrid::new(vec![5, 3], vec![2, 3]);
        assert_eq!(grid.grid_shape(), vec![3, 1]);
        assert_eq!(grid.chunk_coords(), vec![vec![0, 0], vec![1, 0], vec![2, 0]]);

        let empty = ChunkGrid::new(vec![0, 4], vec![1, 4]);
        assert!(empty.chunk_coords().is_empty());

        let scalar = ChunkGrid::new(vec![], vec![]);
        assert_eq!(scalar.chunk_coords(), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_extract_pads_and_insert_crops() {
        // 3x3 u8 array, 2x2 chunks
        let array: Vec<u8> = (1..=9).collect();
        let grid = ChunkGrid::new(vec![3, 3], vec![2, 2]);

        assert_eq!(grid.extract(&array, &[0, 0], &[0]), vec![1, 2, 4, 5]);
        assert_eq!(grid.extract(&array, &[0, 1], &[0]), vec![3, 0, 6, 0]);
        assert_eq!(grid.extract(&array, &[1, 1], &[0]), vec![9, 0, 0, 0]);

        let mut rebuilt = vec![0u8; 9];
        for coords in grid.chunk_coords() {
            let chunk = grid.extract(&array, &coords, &[0]);
            grid.insert(&mut rebuilt, &coords, &chunk, 1);
        }
        assert_eq!(rebuilt, array);
    }

    #[test]
    fn test_multibyte_three_dims() {
        let shape = vec![3, 4, 5];
        let values: Vec<u16> = (0..60).collect();
        let array: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let grid = ChunkGrid::new(shape, vec![2, 3, 2]);

        let mut rebuilt = vec![0u8; array.len()];
        for coords in grid.chunk_coords() {
            let chunk = grid.extract(&array, &coords, &[0xff, 0xff]);
            assert_eq!(chunk.len(), grid.chunk_len() * 2);
            grid.insert(&mut rebuilt, &coords, &chunk, 2);
        }
        assert_eq!(rebuilt, array);
    }
}
