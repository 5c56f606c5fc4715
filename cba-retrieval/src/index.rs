//! Flat L2 vector index
//!
//! Exact nearest-neighbor scan under squared Euclidean distance. Vectors are
//! stored unnormalized, so magnitude affects ranking. Ordinal positions are
//! the join key back to the metadata file and are never reordered.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// Label reported for result slots that hold no match
pub const SENTINEL: i64 = -1;

const MAGIC: [u8; 8] = *b"CBAFLAT\0";
const FORMAT_VERSION: u32 = 1;

/// Raw k-NN output: parallel slots of distance and ordinal label
///
/// Always holds exactly `k` slots; unused ones carry [`SENTINEL`] and an
/// infinite distance.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbors {
    pub distances: Vec<f32>,
    pub labels: Vec<i64>,
}

impl Neighbors {
    /// Iterate over real matches as (ordinal, distance), skipping sentinels
    pub fn matches(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.labels
            .iter()
            .zip(&self.distances)
            .filter(|(label, _)| **label != SENTINEL)
            .filter_map(|(label, dist)| usize::try_from(*label).ok().map(|i| (i, *dist)))
    }
}

/// Nearest-neighbor search capability
pub trait VectorIndex {
    /// Vector dimensionality
    fn dimension(&self) -> usize;

    /// Number of stored vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the `k` closest vectors to `query`, ascending by distance
    fn search(&self, query: &[f32], k: usize) -> Result<Neighbors>;
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    magic: [u8; 8],
    version: u32,
    dimension: u32,
    vectors: Vec<f32>,
}

/// Brute-force index over a contiguous vector buffer
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    vectors: Vec<f32>,
}

impl FlatL2Index {
    /// Build an index; position `i` of the input becomes ordinal `i`
    pub fn from_vectors(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dimension = match vectors.first() {
            Some(first) if !first.is_empty() => first.len(),
            Some(_) => return Err(RetrievalError::config("cannot index zero-length vectors")),
            None => return Err(RetrievalError::NoChunks),
        };

        let mut flat = Vec::with_capacity(dimension * vectors.len());
        for vector in &vectors {
            if vector.len() != dimension {
                return Err(RetrievalError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            flat.extend_from_slice(vector);
        }

        Ok(Self {
            dimension,
            vectors: flat,
        })
    }

    /// Vector stored at `ordinal`
    pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
        let start = ordinal.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    /// Write the index as a single binary artifact
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = IndexFile {
            magic: MAGIC,
            version: FORMAT_VERSION,
            dimension: self.dimension as u32,
            vectors: self.vectors.clone(),
        };
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, &file)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Read an index written by [`save`](Self::save)
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(RetrievalError::IndexNotFound(path.to_path_buf()));
        }

        let reader = BufReader::new(File::open(path)?);
        let file: IndexFile = bincode::deserialize_from(reader)
            .map_err(|e| RetrievalError::corrupt(path, e.to_string()))?;

        if file.magic != MAGIC {
            return Err(RetrievalError::corrupt(path, "not a vector index file"));
        }
        if file.version != FORMAT_VERSION {
            return Err(RetrievalError::corrupt(
                path,
                format!("unsupported index format version {}", file.version),
            ));
        }
        let dimension = file.dimension as usize;
        if dimension == 0 || file.vectors.is_empty() || file.vectors.len() % dimension != 0 {
            return Err(RetrievalError::corrupt(
                path,
                format!(
                    "{} values do not form {}-dimensional vectors",
                    file.vectors.len(),
                    dimension
                ),
            ));
        }

        Ok(Self {
            dimension,
            vectors: file.vectors,
        })
    }
}

impl VectorIndex for FlatL2Index {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Neighbors> {
        if query.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .chunks_exact(self.dimension)
            .map(|v| squared_l2(query, v))
            .enumerate()
            .map(|(i, d)| (d, i))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        let mut neighbors = Neighbors {
            distances: Vec::with_capacity(scored.len()),
            labels: Vec::with_capacity(scored.len()),
        };
        for (dist, idx) in scored {
            neighbors.distances.push(dist);
            neighbors.labels.push(idx as i64);
        }
        while neighbors.labels.len() < k {
            neighbors.distances.push(f32::INFINITY);
            neighbors.labels.push(SENTINEL);
        }

        Ok(neighbors)
    }
}

/// Squared Euclidean distance
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> FlatL2Index {
        FlatL2Index::from_vectors(vec![
            vec![0.0, 0.0],
            vec![3.0, 4.0],
            vec![1.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_squared_l2() {
        assert_eq!(squared_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(squared_l2(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_search_orders_ascending() {
        let index = sample();
        let hits = index.search(&[0.9, 0.0], 3).unwrap();
        assert_eq!(hits.labels, vec![2, 0, 1]);
        assert!(hits.distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_search_pads_with_sentinels() {
        let index = sample();
        let hits = index.search(&[0.0, 0.0], 5).unwrap();
        assert_eq!(hits.labels, vec![0, 2, 1, SENTINEL, SENTINEL]);
        assert!(hits.distances[3].is_infinite());
        assert_eq!(hits.matches().count(), 3);
    }

    #[test]
    fn test_search_zero_k() {
        let hits = sample().search(&[0.0, 0.0], 0).unwrap();
        assert!(hits.labels.is_empty());
    }

    #[test]
    fn test_search_wrong_dimension() {
        let err = sample().search(&[0.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_from_vectors_rejects_ragged_and_empty() {
        assert!(matches!(
            FlatL2Index::from_vectors(vec![]),
            Err(RetrievalError::NoChunks)
        ));
        assert!(FlatL2Index::from_vectors(vec![vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_save_load_keeps_ordinals() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors.bin");
        let index = sample();
        index.save(&path).unwrap();

        let loaded = FlatL2Index::load(&path).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.vector(1), Some(&[3.0, 4.0][..]));
        assert_eq!(loaded.vector(3), None);
    }

    #[test]
    fn test_load_missing_is_index_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            FlatL2Index::load(&dir.path().join("vectors.bin")),
            Err(RetrievalError::IndexNotFound(_))
        ));
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors.bin");
        std::fs::write(&path, b"definitely not an index").unwrap();
        assert!(matches!(
            FlatL2Index::load(&path),
            Err(RetrievalError::CorruptArtifact { .. })
        ));
    }
}
