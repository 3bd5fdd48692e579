use itertools::Itertools;

use super::{IndexError, Neighbor, VectorIndex};

/// Brute-force index: every query is compared against every stored vector
/// using squared Euclidean distance.
pub struct FlatL2Index {
    dim: usize,
    // row-major, `dim` floats per vector
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "index dimension must be non-zero");
        Self {
            dim,
            data: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn vector(&self, id: usize) -> Option<&[f32]> {
        self.data.chunks_exact(self.dim).nth(id)
    }

    fn check_dim(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl VectorIndex for FlatL2Index {
    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    fn add(&mut self, vector: &[f32]) -> Result<usize, IndexError> {
        self.check_dim(vector)?;
        let id = self.len();
        self.data.extend_from_slice(vector);
        Ok(id)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.check_dim(query)?;

        let mut neighbors = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(id, vector)| Neighbor {
                id: Some(id),
                distance: squared_l2(query, vector),
            })
            .k_smallest_by(k, |a, b| a.distance.total_cmp(&b.distance))
            .collect::<Vec<_>>();

        neighbors.resize(k, Neighbor::unset());

        Ok(neighbors)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(a, b)| (a - b) * (a - b)).sum::<f32>()
}
