use thiserror::Error;

pub mod flat;

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("dimension mismatch: index holds {expected}-dimension vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// One slot of a k-NN answer. `id` is `None` when the index holds fewer
/// vectors than were asked for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: Option<usize>,
    pub distance: f32,
}

impl Neighbor {
    pub fn unset() -> Self {
        Self {
            id: None,
            distance: f32::INFINITY,
        }
    }
}

pub trait VectorIndex: Send + Sync {
    fn dim(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a vector and returns its position.
    fn add(&mut self, vector: &[f32]) -> Result<usize, IndexError>;

    /// Returns exactly `k` slots, closest first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError>;
}
