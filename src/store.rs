use std::path::PathBuf;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::{flat::FlatL2Index, IndexError, VectorIndex};

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredImage {
    pub path: PathBuf,
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub path: PathBuf,
    pub distance: f32,
}

struct Entries<I> {
    images: Vec<StoredImage>,
    index: I,
}

/// Stored images and their embeddings, kept in lockstep.
///
/// Position `i` of the index always belongs to `images[i]`: both are only
/// ever appended together while holding the write lock.
pub struct SimilarityStore<I = FlatL2Index> {
    entries: RwLock<Entries<I>>,
}

impl SimilarityStore<FlatL2Index> {
    pub fn flat(dim: usize) -> Self {
        Self::new(FlatL2Index::new(dim))
    }
}

impl<I: VectorIndex> SimilarityStore<I> {
    /// Wraps an index. Vectors already present in `index` have no stored
    /// image, so the index must be empty.
    pub fn new(index: I) -> Self {
        assert!(index.is_empty(), "similarity store needs an empty index");
        Self {
            entries: RwLock::new(Entries {
                images: Vec::new(),
                index,
            }),
        }
    }

    pub fn dim(&self) -> usize {
        self.entries.read().index.dim()
    }

    pub fn len(&self) -> usize {
        self.entries.read().images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `vector` to the index and `path` to the image list.
    ///
    /// The path is only recorded once the index accepted the vector, so a
    /// rejected vector leaves both collections untouched.
    pub fn add(&self, vector: &[f32], path: PathBuf) -> Result<StoredImage, StoreError> {
        let mut entries = self.entries.write();

        let index = entries.index.add(vector)?;
        debug_assert_eq!(index, entries.images.len());

        let stored = StoredImage { path, index };
        entries.images.push(stored.clone());

        tracing::debug!(
            index,
            path = %stored.path.display(),
            "Added image to similarity store"
        );

        Ok(stored)
    }

    /// The `k` stored images closest to `vector`, closest first.
    pub fn search(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        let entries = self.entries.read();

        // Asking for more than is stored only adds unset slots.
        let k = k.min(entries.images.len());
        let neighbors = entries.index.search(vector, k)?;

        let hits = neighbors
            .into_iter()
            .filter_map(|neighbor| {
                let image = entries.images.get(neighbor.id?)?;
                Some(SearchHit {
                    path: image.path.clone(),
                    distance: neighbor.distance,
                })
            })
            .collect::<Vec<_>>();

        Ok(hits)
    }

    #[cfg(test)]
    pub(crate) fn images(&self) -> Vec<StoredImage> {
        self.entries.read().images.clone()
    }
}
