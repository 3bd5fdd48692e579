use super::{decode_rgb, l2_normalize, EmbedError, ImageEmbedder, EMBEDDING_DIM};

const BINS_PER_CHANNEL: usize = 8;

/// Model-free embedder: an 8x8x8 RGB color histogram.
///
/// Only captures color distribution, but it is deterministic, needs no model
/// file and has the same dimension as the CLIP vision tower.
pub struct HistogramEmbedder {}

impl HistogramEmbedder {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for HistogramEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn bin(channel: u8) -> usize {
    channel as usize * BINS_PER_CHANNEL / 256
}

impl ImageEmbedder for HistogramEmbedder {
    fn dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn embed(&self, bytes: &[u8]) -> Result<Vec<f32>, EmbedError> {
        let image = decode_rgb(bytes)?;

        let mut histogram = vec![0.0f32; EMBEDDING_DIM];
        for pixel in image.pixels() {
            let [r, g, b] = pixel.0;
            let slot = (bin(r) * BINS_PER_CHANNEL + bin(g)) * BINS_PER_CHANNEL + bin(b);
            histogram[slot] += 1.0;
        }

        Ok(l2_normalize(&histogram))
    }
}
