use std::sync::Arc;

use thiserror::Error;

use crate::config::EmbedderKind;

pub mod clip;
pub mod histogram;

/// Every embedder in this crate produces vectors of this length.
pub const EMBEDDING_DIM: usize = 512;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("inference error: {0}")]
    Inference(String),
    #[error("model file not found at {0}")]
    ModelNotFound(std::path::PathBuf),
}

/// Turns raw image bytes into a fixed-length, unit-normalized vector.
///
/// `embed` is blocking. Callers on an async runtime should run it with
/// `tokio::task::spawn_blocking`.
pub trait ImageEmbedder: Send + Sync {
    fn dim(&self) -> usize;

    fn embed(&self, bytes: &[u8]) -> Result<Vec<f32>, EmbedError>;
}

pub fn from_config(kind: &EmbedderKind) -> Result<Arc<dyn ImageEmbedder>, EmbedError> {
    match kind {
        EmbedderKind::Clip {
            model_path,
            intra_threads,
        } => Ok(Arc::new(clip::ClipEmbedder::new(model_path, *intra_threads)?)),
        EmbedderKind::Histogram => {
            tracing::warn!("Using color histogram embeddings, similarity is color-only");
            Ok(Arc::new(histogram::HistogramEmbedder::new()))
        }
    }
}

/// Decodes bytes of any supported format into an RGB image.
pub fn decode_rgb(bytes: &[u8]) -> Result<image::RgbImage, EmbedError> {
    let image = image::load_from_memory(bytes)?;
    Ok(image.to_rgb8())
}

pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm.is_finite() && norm > 1e-10 {
        v.iter().map(|x| x / norm).collect()
    } else {
        // zero vector keeps NaN out of distance computations
        vec![0.0; v.len()]
    }
}

#[cfg(test)]
pub(crate) mod test_images {
    use std::io::Cursor;

    use image::{ImageBuffer, ImageFormat, Rgb};

    /// PNG bytes of a `size`x`size` image filled by `pixel`.
    pub fn png<F>(size: u32, pixel: F) -> Vec<u8>
    where
        F: Fn(u32, u32) -> [u8; 3],
    {
        let buffer = ImageBuffer::from_fn(size, size, |x, y| Rgb(pixel(x, y)));
        let mut bytes = Cursor::new(Vec::new());
        buffer.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    pub fn solid(color: [u8; 3]) -> Vec<u8> {
        png(16, |_, _| color)
    }

    pub fn gradient() -> Vec<u8> {
        png(32, |x, y| [(x * 8) as u8, (y * 8) as u8, 128])
    }
}
