//! CLIP ViT-B/32 image encoder running on ONNX Runtime.
//!
//! Expects the vision tower exported to ONNX (for example the
//! `vision_model.onnx` of `openai/clip-vit-base-patch32`), taking
//! `pixel_values` of shape `[1, 3, 224, 224]` and producing a 512-dimension
//! `image_embeds` output.

use std::path::Path;

use image::{imageops, imageops::FilterType, RgbImage};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;

use super::{decode_rgb, l2_normalize, EmbedError, ImageEmbedder, EMBEDDING_DIM};

const INPUT_SIZE: u32 = 224;
const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
const CLIP_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];
const DEFAULT_OUTPUT: &str = "image_embeds";

pub struct ClipEmbedder {
    // `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

fn inference_error(e: impl std::fmt::Display) -> EmbedError {
    EmbedError::Inference(e.to_string())
}

impl ClipEmbedder {
    pub fn new(model_path: &Path, intra_threads: usize) -> Result<Self, EmbedError> {
        if !model_path.exists() {
            return Err(EmbedError::ModelNotFound(model_path.to_path_buf()));
        }

        tracing::info!("Loading CLIP vision model from {}", model_path.display());

        let session = Session::builder()
            .map_err(inference_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(inference_error)?
            .with_intra_threads(intra_threads)
            .map_err(inference_error)?
            .commit_from_file(model_path)
            .map_err(inference_error)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "pixel_values".to_string());

        // Exports that only have one output may name it anything.
        let output_name = session
            .outputs
            .iter()
            .find(|output| output.name == DEFAULT_OUTPUT)
            .or_else(|| session.outputs.first())
            .map(|output| output.name.clone())
            .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

        tracing::info!(
            input = %input_name,
            output = %output_name,
            "CLIP vision model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    fn run(&self, pixel_values: Vec<f32>) -> Result<Vec<f32>, EmbedError> {
        let size = INPUT_SIZE as usize;
        let input = Tensor::from_array((vec![1, 3, size, size], pixel_values))
            .map_err(inference_error)?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(inference_error)?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            EmbedError::Inference(format!("vision model has no output {:?}", self.output_name))
        })?;

        let (_shape, data) = output.try_extract_tensor::<f32>().map_err(inference_error)?;
        Ok(data.to_vec())
    }
}

/// Center crop the largest square, resize it to 224x224 (bicubic), then
/// normalize with the CLIP channel statistics. Returns a CHW buffer.
pub(crate) fn preprocess(image: &RgbImage) -> Vec<f32> {
    let (w, h) = image.dimensions();
    let side = w.min(h);
    let left = (w - side) / 2;
    let top = (h - side) / 2;

    // crop in source coordinates so thin images never blow up in size
    let square = imageops::crop_imm(image, left, top, side, side).to_image();
    let cropped = imageops::resize(&square, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut pixels = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in cropped.enumerate_pixels() {
        let offset = (y * INPUT_SIZE + x) as usize;
        for c in 0..3 {
            let value = pixel.0[c] as f32 / 255.0;
            pixels[c * plane + offset] = (value - CLIP_MEAN[c]) / CLIP_STD[c];
        }
    }

    pixels
}

impl ImageEmbedder for ClipEmbedder {
    fn dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn embed(&self, bytes: &[u8]) -> Result<Vec<f32>, EmbedError> {
        let image = decode_rgb(bytes)?;
        let embedding = self.run(preprocess(&image))?;

        if embedding.len() != EMBEDDING_DIM {
            return Err(EmbedError::Inference(format!(
                "expected a {}-dimension embedding, model returned {}",
                EMBEDDING_DIM,
                embedding.len()
            )));
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(EmbedError::Inference(
                "embedding contains non-finite values".to_string(),
            ));
        }

        tracing::debug!(dims = embedding.len(), "Generated CLIP image embedding");

        Ok(l2_normalize(&embedding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let image: RgbImage = ImageBuffer::from_pixel(300, 200, Rgb([255, 0, 128]));
        let pixels = preprocess(&image);

        let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
        assert_eq!(pixels.len(), 3 * plane);

        let expected_r = (1.0 - CLIP_MEAN[0]) / CLIP_STD[0];
        let expected_g = (0.0 - CLIP_MEAN[1]) / CLIP_STD[1];
        assert!((pixels[0] - expected_r).abs() < 1e-3);
        assert!((pixels[plane] - expected_g).abs() < 1e-3);
    }

    #[test]
    fn test_preprocess_center_crops_wide_images() {
        // left half black, right half white: the crop keeps both around the center
        let image: RgbImage = ImageBuffer::from_fn(448, 224, |x, _| {
            if x < 224 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let pixels = preprocess(&image);

        let black = (0.0 - CLIP_MEAN[0]) / CLIP_STD[0];
        let white = (1.0 - CLIP_MEAN[0]) / CLIP_STD[0];
        assert!((pixels[0] - black).abs() < 1e-3);
        assert!((pixels[(INPUT_SIZE - 1) as usize] - white).abs() < 1e-3);
    }

    #[test]
    fn test_tiny_images_are_upscaled() {
        let image: RgbImage = ImageBuffer::from_pixel(3, 5, Rgb([1, 2, 3]));
        assert_eq!(preprocess(&image).len(), 3 * 224 * 224);
    }

    #[test]
    fn test_thin_images_stay_bounded() {
        let tall: RgbImage = ImageBuffer::from_pixel(1, 3000, Rgb([40, 80, 120]));
        let wide: RgbImage = ImageBuffer::from_pixel(20000, 1, Rgb([40, 80, 120]));

        for image in [tall, wide] {
            let pixels = preprocess(&image);
            assert_eq!(pixels.len(), 3 * 224 * 224);
            let expected_b = (120.0 / 255.0 - CLIP_MEAN[2]) / CLIP_STD[2];
            assert!((pixels[2 * 224 * 224] - expected_b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ClipEmbedder::new(&dir.path().join("missing.onnx"), 1);
        assert!(matches!(result, Err(EmbedError::ModelNotFound(_))));
    }
}
