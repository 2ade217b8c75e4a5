//! ArcFace face embedder via ONNX Runtime.
//!
//! Crops a detected face out of the RGB frame, resizes it to the model's
//! 112x112 input, and extracts an L2-normalized 512-dimensional
//! embedding.

use crate::types::{BoundingBox, Embedding};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const EMBED_INPUT_SIZE: usize = 112;
const EMBED_MEAN: f32 = 127.5;
const EMBED_STD: f32 = 127.5;
const EMBED_DIM: usize = 512;
/// Widen the detector box by this factor before cropping so the whole
/// face, not just the tight detection, reaches the model.
const CROP_EXPAND: f32 = 1.15;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face box lies outside the frame")]
    EmptyCrop,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based face embedder.
pub struct FaceEmbedder {
    session: Session,
}

impl FaceEmbedder {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EmbedderError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "face embedding model loaded");

        Ok(Self { session })
    }

    /// Extract an embedding for one detected face in an RGB frame.
    pub fn extract(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
    ) -> Result<Embedding, EmbedderError> {
        let input = crop_and_preprocess(rgb, width as usize, height as usize, face)
            .ok_or(EmbedderError::EmptyCrop)?;

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding output: {e}")))?;

        if raw.len() != EMBED_DIM {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected {EMBED_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding::new(l2_normalize(raw)))
    }
}

/// L2-normalize an embedding vector. Zero vectors pass through unchanged.
fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|v| v / norm).collect()
    } else {
        raw.to_vec()
    }
}

/// Square-expand the detection box, clamp it into the frame, and resize
/// the crop to the model input as a normalized NCHW tensor.
///
/// Returns `None` when the clamped crop has no area.
fn crop_and_preprocess(
    rgb: &[u8],
    width: usize,
    height: usize,
    face: &BoundingBox,
) -> Option<Array4<f32>> {
    // Square box around the detection center.
    let side = face.width.max(face.height) * CROP_EXPAND;
    let cx = face.x + face.width / 2.0;
    let cy = face.y + face.height / 2.0;

    let left = ((cx - side / 2.0).floor().max(0.0)) as usize;
    let top = ((cy - side / 2.0).floor().max(0.0)) as usize;
    let right = ((cx + side / 2.0).ceil() as usize).min(width);
    let bottom = ((cy + side / 2.0).ceil() as usize).min(height);

    if right <= left || bottom <= top {
        return None;
    }

    let crop_w = right - left;
    let crop_h = bottom - top;
    let size = EMBED_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size {
        // Nearest-neighbor resize of the crop.
        let src_y = top + (y * crop_h) / size;
        for x in 0..size {
            let src_x = left + (x * crop_w) / size;
            let base = (src_y * width + src_x) * 3;
            for c in 0..3 {
                let pixel = rgb[base + c] as f32;
                tensor[[0, c, y, x]] = (pixel - EMBED_MEAN) / EMBED_STD;
            }
        }
    }

    Some(tensor)
}
