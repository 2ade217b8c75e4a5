//! The embedding source: frames in, detections out.
//!
//! The recognition loop only sees the [`EmbeddingSource`] trait; the
//! shipped implementation chains the SCRFD detector and the ArcFace
//! embedder.

use crate::detector::{DetectorError, FaceDetector};
use crate::embedder::{EmbedderError, FaceEmbedder};
use crate::types::Detection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("embedder error: {0}")]
    Embedder(#[from] EmbedderError),
}

/// Produces face detections (bounding box + embedding) from RGB frames.
pub trait EmbeddingSource {
    fn detect(&mut self, rgb: &[u8], width: u32, height: u32)
        -> Result<Vec<Detection>, SourceError>;
}

/// ONNX-backed embedding source: SCRFD detection followed by ArcFace
/// embedding extraction for every detected face.
pub struct OnnxEmbeddingSource {
    detector: FaceDetector,
    embedder: FaceEmbedder,
}

impl OnnxEmbeddingSource {
    pub fn load(detector_path: &str, embedder_path: &str) -> Result<Self, SourceError> {
        Ok(Self {
            detector: FaceDetector::load(detector_path)?,
            embedder: FaceEmbedder::load(embedder_path)?,
        })
    }
}

impl EmbeddingSource for OnnxEmbeddingSource {
    fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, SourceError> {
        let faces = self.detector.detect(rgb, width, height)?;
        let mut detections = Vec::with_capacity(faces.len());

        for bbox in faces {
            match self.embedder.extract(rgb, width, height, &bbox) {
                Ok(embedding) => detections.push(Detection { bbox, embedding }),
                // A box clamped down to nothing carries no face; skip it
                // rather than dropping the whole frame.
                Err(EmbedderError::EmptyCrop) => {
                    tracing::debug!(?bbox, "skipping detection with empty crop");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(detections)
    }
}
