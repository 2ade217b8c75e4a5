//! SCRFD face detector via ONNX Runtime.
//!
//! Runs the anchor-free SCRFD detection model on RGB frames and decodes
//! per-stride score/box tensors into frame-space bounding boxes.

use crate::types::BoundingBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const DETECT_INPUT_SIZE: usize = 640;
const DETECT_MEAN: f32 = 127.5;
const DETECT_STD: f32 = 128.0;
const DETECT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DETECT_NMS_THRESHOLD: f32 = 0.4;
const DETECT_STRIDES: [usize; 3] = [8, 16, 32];
const DETECT_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Scale and padding applied by the letterbox resize, needed to map
/// detections back into original frame coordinates.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    ///
    /// The model must expose at least six outputs: scores then box
    /// offsets for strides 8/16/32. Landmark outputs, when present, are
    /// ignored.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let num_outputs = session.outputs().len();
        if num_outputs < 2 * DETECT_STRIDES.len() {
            return Err(DetectorError::InferenceFailed(format!(
                "detection model must expose scores and boxes for {} strides, got {num_outputs} outputs",
                DETECT_STRIDES.len()
            )));
        }

        tracing::info!(path = model_path, outputs = num_outputs, "face detection model loaded");

        Ok(Self { session })
    }

    /// Detect faces in an interleaved RGB frame.
    ///
    /// Returns bounding boxes in frame coordinates, highest confidence
    /// first.
    pub fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        let (input, letterbox) = preprocess(rgb, width as usize, height as usize);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (pos, &stride) in DETECT_STRIDES.iter().enumerate() {
            let (_, scores) = outputs[pos]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, boxes) = outputs[pos + DETECT_STRIDES.len()]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("boxes stride {stride}: {e}")))?;

            decode_stride(scores, boxes, stride, &letterbox, &mut candidates);
        }

        let mut faces = non_max_suppression(candidates, DETECT_NMS_THRESHOLD);
        faces.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(faces)
    }
}

/// Letterbox an RGB frame into the square NCHW model input.
///
/// Bilinear sampling per channel; padding carries the mean value so it
/// normalizes to zero.
fn preprocess(rgb: &[u8], width: usize, height: usize) -> (Array4<f32>, Letterbox) {
    let side = DETECT_INPUT_SIZE;
    let scale = (side as f32 / width as f32).min(side as f32 / height as f32);
    let new_w = (width as f32 * scale).round() as usize;
    let new_h = (height as f32 * scale).round() as usize;
    let pad_x = ((side - new_w) / 2) as f32;
    let pad_y = ((side - new_h) / 2) as f32;

    let mut tensor = Array4::<f32>::from_elem((1, 3, side, side), 0.0);

    for y in 0..side {
        for x in 0..side {
            let in_x = x as f32 - pad_x;
            let in_y = y as f32 - pad_y;
            if in_x < 0.0 || in_y < 0.0 || in_x >= new_w as f32 || in_y >= new_h as f32 {
                // Padding region: mean value, normalizes to 0.
                continue;
            }
            let (r, g, b) = sample_bilinear(rgb, width, height, in_x / scale, in_y / scale);
            tensor[[0, 0, y, x]] = (r - DETECT_MEAN) / DETECT_STD;
            tensor[[0, 1, y, x]] = (g - DETECT_MEAN) / DETECT_STD;
            tensor[[0, 2, y, x]] = (b - DETECT_MEAN) / DETECT_STD;
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

/// Bilinear sample of an interleaved RGB buffer at fractional coordinates.
fn sample_bilinear(rgb: &[u8], width: usize, height: usize, fx: f32, fy: f32) -> (f32, f32, f32) {
    let x0 = (fx.floor().max(0.0) as usize).min(width - 1);
    let y0 = (fy.floor().max(0.0) as usize).min(height - 1);
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let dx = (fx - x0 as f32).clamp(0.0, 1.0);
    let dy = (fy - y0 as f32).clamp(0.0, 1.0);

    let mut out = [0.0f32; 3];
    for (c, channel) in out.iter_mut().enumerate() {
        let tl = rgb[(y0 * width + x0) * 3 + c] as f32;
        let tr = rgb[(y0 * width + x1) * 3 + c] as f32;
        let bl = rgb[(y1 * width + x0) * 3 + c] as f32;
        let br = rgb[(y1 * width + x1) * 3 + c] as f32;
        let top = tl + (tr - tl) * dx;
        let bot = bl + (br - bl) * dx;
        *channel = top + (bot - top) * dy;
    }
    (out[0], out[1], out[2])
}

/// Decode one stride level: anchor centers on a `stride`-spaced grid,
/// box tensor holds per-anchor [left, top, right, bottom] offsets in
/// stride units.
fn decode_stride(
    scores: &[f32],
    boxes: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    out: &mut Vec<BoundingBox>,
) {
    let grid = DETECT_INPUT_SIZE / stride;
    let anchors = grid * grid * DETECT_ANCHORS_PER_CELL;

    for idx in 0..anchors {
        let score = match scores.get(idx) {
            Some(&s) if s > DETECT_CONFIDENCE_THRESHOLD => s,
            _ => continue,
        };
        let Some(offsets) = boxes.get(idx * 4..idx * 4 + 4) else {
            continue;
        };

        let cell = idx / DETECT_ANCHORS_PER_CELL;
        let anchor_x = ((cell % grid) * stride) as f32;
        let anchor_y = ((cell / grid) * stride) as f32;

        let x1 = anchor_x - offsets[0] * stride as f32;
        let y1 = anchor_y - offsets[1] * stride as f32;
        let x2 = anchor_x + offsets[2] * stride as f32;
        let y2 = anchor_y + offsets[3] * stride as f32;

        out.push(BoundingBox {
            x: (x1 - letterbox.pad_x) / letterbox.scale,
            y: (y1 - letterbox.pad_y) / letterbox.scale,
            width: (x2 - x1) / letterbox.scale,
            height: (y2 - y1) / letterbox.scale,
            confidence: score,
        });
    }
}

/// Drop detections that overlap a higher-confidence detection.
fn non_max_suppression(mut candidates: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<BoundingBox> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Intersection-over-union of two boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, w: f32, h: f32, conf: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: conf,
        }
    }

    #[test]
    fn test_iou_identical_boxes() {
        let a = bbox(10.0, 10.0, 50.0, 50.0, 0.9);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint_boxes() {
        let a = bbox(0.0, 0.0, 10.0, 10.0, 0.9);
        let b = bbox(100.0, 100.0, 10.0, 10.0, 0.9);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = bbox(0.0, 0.0, 10.0, 10.0, 0.9);
        let b = bbox(5.0, 0.0, 10.0, 10.0, 0.9);
        let expected = 50.0 / 150.0;
        assert!((iou(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_nms_keeps_highest_confidence() {
        let candidates = vec![
            bbox(2.0, 2.0, 100.0, 100.0, 0.7),
            bbox(0.0, 0.0, 100.0, 100.0, 0.9),
            bbox(300.0, 300.0, 40.0, 40.0, 0.6),
        ];
        let kept = non_max_suppression(candidates, 0.4);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert!((kept[1].confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(non_max_suppression(Vec::new(), 0.4).is_empty());
    }

    #[test]
    fn test_decode_stride_maps_back_to_frame_space() {
        // One anchor above threshold at the second grid cell of stride 8
        // (center (8, 0)), offsets one stride left/up and two right/down,
        // mapped back through a 0.5x letterbox with no padding.
        let grid = DETECT_INPUT_SIZE / 8;
        let anchors = grid * grid * DETECT_ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; anchors];
        let mut boxes = vec![0.0f32; anchors * 4];
        // Anchor 2 is the first anchor of cell 1 → center (8, 0).
        scores[2] = 0.8;
        boxes[8..12].copy_from_slice(&[1.0, 1.0, 2.0, 2.0]);

        let letterbox = Letterbox {
            scale: 0.5,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let mut out = Vec::new();
        decode_stride(&scores, &boxes, 8, &letterbox, &mut out);

        assert_eq!(out.len(), 1);
        let face = &out[0];
        assert!((face.x - 0.0).abs() < 1e-4); // (8 - 1*8) / 0.5
        assert!((face.y + 16.0).abs() < 1e-4); // (0 - 1*8) / 0.5
        assert!((face.width - 48.0).abs() < 1e-4); // 3*8 / 0.5
        assert!((face.height - 48.0).abs() < 1e-4);
        assert!((face.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_decode_stride_ignores_low_scores() {
        let grid = DETECT_INPUT_SIZE / 32;
        let anchors = grid * grid * DETECT_ANCHORS_PER_CELL;
        let scores = vec![0.1f32; anchors];
        let boxes = vec![1.0f32; anchors * 4];

        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let mut out = Vec::new();
        decode_stride(&scores, &boxes, 32, &letterbox, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_preprocess_uniform_frame() {
        // A uniform mid-gray frame should produce a uniform tensor in the
        // image region and zeros in the padding.
        let width = 64;
        let height = 32;
        let rgb = vec![128u8; width * height * 3];
        let (tensor, letterbox) = preprocess(&rgb, width, height);

        assert_eq!(tensor.shape(), &[1, 3, DETECT_INPUT_SIZE, DETECT_INPUT_SIZE]);
        assert!(letterbox.scale > 0.0);

        let expected = (128.0 - DETECT_MEAN) / DETECT_STD;
        let center = tensor[[0, 0, DETECT_INPUT_SIZE / 2, DETECT_INPUT_SIZE / 2]];
        assert!((center - expected).abs() < 1e-6);
        // Top edge is padding (wide frame letterboxed vertically).
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
    }

    #[test]
    fn test_sample_bilinear_clamps_at_edges() {
        let rgb = vec![200u8; 4 * 4 * 3];
        let (r, g, b) = sample_bilinear(&rgb, 4, 4, 3.9, 3.9);
        assert_eq!((r, g, b), (200.0, 200.0, 200.0));
    }
}
