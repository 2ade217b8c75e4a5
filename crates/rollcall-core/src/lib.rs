//! rollcall-core — Face detection, embedding, and gallery matching.
//!
//! SCRFD detection and ArcFace embedding run via ONNX Runtime; matching
//! is first-match-wins Euclidean distance against the in-memory gallery.

pub mod detector;
pub mod embedder;
pub mod source;
pub mod types;

pub use source::{EmbeddingSource, OnnxEmbeddingSource, SourceError};
pub use types::{
    BoundingBox, Detection, Embedding, FirstMatchMatcher, Gallery, Identity, Matcher,
    DEFAULT_MATCH_THRESHOLD,
};
