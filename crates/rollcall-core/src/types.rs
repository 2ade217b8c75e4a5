use serde::{Deserialize, Serialize};

/// Default Euclidean-distance threshold for a positive gallery match.
///
/// Probes farther than this from every stored embedding are classified
/// as unknown.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

/// Axis-aligned bounding box for a detected face, in frame pixel coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Face embedding vector produced by the recognition model.
///
/// Serializes as a bare float array so persisted identity records keep
/// the flat `"encoding": [..]` field shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance to another embedding.
    ///
    /// Embeddings of different dimensions never match: the distance is
    /// reported as infinite rather than silently truncating.
    pub fn distance(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A known identity: the primary key is `name`.
///
/// The on-disk record keeps the historical field name `encoding` for the
/// embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "encoding")]
    pub embedding: Embedding,
    pub name: String,
    pub roll_number: String,
    pub section: String,
}

/// A transient per-frame detection: where the face is and what it looks like.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

/// In-memory set of known identities, ordered by insertion.
///
/// Names are unique: inserting an identity whose name is already present
/// replaces the existing entry in place, preserving its position.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    identities: Vec<Identity>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by name. Replacement keeps the original slot so
    /// match iteration order stays stable across re-enrollment.
    pub fn insert(&mut self, identity: Identity) {
        match self.identities.iter_mut().find(|i| i.name == identity.name) {
            Some(slot) => *slot = identity,
            None => self.identities.push(identity),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Identity> {
        self.identities.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

/// Strategy for resolving a probe embedding against the gallery.
pub trait Matcher {
    fn find<'a>(
        &self,
        probe: &Embedding,
        gallery: &'a Gallery,
        threshold: f32,
    ) -> Option<&'a Identity>;
}

/// First-match-wins resolution in gallery iteration order.
///
/// The first identity whose embedding falls within the distance
/// threshold is returned; later, possibly nearer, entries are not
/// considered.
pub struct FirstMatchMatcher;

impl Matcher for FirstMatchMatcher {
    fn find<'a>(
        &self,
        probe: &Embedding,
        gallery: &'a Gallery,
        threshold: f32,
    ) -> Option<&'a Identity> {
        gallery
            .iter()
            .find(|identity| probe.distance(&identity.embedding) <= threshold)
    }
}
