use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, in the coordinate space of the frame
/// it was detected in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Rescale this box from the source frame's coordinate space to a
    /// display surface of the given size.
    ///
    /// Detection runs on the raw frame while overlays are drawn on a
    /// fixed-size canvas, so boxes drift unless rescaled.
    pub fn scaled_to(&self, from: (u32, u32), to: (u32, u32)) -> BoundingBox {
        let (fw, fh) = from;
        let (tw, th) = to;
        if fw == 0 || fh == 0 {
            return self.clone();
        }
        let sx = tw as f32 / fw as f32;
        let sy = th as f32 / fh as f32;
        BoundingBox {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
            confidence: self.confidence,
        }
    }
}

/// Face embedding vector (typically 128-dimensional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Euclidean distance between two descriptors. Lower = more similar.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A raw video frame as delivered by a feed, plus its dimensions.
///
/// The pixel payload is opaque to the core — only the face engine
/// interprets it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// One face found in a frame: its box plus the embedding extracted from it.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub descriptor: Descriptor,
}

/// A label plus the descriptors enrolled for it. Immutable once a matcher
/// has been built from it; re-enrollment produces a new `Identity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub label: String,
    pub descriptors: Vec<Descriptor>,
}

impl Identity {
    pub fn new(label: impl Into<String>, descriptors: Vec<Descriptor>) -> Self {
        Self {
            label: label.into(),
            descriptors,
        }
    }

    /// Mean Euclidean distance from `probe` to this identity's descriptors.
    ///
    /// Averaging over all enrolled shots smooths out a single bad capture.
    /// Returns `f32::INFINITY` for an identity with no descriptors so it
    /// can never win a nearest-identity query.
    pub fn mean_distance(&self, probe: &Descriptor) -> f32 {
        if self.descriptors.is_empty() {
            return f32::INFINITY;
        }
        let total: f32 = self
            .descriptors
            .iter()
            .map(|d| d.euclidean_distance(probe))
            .sum();
        total / self.descriptors.len() as f32
    }
}
