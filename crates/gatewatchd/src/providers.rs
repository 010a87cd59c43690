//! Contracts for the subsystems the detection core collaborates with:
//! frame acquisition, face detection/embedding, identity persistence and
//! notification rendering. The daemon treats them all as black boxes.

use std::sync::Arc;

use thiserror::Error;

use gatewatch_core::{DetectedFace, Frame};

use crate::notify::NotificationEvent;

/// Failures from the camera-acquisition layer. Typed so a gate can
/// observe them and sit out the tick instead of crashing.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera device not found")]
    DeviceNotFound,
    #[error("camera constraints unsatisfiable: {0}")]
    ConstraintUnsatisfiable(String),
}

/// What a feed had to offer when polled.
#[derive(Debug)]
pub enum FrameStatus {
    Active(Frame),
    /// The feed exists but is not delivering frames (paused or ended).
    Paused,
}

/// Live video source for one gate.
pub trait FrameSource: Send {
    fn current_frame(&mut self) -> Result<FrameStatus, FeedError>;
}

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("detection backend: {0}")]
    Backend(String),
    #[error("image could not be decoded: {0}")]
    BadImage(String),
}

/// Face detection and embedding extraction. Potentially slow; callers
/// bound every invocation with a timeout.
#[allow(async_fn_in_trait)]
pub trait FaceEngine: Send + Sync {
    /// All faces in a live frame, with boxes and descriptors.
    async fn detect_all(&self, frame: &Frame) -> Result<Vec<DetectedFace>, DetectError>;

    /// The single most prominent face in an encoded still image, if any.
    async fn detect_single(&self, image: &[u8]) -> Result<Option<DetectedFace>, DetectError>;
}

impl<T: FaceEngine> FaceEngine for Arc<T> {
    async fn detect_all(&self, frame: &Frame) -> Result<Vec<DetectedFace>, DetectError> {
        (**self).detect_all(frame).await
    }

    async fn detect_single(&self, image: &[u8]) -> Result<Option<DetectedFace>, DetectError> {
        (**self).detect_single(image).await
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid label {0:?}")]
    InvalidLabel(String),
    #[error("store backend: {0}")]
    Backend(String),
}

/// Durable store of enrollment photos, keyed by label and 1-based photo
/// index. Written once per completed enrollment, read at bootstrap.
#[allow(async_fn_in_trait)]
pub trait IdentityStore: Send + Sync {
    async fn list_labels(&self) -> Result<Vec<String>, StoreError>;

    /// Encoded photo bytes, or `None` when that label/index has none.
    async fn fetch_photo(&self, label: &str, index: usize) -> Result<Option<Vec<u8>>, StoreError>;

    /// Persist a completed session's photos; returns how many were stored.
    async fn persist_photos(&self, label: &str, photos: &[Vec<u8>]) -> Result<usize, StoreError>;
}

impl<T: IdentityStore> IdentityStore for Arc<T> {
    async fn list_labels(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_labels().await
    }

    async fn fetch_photo(&self, label: &str, index: usize) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).fetch_photo(label, index).await
    }

    async fn persist_photos(&self, label: &str, photos: &[Vec<u8>]) -> Result<usize, StoreError> {
        (**self).persist_photos(label, photos).await
    }
}

/// Consumer of approved sightings. Called at most once per approval and
/// must return quickly; gate ticks invoke it inline.
pub trait NotificationSink: Send + Sync {
    fn render(&self, event: &NotificationEvent);
}

impl<T: NotificationSink> NotificationSink for Arc<T> {
    fn render(&self, event: &NotificationEvent) {
        (**self).render(event)
    }
}
