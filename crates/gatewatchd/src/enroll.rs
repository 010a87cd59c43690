//! Enrollment pipeline: validated photo capture, descriptor extraction
//! and matcher (re)construction.
//!
//! Descriptors are not computed at capture time — only when a matcher is
//! built — so re-capturing or deleting photos stays cheap. Building tries
//! an ordered list of strategies: the remote store when there is no local
//! session to draw from, then the local session.

use std::sync::Arc;

use thiserror::Error;

use gatewatch_core::{
    CaptureError, DescriptorStore, EnrollmentSession, FaceMatcher, Frame, Identity, MAX_PHOTOS,
};

use crate::gate::MatcherPublisher;
use crate::providers::{DetectError, FaceEngine, IdentityStore, StoreError};

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("face engine: {0}")]
    Engine(#[from] DetectError),
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("no photo yielded a usable descriptor")]
    NoUsableDescriptors,
    #[error("remote identity fetch failed: {0}")]
    RemoteFetchFailed(StoreError),
}

/// One way of sourcing descriptors for a matcher build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildStrategy {
    /// Previously persisted identities, loaded from the store.
    Remote,
    /// The in-progress enrollment session's captures.
    Local,
}

/// Owns the enrollment session and drives capture, build and hand-off.
/// Single-writer: gate tasks never touch it.
pub struct EnrollmentPipeline<E, S> {
    session: EnrollmentSession,
    engine: E,
    store: S,
    threshold: f32,
}

impl<E: FaceEngine, S: IdentityStore> EnrollmentPipeline<E, S> {
    pub fn new(engine: E, store: S, threshold: f32) -> Self {
        Self {
            session: EnrollmentSession::new(),
            engine,
            store,
            threshold,
        }
    }

    pub fn session(&self) -> &EnrollmentSession {
        &self.session
    }

    /// Capture one enrollment photo from a live frame.
    ///
    /// Label and capacity are checked before detection runs; the frame
    /// must then contain exactly one face. Returns the new 1-based index.
    pub async fn capture_photo(&mut self, label: &str, frame: &Frame) -> Result<usize, EnrollError> {
        self.session.check_capture(label)?;
        let faces = self.engine.detect_all(frame).await?;
        let index = self
            .session
            .accept_capture(label, frame.data.clone(), faces.len())?;
        tracing::info!(label, index, total = self.session.len(), "photo captured");
        Ok(index)
    }

    /// Remove the capture at 0-based `position`, re-indexing the rest.
    pub fn delete_photo(&mut self, position: usize) -> Result<(), CaptureError> {
        self.session.delete_photo(position)?;
        tracing::info!(position, remaining = self.session.len(), "photo deleted");
        Ok(())
    }

    /// Build a fresh matcher from the best available descriptor source.
    ///
    /// With local captures present they are authoritative; otherwise the
    /// persisted store is tried first with the (empty) session as a last
    /// resort. Each strategy's failure is logged and the primary failure
    /// is the one surfaced.
    pub async fn build_matcher(&self) -> Result<FaceMatcher, BuildError> {
        let strategies: &[BuildStrategy] = if self.session.has_captures() {
            &[BuildStrategy::Local]
        } else {
            &[BuildStrategy::Remote, BuildStrategy::Local]
        };

        let mut errors = Vec::new();
        for strategy in strategies {
            let attempt = match strategy {
                BuildStrategy::Remote => self.build_remote().await,
                BuildStrategy::Local => self.build_local().await,
            };
            match attempt {
                Ok(matcher) => {
                    tracing::info!(
                        identities = matcher.identity_count(),
                        ?strategy,
                        "matcher built"
                    );
                    return Ok(matcher);
                }
                Err(err) => {
                    tracing::warn!(?strategy, error = %err, "matcher build strategy failed");
                    errors.push(err);
                }
            }
        }
        Err(errors
            .into_iter()
            .next()
            .unwrap_or(BuildError::NoUsableDescriptors))
    }

    /// Build a matcher and publish it atomically. On failure the
    /// previously published matcher keeps serving — a gate never sees an
    /// empty or partial swap.
    pub async fn rebuild_and_publish(&self, publisher: &MatcherPublisher) -> Result<(), BuildError> {
        let matcher = self.build_matcher().await?;
        publisher.send_replace(Some(Arc::new(matcher)));
        Ok(())
    }

    /// Hand the session's photos to the persistence store and reset it.
    /// Outside the detection hot path; returns how many were stored.
    pub async fn finish(&mut self) -> Result<usize, StoreError> {
        if self.session.is_empty() {
            return Ok(0);
        }
        let photos: Vec<Vec<u8>> = self
            .session
            .captures()
            .iter()
            .map(|c| c.data.clone())
            .collect();
        let count = self.store.persist_photos(self.session.label(), &photos).await?;
        tracing::info!(label = self.session.label(), count, "enrollment photos persisted");
        self.session.reset();
        Ok(count)
    }

    /// Descriptors from the current session's captures, one identity.
    async fn build_local(&self) -> Result<FaceMatcher, BuildError> {
        let label = self.session.label();
        let mut descriptors = Vec::new();
        for capture in self.session.captures() {
            // A photo that passed the single-face capture gate can still
            // fail descriptor extraction; drop it and keep going.
            match self.engine.detect_single(&capture.data).await {
                Ok(Some(face)) => descriptors.push(face.descriptor),
                Ok(None) => {
                    tracing::debug!(label, index = capture.index, "no descriptor from capture; dropped")
                }
                Err(err) => {
                    tracing::warn!(label, index = capture.index, error = %err, "descriptor extraction failed; dropped")
                }
            }
        }
        if descriptors.is_empty() {
            return Err(BuildError::NoUsableDescriptors);
        }
        if descriptors.len() < self.session.len() {
            tracing::warn!(
                label,
                usable = descriptors.len(),
                captured = self.session.len(),
                "enrolling with degraded descriptor count"
            );
        }

        let mut store = DescriptorStore::new();
        store.replace(Identity::new(label, descriptors));
        Ok(FaceMatcher::build(&store, self.threshold))
    }

    /// Descriptors for every persisted label, loading up to `MAX_PHOTOS`
    /// canonical photos per label. Per-photo failures are tolerated; a
    /// label joins the matcher iff at least one photo yields a descriptor.
    async fn build_remote(&self) -> Result<FaceMatcher, BuildError> {
        let labels = self
            .store
            .list_labels()
            .await
            .map_err(BuildError::RemoteFetchFailed)?;

        let mut descriptor_store = DescriptorStore::new();
        for label in labels {
            let mut descriptors = Vec::new();
            for index in 1..=MAX_PHOTOS {
                match self.store.fetch_photo(&label, index).await {
                    Ok(Some(photo)) => match self.engine.detect_single(&photo).await {
                        Ok(Some(face)) => descriptors.push(face.descriptor),
                        Ok(None) => {
                            tracing::debug!(label = %label, index, "no descriptor from stored photo")
                        }
                        Err(err) => {
                            tracing::warn!(label = %label, index, error = %err, "descriptor extraction failed; skipping photo")
                        }
                    },
                    Ok(None) => tracing::debug!(label = %label, index, "photo not present"),
                    Err(err) => {
                        tracing::warn!(label = %label, index, error = %err, "photo fetch failed; skipping")
                    }
                }
            }
            if descriptors.is_empty() {
                tracing::warn!(label = %label, "no usable photos; label excluded from matcher");
                continue;
            }
            if descriptors.len() < MAX_PHOTOS {
                tracing::debug!(
                    label = %label,
                    count = descriptors.len(),
                    "label enrolled with fewer than {MAX_PHOTOS} descriptors"
                );
            }
            descriptor_store.replace(Identity::new(label, descriptors));
        }

        if descriptor_store.is_empty() {
            return Err(BuildError::NoUsableDescriptors);
        }
        Ok(FaceMatcher::build(&descriptor_store, self.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::matcher_channel;
    use crate::providers::StoreError;
    use gatewatch_core::{BoundingBox, Descriptor, DetectedFace};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    const THRESHOLD: f32 = 0.6;

    // Mock engine protocol, keyed on the first image byte:
    //   0x00 → no faces, 0x02 → two faces, 0xEE → detect error,
    //   0xFF → face detected but no descriptor extractable,
    //   anything else → one face whose descriptor is [byte as f32].
    const NO_FACE: u8 = 0x00;
    const TWO_FACES: u8 = 0x02;
    const ENGINE_ERROR: u8 = 0xEE;
    const NO_DESCRIPTOR: u8 = 0xFF;

    fn frame(marker: u8) -> Frame {
        Frame {
            data: vec![marker; 4],
            width: 640,
            height: 480,
        }
    }

    fn mock_face(marker: u8) -> DetectedFace {
        DetectedFace {
            bbox: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                confidence: 0.9,
            },
            descriptor: Descriptor::new(vec![marker as f32]),
        }
    }

    #[derive(Default)]
    struct MockEngine {
        calls: AtomicUsize,
    }

    impl MockEngine {
        fn detect(&self, data: &[u8]) -> Result<Vec<DetectedFace>, DetectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match data.first().copied() {
                Some(NO_FACE) | None => Ok(vec![]),
                Some(TWO_FACES) => Ok(vec![mock_face(1), mock_face(2)]),
                Some(ENGINE_ERROR) => Err(DetectError::Backend("inference failed".into())),
                Some(NO_DESCRIPTOR) => Ok(vec![]),
                Some(marker) => Ok(vec![mock_face(marker)]),
            }
        }
    }

    impl FaceEngine for MockEngine {
        async fn detect_all(&self, frame: &Frame) -> Result<Vec<DetectedFace>, DetectError> {
            self.detect(&frame.data)
        }

        async fn detect_single(&self, image: &[u8]) -> Result<Option<DetectedFace>, DetectError> {
            Ok(self.detect(image)?.into_iter().next())
        }
    }

    #[derive(Default)]
    struct MemStore {
        photos: Mutex<HashMap<String, Vec<Vec<u8>>>>,
        fail_listing: AtomicBool,
    }

    impl MemStore {
        fn with_label(label: &str, markers: &[u8]) -> Self {
            let store = Self::default();
            store.photos.lock().unwrap().insert(
                label.to_string(),
                markers.iter().map(|&m| vec![m; 4]).collect(),
            );
            store
        }

        fn insert(&self, label: &str, markers: &[u8]) {
            self.photos.lock().unwrap().insert(
                label.to_string(),
                markers.iter().map(|&m| vec![m; 4]).collect(),
            );
        }
    }

    impl IdentityStore for MemStore {
        async fn list_labels(&self) -> Result<Vec<String>, StoreError> {
            if self.fail_listing.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("listing unavailable".into()));
            }
            let mut labels: Vec<String> = self.photos.lock().unwrap().keys().cloned().collect();
            labels.sort();
            Ok(labels)
        }

        async fn fetch_photo(
            &self,
            label: &str,
            index: usize,
        ) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(self
                .photos
                .lock()
                .unwrap()
                .get(label)
                .and_then(|photos| photos.get(index - 1))
                .cloned())
        }

        async fn persist_photos(&self, label: &str, photos: &[Vec<u8>]) -> Result<usize, StoreError> {
            self.photos
                .lock()
                .unwrap()
                .insert(label.to_string(), photos.to_vec());
            Ok(photos.len())
        }
    }

    fn pipeline() -> EnrollmentPipeline<MockEngine, MemStore> {
        EnrollmentPipeline::new(MockEngine::default(), MemStore::default(), THRESHOLD)
    }

    #[tokio::test]
    async fn test_capture_accepts_single_face_only() {
        let mut pipeline = pipeline();
        assert_eq!(pipeline.capture_photo("carol", &frame(10)).await.unwrap(), 1);

        let err = pipeline.capture_photo("carol", &frame(NO_FACE)).await;
        assert!(matches!(err, Err(EnrollError::Capture(CaptureError::NoFace))));

        let err = pipeline.capture_photo("carol", &frame(TWO_FACES)).await;
        assert!(matches!(
            err,
            Err(EnrollError::Capture(CaptureError::MultipleFaces))
        ));

        assert_eq!(pipeline.session().len(), 1);
    }

    #[tokio::test]
    async fn test_capture_limit_checked_before_detection() {
        let mut pipeline = pipeline();
        for marker in [10, 11, 12] {
            pipeline.capture_photo("carol", &frame(marker)).await.unwrap();
        }
        let calls_before = pipeline.engine.calls.load(Ordering::SeqCst);

        let err = pipeline.capture_photo("carol", &frame(13)).await;
        assert!(matches!(
            err,
            Err(EnrollError::Capture(CaptureError::LimitReached))
        ));
        // The rejected capture never reached the face engine.
        assert_eq!(pipeline.engine.calls.load(Ordering::SeqCst), calls_before);
    }

    #[tokio::test]
    async fn test_capture_engine_failure_surfaces() {
        let mut pipeline = pipeline();
        let err = pipeline.capture_photo("carol", &frame(ENGINE_ERROR)).await;
        assert!(matches!(err, Err(EnrollError::Engine(_))));
        assert!(pipeline.session().is_empty());
    }

    #[tokio::test]
    async fn test_local_build_drops_failed_extractions() {
        let mut pipeline = pipeline();
        pipeline.capture_photo("carol", &frame(10)).await.unwrap();
        pipeline.capture_photo("carol", &frame(11)).await.unwrap();
        // A capture that passed the single-face gate can still yield no
        // descriptor at build time; seed one directly into the session.
        pipeline
            .session
            .accept_capture("carol", vec![NO_DESCRIPTOR; 4], 1)
            .unwrap();

        let matcher = pipeline.build_matcher().await.unwrap();
        assert_eq!(matcher.labels(), vec!["carol"]);
        assert_eq!(matcher.descriptor_count("carol"), Some(2));
    }

    #[tokio::test]
    async fn test_local_build_with_zero_survivors_fails() {
        // Bypass the capture gate: frames whose single-face check passed
        // at capture time but whose extraction fails at build time.
        let mut pipeline = pipeline();
        pipeline.capture_photo("carol", &frame(10)).await.unwrap();
        pipeline.session.delete_photo(0).unwrap();
        pipeline
            .session
            .accept_capture("carol", vec![NO_DESCRIPTOR; 4], 1)
            .unwrap();

        let err = pipeline.build_matcher().await;
        assert!(matches!(err, Err(BuildError::NoUsableDescriptors)));
    }

    #[tokio::test]
    async fn test_remote_build_tolerates_partial_labels() {
        let store = MemStore::with_label("alice", &[10, NO_DESCRIPTOR, 11]);
        // Bob has photos but none yields a descriptor: excluded, not fatal.
        store.insert("bob", &[NO_DESCRIPTOR, ENGINE_ERROR]);
        let pipeline = EnrollmentPipeline::new(MockEngine::default(), store, THRESHOLD);

        let matcher = pipeline.build_matcher().await.unwrap();
        assert_eq!(matcher.labels(), vec!["alice"]);
        assert_eq!(matcher.descriptor_count("alice"), Some(2));
    }

    #[tokio::test]
    async fn test_remote_build_single_descriptor_label_counts() {
        let store = MemStore::with_label("alice", &[10]);
        let pipeline = EnrollmentPipeline::new(MockEngine::default(), store, THRESHOLD);
        let matcher = pipeline.build_matcher().await.unwrap();
        assert_eq!(matcher.descriptor_count("alice"), Some(1));
    }

    #[tokio::test]
    async fn test_remote_failure_surfaces_when_no_session() {
        let store = MemStore::default();
        store.fail_listing.store(true, Ordering::SeqCst);
        let pipeline = EnrollmentPipeline::new(MockEngine::default(), store, THRESHOLD);

        let err = pipeline.build_matcher().await;
        assert!(matches!(err, Err(BuildError::RemoteFetchFailed(_))));
    }

    #[tokio::test]
    async fn test_local_session_preferred_over_remote() {
        let store = MemStore::with_label("alice", &[20]);
        let mut pipeline = EnrollmentPipeline::new(MockEngine::default(), store, THRESHOLD);
        pipeline.capture_photo("carol", &frame(10)).await.unwrap();

        let matcher = pipeline.build_matcher().await.unwrap();
        assert_eq!(matcher.labels(), vec!["carol"]);
    }

    #[tokio::test]
    async fn test_build_is_idempotent() {
        let mut pipeline = pipeline();
        pipeline.capture_photo("carol", &frame(10)).await.unwrap();
        pipeline.capture_photo("carol", &frame(11)).await.unwrap();

        let first = pipeline.build_matcher().await.unwrap();
        let second = pipeline.build_matcher().await.unwrap();
        assert_eq!(first.labels(), second.labels());
        assert_eq!(
            first.descriptor_count("carol"),
            second.descriptor_count("carol")
        );
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_matcher() {
        let (publisher, handle) = matcher_channel();
        let store = MemStore::with_label("alice", &[10]);
        let pipeline = EnrollmentPipeline::new(MockEngine::default(), store, THRESHOLD);
        pipeline.rebuild_and_publish(&publisher).await.unwrap();

        // The store goes bad; the rebuild must fail without a swap.
        pipeline.store.fail_listing.store(true, Ordering::SeqCst);
        pipeline.rebuild_and_publish(&publisher).await.unwrap_err();

        let current = handle.borrow().as_ref().cloned().unwrap();
        assert_eq!(current.labels(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_finish_persists_and_resets() {
        let mut pipeline = pipeline();
        pipeline.capture_photo("carol", &frame(10)).await.unwrap();
        pipeline.capture_photo("carol", &frame(11)).await.unwrap();

        let count = pipeline.finish().await.unwrap();
        assert_eq!(count, 2);
        assert!(pipeline.session().is_empty());
        assert_eq!(pipeline.session().label(), "");
        assert_eq!(
            pipeline.store.list_labels().await.unwrap(),
            vec!["carol".to_string()]
        );

        // Nothing captured, nothing persisted.
        assert_eq!(pipeline.finish().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enrollment_supersedes_on_rebuild() {
        let store = MemStore::with_label("carol", &[10, 11, 12]);
        let mut pipeline = EnrollmentPipeline::new(MockEngine::default(), store, THRESHOLD);

        // Re-enroll carol with a single new photo and persist it.
        pipeline.capture_photo("carol", &frame(42)).await.unwrap();
        pipeline.finish().await.unwrap();

        let matcher = pipeline.build_matcher().await.unwrap();
        assert_eq!(matcher.descriptor_count("carol"), Some(1));
    }
}
