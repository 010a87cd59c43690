//! Enrollment session: validated photo captures for one identity.

use thiserror::Error;

/// Hard cap on photos per enrolled identity.
pub const MAX_PHOTOS: usize = 3;

#[derive(Error, Debug, PartialEq)]
pub enum CaptureError {
    #[error("a name is required before capturing")]
    EmptyLabel,
    #[error("photo limit reached ({MAX_PHOTOS} max)")]
    LimitReached,
    #[error("no face detected in the frame")]
    NoFace,
    #[error("multiple faces detected; exactly one is required")]
    MultipleFaces,
    #[error("no captured photo at position {0}")]
    OutOfRange(usize),
}

/// One accepted enrollment photo: raw image bytes plus its 1-based index.
#[derive(Debug, Clone)]
pub struct PhotoCapture {
    pub data: Vec<u8>,
    pub index: usize,
}

/// Transient state for one identity being enrolled.
///
/// Captures are only accepted after the caller has verified the frame
/// contains exactly one face; the session enforces that contract plus the
/// label and capacity rules. Reset after hand-off to persistence.
#[derive(Debug, Default)]
pub struct EnrollmentSession {
    label: String,
    captures: Vec<PhotoCapture>,
}

impl EnrollmentSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn captures(&self) -> &[PhotoCapture] {
        &self.captures
    }

    pub fn has_captures(&self) -> bool {
        !self.captures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    /// Validate the label and capacity rules without accepting anything.
    /// Lets callers reject a capture before paying for face detection.
    pub fn check_capture(&self, label: &str) -> Result<(), CaptureError> {
        if label.trim().is_empty() {
            return Err(CaptureError::EmptyLabel);
        }
        if self.captures.len() >= MAX_PHOTOS {
            return Err(CaptureError::LimitReached);
        }
        Ok(())
    }

    /// Accept a capture that the face engine found `face_count` faces in.
    ///
    /// Returns the new 1-based photo index. Rejections leave the session
    /// untouched. The label is taken from the caller on every accepted
    /// capture, so renaming mid-session follows the latest value.
    pub fn accept_capture(
        &mut self,
        label: &str,
        data: Vec<u8>,
        face_count: usize,
    ) -> Result<usize, CaptureError> {
        self.check_capture(label)?;
        let label = label.trim();
        match face_count {
            0 => return Err(CaptureError::NoFace),
            1 => {}
            _ => return Err(CaptureError::MultipleFaces),
        }

        self.label = label.to_string();
        let index = self.captures.len() + 1;
        self.captures.push(PhotoCapture { data, index });
        Ok(index)
    }

    /// Remove the capture at 0-based `position`, re-indexing the rest
    /// contiguously. The label is left untouched.
    pub fn delete_photo(&mut self, position: usize) -> Result<(), CaptureError> {
        if position >= self.captures.len() {
            return Err(CaptureError::OutOfRange(position));
        }
        self.captures.remove(position);
        for (i, capture) in self.captures.iter_mut().enumerate() {
            capture.index = i + 1;
        }
        Ok(())
    }

    /// Drop all captures and the label, ready for the next enrollment.
    pub fn reset(&mut self) {
        self.label.clear();
        self.captures.clear();
    }
}
