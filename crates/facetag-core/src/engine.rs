//! The face-engine seam.
//!
//! All three external face operations (detect, encode, compare) sit behind
//! one narrow trait so the train/recognize orchestration can be exercised
//! with a substitutable stand-in instead of the real ONNX backend.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Face detection, encoding and comparison, as one substitutable unit.
///
/// Implementations may be stateful (ONNX sessions), hence `&mut self` on the
/// inference operations. `compare` returns one boolean per known embedding
/// using an implementation-owned fixed threshold; no distance is surfaced.
pub trait FaceEngine {
    /// Detect faces in an image, in the engine's detection order.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, EngineError>;

    /// Extract one embedding per detected region, aligned index-for-index
    /// with `faces`.
    fn encode(
        &mut self,
        image: &RgbImage,
        faces: &[BoundingBox],
    ) -> Result<Vec<Embedding>, EngineError>;

    /// Compare a query embedding against every known embedding, yielding one
    /// match boolean per known entry in order.
    fn compare(&self, known: &[Embedding], query: &Embedding) -> Vec<bool>;
}

/// Production engine: SCRFD detection + ArcFace embeddings via ONNX Runtime.
pub struct OnnxEngine {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    match_threshold: f32,
}

impl OnnxEngine {
    /// Load both models. Fails fast if either model file is missing.
    pub fn load(
        detector_model: &Path,
        recognizer_model: &Path,
        match_threshold: f32,
    ) -> Result<Self, EngineError> {
        let detector = FaceDetector::load(detector_model)?;
        let recognizer = FaceRecognizer::load(recognizer_model)?;
        Ok(Self {
            detector,
            recognizer,
            match_threshold,
        })
    }
}

impl FaceEngine for OnnxEngine {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, EngineError> {
        Ok(self.detector.detect(image)?)
    }

    fn encode(
        &mut self,
        image: &RgbImage,
        faces: &[BoundingBox],
    ) -> Result<Vec<Embedding>, EngineError> {
        faces
            .iter()
            .map(|face| Ok(self.recognizer.extract(image, face)?))
            .collect()
    }

    fn compare(&self, known: &[Embedding], query: &Embedding) -> Vec<bool> {
        known
            .iter()
            .map(|k| k.similarity(query) >= self.match_threshold)
            .collect()
    }
}
