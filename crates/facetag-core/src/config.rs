//! Configuration for both operations.
//!
//! Paths, colors, and the match threshold live in one explicit structure
//! passed into train and recognize, with documented defaults and
//! `FACETAG_*` environment overrides.

use crate::annotate::AnnotationStyle;
use std::path::PathBuf;

/// Detector backend selector (`--model` flag).
///
/// `Hog` loads the lightweight CPU detection model, `Cnn` the heavier,
/// more accurate one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorBackend {
    #[default]
    Hog,
    Cnn,
}

impl DetectorBackend {
    /// ONNX model file name for this backend.
    pub fn model_file(self) -> &'static str {
        match self {
            DetectorBackend::Hog => "scrfd_500m_bnkps.onnx",
            DetectorBackend::Cnn => "det_10g.onnx",
        }
    }
}

const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";
const ANNOTATED_FILE: &str = "annotated.png";

/// Shared configuration for training and recognition.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the labeled training tree (default: `training`).
    pub training_dir: PathBuf,
    /// Directory for the store and annotated output (default: `output`).
    pub output_dir: PathBuf,
    /// Path of the serialized encoding store (default: `output/encodings.bin`).
    pub encodings_path: PathBuf,
    /// Directory containing ONNX model files (default: `models`).
    pub model_dir: PathBuf,
    /// Cosine similarity threshold for the boolean match predicate (default: 0.40).
    pub match_threshold: f32,
    /// Label font candidates, tried in order.
    pub font_candidates: Vec<PathBuf>,
    /// Annotation drawing style.
    pub style: AnnotationStyle,
}

impl Default for Config {
    fn default() -> Self {
        let output_dir = PathBuf::from("output");
        Self {
            training_dir: PathBuf::from("training"),
            encodings_path: output_dir.join("encodings.bin"),
            output_dir,
            model_dir: PathBuf::from("models"),
            match_threshold: 0.40,
            font_candidates: vec![
                PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"),
                PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
                PathBuf::from("/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf"),
            ],
            style: AnnotationStyle::default(),
        }
    }
}

impl Config {
    /// Load configuration from `FACETAG_*` environment variables over the
    /// documented defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let output_dir = env_path("FACETAG_OUTPUT_DIR", defaults.output_dir);
        let encodings_path = std::env::var("FACETAG_ENCODINGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| output_dir.join("encodings.bin"));

        let mut font_candidates = defaults.font_candidates;
        if let Ok(font) = std::env::var("FACETAG_FONT_PATH") {
            font_candidates.insert(0, PathBuf::from(font));
        }

        Self {
            training_dir: env_path("FACETAG_TRAINING_DIR", defaults.training_dir),
            output_dir,
            encodings_path,
            model_dir: env_path("FACETAG_MODEL_DIR", defaults.model_dir),
            match_threshold: env_f32("FACETAG_MATCH_THRESHOLD", defaults.match_threshold),
            font_candidates,
            style: defaults.style,
        }
    }

    /// Path of the SCRFD model for the selected backend.
    pub fn detector_model_path(&self, backend: DetectorBackend) -> PathBuf {
        self.model_dir.join(backend.model_file())
    }

    /// Path of the ArcFace embedding model.
    pub fn recognizer_model_path(&self) -> PathBuf {
        self.model_dir.join(ARCFACE_MODEL_FILE)
    }

    /// Where the annotated recognition output is written.
    pub fn annotated_path(&self) -> PathBuf {
        self.output_dir.join(ANNOTATED_FILE)
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
