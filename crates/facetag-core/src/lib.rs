//! facetag-core — face-tagging pipeline.
//!
//! Scans a labeled training corpus, extracts face embeddings (SCRFD
//! detection + ArcFace encoding via ONNX Runtime), persists them as an
//! aligned label/embedding store, and recognizes faces in target images by
//! a first-match rule with box-and-tag annotation.

pub mod alignment;
pub mod annotate;
pub mod config;
pub mod detector;
pub mod engine;
pub mod matcher;
pub mod pipeline;
pub mod recognizer;
pub mod scanner;
pub mod store;
pub mod types;

pub use annotate::AnnotationStyle;
pub use config::{Config, DetectorBackend};
pub use engine::{EngineError, FaceEngine, OnnxEngine};
pub use matcher::UNKNOWN_LABEL;
pub use pipeline::{recognize, train, PipelineError, Recognition};
pub use store::{EncodingStore, StoreError};
pub use types::{BoundingBox, Embedding};
