//! Train and recognize operations.
//!
//! Both are stateless single-pass procedures over a [`FaceEngine`]: training
//! accumulates (label, embedding) records from the corpus and writes the
//! store wholesale; recognition loads the store, resolves a label per
//! detected face, and annotates a copy of the target image.

use crate::annotate;
use crate::config::Config;
use crate::engine::{EngineError, FaceEngine};
use crate::matcher;
use crate::scanner;
use crate::store::{EncodingStore, StoreError};
use crate::types::BoundingBox;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("engine: {0}")]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Train on every labeled image under the training directory and persist the
/// resulting store.
///
/// One image may contribute zero, one, or several records, one per detected
/// face. All-or-nothing: a failure on any single image aborts the run and
/// nothing is written.
pub fn train<E: FaceEngine>(engine: &mut E, config: &Config) -> Result<EncodingStore, PipelineError> {
    tracing::info!(dir = %config.training_dir.display(), "training on corpus");

    let mut store = EncodingStore::default();

    for (label, path) in scanner::scan_corpus(&config.training_dir) {
        tracing::info!(label = %label, file = %path.display(), "encoding");

        let image = image::open(&path)?.to_rgb8();
        let faces = engine.detect(&image)?;
        let embeddings = engine.encode(&image, &faces)?;

        for embedding in embeddings {
            store.push(label.clone(), embedding);
        }
    }

    store.save(&config.encodings_path)?;
    tracing::info!(faces = store.len(), "training complete");

    Ok(store)
}

/// Outcome of one recognition run.
#[derive(Debug)]
pub struct Recognition {
    /// Resolved labels, aligned with detection order.
    pub names: Vec<String>,
    /// Detected face regions, in detection order.
    pub faces: Vec<BoundingBox>,
    /// Annotated copy of the target image.
    pub annotated: RgbImage,
}

/// Recognize faces in `image_path` against the persisted store.
///
/// Fails with [`StoreError::Missing`] before doing any detection work when
/// no prior training run has produced a store.
pub fn recognize<E: FaceEngine>(
    engine: &mut E,
    config: &Config,
    image_path: &Path,
) -> Result<Recognition, PipelineError> {
    let store = EncodingStore::load(&config.encodings_path)?;
    tracing::info!(
        file = %image_path.display(),
        known = store.len(),
        "recognizing faces"
    );

    let image = image::open(image_path)?.to_rgb8();
    let faces = engine.detect(&image)?;
    let embeddings = engine.encode(&image, &faces)?;

    let font = annotate::load_font(&config.font_candidates);
    let mut annotated = image.clone();
    let mut names = Vec::with_capacity(faces.len());

    for (face, embedding) in faces.iter().zip(&embeddings) {
        let matches = engine.compare(&store.encodings, embedding);
        let name = matcher::resolve_label(&matches, &store.labels).to_string();

        annotate::draw_face(&mut annotated, face, &name, font.as_ref(), &config.style);
        names.push(name);
    }

    tracing::info!(names = ?names, "recognition complete");

    Ok(Recognition {
        names,
        faces,
        annotated,
    })
}
