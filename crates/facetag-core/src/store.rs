//! Persisted embedding store.
//!
//! Two aligned ordered sequences, labels and embeddings, written wholesale
//! by a training run and read wholesale by a recognition run. There is no
//! incremental update: re-training replaces the file entirely.

use crate::types::Embedding;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no trained encodings found at {} — run with --train first", .0.display())]
    Missing(PathBuf),
    #[error("store is corrupt: {labels} labels but {encodings} encodings")]
    LengthMismatch { labels: usize, encodings: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec: {0}")]
    Codec(#[from] bincode::Error),
}

/// The persisted label/embedding mapping.
///
/// Invariant: `labels.len() == encodings.len()`; index `i` in one sequence
/// corresponds to index `i` in the other. Multiple entries may share a label
/// (one per detected face per training image).
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingStore {
    pub labels: Vec<String>,
    pub encodings: Vec<Embedding>,
}

impl EncodingStore {
    /// Append one record, preserving sequence alignment.
    pub fn push(&mut self, label: String, encoding: Embedding) {
        self.labels.push(label);
        self.encodings.push(encoding);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Serialize the store to `path`, creating the parent directory if absent
    /// and overwriting any prior store wholesale.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        tracing::info!(path = %path.display(), records = self.len(), "encoding store saved");
        Ok(())
    }

    /// Load a store previously written by [`save`](Self::save).
    ///
    /// Returns [`StoreError::Missing`] when no store exists at `path`, and
    /// [`StoreError::LengthMismatch`] when the sequences disagree in length.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::Missing(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        let store: Self = bincode::deserialize_from(reader)?;
        if store.labels.len() != store.encodings.len() {
            return Err(StoreError::LengthMismatch {
                labels: store.labels.len(),
                encodings: store.encodings.len(),
            });
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> EncodingStore {
        let mut store = EncodingStore::default();
        store.push("alice".into(), Embedding::new(vec![0.1, 0.2, 0.3]));
        store.push("bob".into(), Embedding::new(vec![0.4, 0.5, 0.6]));
        store.push("alice".into(), Embedding::new(vec![0.7, 0.8, 0.9]));
        store
    }

    #[test]
    fn test_push_keeps_sequences_aligned() {
        let store = sample_store();
        assert_eq!(store.len(), 3);
        assert_eq!(store.labels.len(), store.encodings.len());
        assert_eq!(store.labels, vec!["alice", "bob", "alice"]);
    }

    #[test]
    fn test_roundtrip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output/encodings.bin");

        let store = sample_store();
        store.save(&path).unwrap();
        let loaded = EncodingStore::load(&path).unwrap();

        assert_eq!(loaded, store);
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deeply/nested/out/encodings.bin");
        sample_store().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_save_overwrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encodings.bin");

        sample_store().save(&path).unwrap();

        let mut replacement = EncodingStore::default();
        replacement.push("carol".into(), Embedding::new(vec![1.0]));
        replacement.save(&path).unwrap();

        let loaded = EncodingStore::load(&path).unwrap();
        assert_eq!(loaded, replacement);
    }

    #[test]
    fn test_load_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-trained.bin");
        match EncodingStore::load(&path) {
            Err(StoreError::Missing(p)) => assert_eq!(p, path),
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encodings.bin");

        // Write a store with misaligned sequences by serializing the raw shape.
        let bad = EncodingStore {
            labels: vec!["alice".into()],
            encodings: vec![],
        };
        let writer = BufWriter::new(File::create(&path).unwrap());
        bincode::serialize_into(writer, &bad).unwrap();

        match EncodingStore::load(&path) {
            Err(StoreError::LengthMismatch { labels, encodings }) => {
                assert_eq!((labels, encodings), (1, 0));
            }
            other => panic!("expected LengthMismatch, got {other:?}"),
        }
    }
}
