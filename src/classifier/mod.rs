//! Classifier backend seam.
//!
//! The pipeline never looks inside a serialized model. It asks a backend to
//! fit examples into a [`ModelArtifact`], and to load a model from bytes or a
//! path; that load path is also what the installer uses to decide whether a
//! written file is usable.

pub mod naive_bayes;
mod tokenize;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::corpus::Sentiment;

pub use naive_bayes::{NaiveBayesBackend, NaiveBayesModel};
pub use tokenize::tokenize;

/// Serialized model parameters, opaque to everything but the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact(Vec<u8>);

impl ModelArtifact {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to read model {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid model data: {0}")]
    Decode(String),
    #[error("Fit failed: {0}")]
    Fit(String),
}

/// Anything that can score text.
pub trait SentimentModel {
    /// Probability in `[0, 1]` that `text` is positive.
    fn positive_probability(&self, text: &str) -> f64;
}

/// An in-progress fit.
pub trait ModelFit {
    fn observe(&mut self, text: &str, sentiment: Sentiment) -> Result<(), BackendError>;
    fn finish(self) -> Result<ModelArtifact, BackendError>;
}

/// A classifier implementation: how to train it and how to load it back.
pub trait ClassifierBackend {
    type Fit: ModelFit;
    type Model: SentimentModel;

    fn name(&self) -> &'static str;

    fn start_fit(&self) -> Self::Fit;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Model, BackendError>;

    fn load(&self, path: &Path) -> Result<Self::Model, BackendError> {
        let bytes = std::fs::read(path).map_err(|source| BackendError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.decode(&bytes)
    }
}

/// A model loaded from a file, reloadable on request.
///
/// Installing a new model does not change a handle that is already loaded;
/// call [`ModelHandle::reload`] (or start a new process) to observe it.
#[derive(Debug)]
pub struct ModelHandle<M> {
    path: PathBuf,
    model: M,
}

impl<M: SentimentModel> ModelHandle<M> {
    pub fn load<B>(backend: &B, path: &Path) -> Result<Self, BackendError>
    where
        B: ClassifierBackend<Model = M>,
    {
        Ok(Self {
            path: path.to_path_buf(),
            model: backend.load(path)?,
        })
    }

    pub fn reload<B>(&mut self, backend: &B) -> Result<(), BackendError>
    where
        B: ClassifierBackend<Model = M>,
    {
        self.model = backend.load(&self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: SentimentModel> SentimentModel for ModelHandle<M> {
    fn positive_probability(&self, text: &str) -> f64 {
        self.model.positive_probability(text)
    }
}
