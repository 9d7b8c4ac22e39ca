//! Library exports for the sentrain command line tools and tests.
/// Application directory layout.
pub mod app_dirs;
mod atomic_write;
/// Cooperative cancellation.
pub mod cancel;
/// Classifier backends and loaded models.
pub mod classifier;
/// Persistent settings.
pub mod config;
/// Neutral redistribution and training corpora.
pub mod corpus;
/// Model scoring and smoke tests.
pub mod evaluate;
/// CSV ingestion and label normalization.
pub mod ingest;
/// Model slot installation with rollback.
pub mod install;
/// Tracing setup for the command line tools.
pub mod logging;
/// End-to-end retraining.
pub mod pipeline;
/// History of trained models.
pub mod registry;
/// Training sessions with progress reporting.
pub mod training;
/// Background training jobs.
pub mod worker;
