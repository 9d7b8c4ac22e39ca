//! CSV ingestion: format detection, column normalization and label
//! classification.

mod dataset;
pub mod detect;
mod errors;
pub mod inspect;
pub mod labels;
pub mod schema;

pub use dataset::{Ingestor, LabeledDataset, LabeledExample, SourceSummary};
pub use detect::{DELIMITER_CANDIDATES, DetectedFormat, TextEncoding, detect_format};
pub use errors::IngestError;
pub use inspect::LabelDistribution;
pub use labels::{ClassCounts, LabelClass, LabelVocabulary, VocabularyError};
pub use schema::{NormalizedRecord, SchemaReader};
