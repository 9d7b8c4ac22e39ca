//! Loading CSV sources into labeled examples, one file or many.

use std::path::{Path, PathBuf};

use super::detect::{DetectedFormat, detect_format};
use super::labels::{ClassCounts, LabelClass, LabelVocabulary};
use super::schema::SchemaReader;
use super::IngestError;
use crate::config::IngestSettings;

/// A normalized row with its resolved class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledExample {
    pub content: String,
    pub class: LabelClass,
}

impl LabeledExample {
    pub fn new(content: impl Into<String>, class: LabelClass) -> Self {
        Self {
            content: content.into(),
            class,
        }
    }
}

/// Per-source ingestion facts, reported next to a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    /// `None` for in-memory buffers.
    pub path: Option<PathBuf>,
    pub format: DetectedFormat,
    /// Rows that produced an example (including Invalid ones).
    pub rows: usize,
    /// Rows dropped for empty content or label.
    pub skipped: usize,
    pub invalid: usize,
    /// Lossy decoding replaced malformed byte sequences.
    pub had_decode_errors: bool,
}

/// Labeled examples gathered from one or more sources.
#[derive(Debug, Clone, Default)]
pub struct LabeledDataset {
    pub examples: Vec<LabeledExample>,
    pub skipped_row_count: usize,
    pub sources: Vec<SourceSummary>,
}

impl LabeledDataset {
    pub fn from_examples(examples: Vec<LabeledExample>) -> Self {
        Self {
            examples,
            ..Self::default()
        }
    }

    pub fn invalid_label_count(&self) -> usize {
        self.examples
            .iter()
            .filter(|example| example.class == LabelClass::Invalid)
            .count()
    }

    pub fn class_counts(&self) -> ClassCounts {
        self.examples.iter().map(|example| example.class).collect()
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Append another dataset, summing its counters.
    pub fn extend(&mut self, other: LabeledDataset) {
        self.examples.extend(other.examples);
        self.skipped_row_count += other.skipped_row_count;
        self.sources.extend(other.sources);
    }
}

/// Detects, normalizes and classifies CSV sources.
#[derive(Debug, Clone)]
pub struct Ingestor {
    settings: IngestSettings,
    vocabulary: LabelVocabulary,
}

impl Ingestor {
    pub fn new(settings: IngestSettings, vocabulary: LabelVocabulary) -> Self {
        Self {
            settings,
            vocabulary,
        }
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    /// Detect the format of `bytes` and open it for reading.
    pub fn open_bytes(&self, bytes: &[u8]) -> Result<SchemaReader, IngestError> {
        let format = detect_format(bytes, &self.settings)?;
        SchemaReader::from_bytes(bytes, format)
    }

    /// Ingest an in-memory buffer.
    pub fn from_bytes(&self, bytes: &[u8]) -> Result<LabeledDataset, IngestError> {
        let reader = self.open_bytes(bytes)?;
        Ok(self.classify_all(&reader, None))
    }

    /// Ingest one file.
    pub fn load(&self, path: &Path) -> Result<LabeledDataset, IngestError> {
        let bytes = std::fs::read(path).map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = self.open_bytes(&bytes)?;
        let dataset = self.classify_all(&reader, Some(path));
        tracing::info!(
            "Loaded {}: {} examples ({} skipped, {} invalid labels; {}, {})",
            path.display(),
            dataset.len(),
            dataset.skipped_row_count,
            dataset.invalid_label_count(),
            reader.format().encoding.name(),
            reader.format().delimiter_name(),
        );
        Ok(dataset)
    }

    /// Ingest several files into one dataset. The first file-level failure
    /// aborts the load.
    pub fn load_many<P: AsRef<Path>>(&self, paths: &[P]) -> Result<LabeledDataset, IngestError> {
        let mut merged = LabeledDataset::default();
        for path in paths {
            merged.extend(self.load(path.as_ref())?);
        }
        Ok(merged)
    }

    fn classify_all(&self, reader: &SchemaReader, path: Option<&Path>) -> LabeledDataset {
        let mut records = reader.records();
        let examples: Vec<LabeledExample> = records
            .by_ref()
            .map(|record| {
                let class = self.vocabulary.classify(&record.raw_label);
                if class == LabelClass::Invalid {
                    tracing::debug!("Unrecognized label '{}'", record.raw_label);
                }
                LabeledExample::new(record.content, class)
            })
            .collect();
        let skipped = records.skipped();
        if skipped > 0 {
            tracing::warn!("Skipped {skipped} rows with empty content or label");
        }
        let invalid = examples
            .iter()
            .filter(|example| example.class == LabelClass::Invalid)
            .count();
        let summary = SourceSummary {
            path: path.map(Path::to_path_buf),
            format: reader.format(),
            rows: examples.len(),
            skipped,
            invalid,
            had_decode_errors: reader.had_decode_errors(),
        };
        LabeledDataset {
            examples,
            skipped_row_count: skipped,
            sources: vec![summary],
        }
    }
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new(IngestSettings::default(), LabelVocabulary::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn counts_skipped_and_invalid_rows() {
        let data = "content,sentiment\n\"好\",positive\n\"差\",negative\n\"\",positive\n\"一般\",neutral\nhuh,maybe\n";
        let dataset = Ingestor::default().from_bytes(data.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.skipped_row_count, 1);
        assert_eq!(dataset.invalid_label_count(), 1);
        let counts = dataset.class_counts();
        assert_eq!((counts.positive, counts.negative, counts.neutral), (1, 1, 1));
    }

    #[test]
    fn load_many_merges_sources_in_order() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a.csv");
        let second = dir.path().join("b.tsv");
        std::fs::write(&first, "text,label\none,1\n,1\n").unwrap();
        std::fs::write(&second, "review\tclass\ntwo\t0\nthree\tx\n").unwrap();

        let dataset = Ingestor::default().load_many(&[&first, &second]).unwrap();

        let contents: Vec<&str> = dataset.examples.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(dataset.skipped_row_count, 1);
        assert_eq!(dataset.invalid_label_count(), 1);
        assert_eq!(dataset.sources.len(), 2);
        assert_eq!(dataset.sources[1].format.delimiter, b'\t');
        assert_eq!(dataset.sources[0].path.as_deref(), Some(first.as_path()));
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.csv");
        let err = Ingestor::default().load(&missing).unwrap_err();
        assert!(matches!(err, IngestError::Read { path, .. } if path == missing));
    }
}
