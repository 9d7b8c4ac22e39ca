use std::path::PathBuf;

use thiserror::Error;

/// File-level failures while turning a CSV file into labeled examples.
///
/// Row-level problems (empty cells, unknown labels) are never reported here;
/// they are counted on the successful result instead.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Failed to read the input file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// No configured encoding decodes the input, or no delimiter candidate appears.
    #[error("Undetectable format: {reason} (encodings tried: {})", .tried.join(", "))]
    UndetectableFormat {
        reason: String,
        tried: Vec<&'static str>,
    },
    /// The header row resolves to no `content` or no `sentiment` column.
    #[error("Missing required column '{column}' (headers: {})", .headers.join(", "))]
    MissingRequiredColumn {
        column: &'static str,
        headers: Vec<String>,
    },
    /// The header row could not be parsed.
    #[error("Unreadable header row: {0}")]
    Header(#[source] csv::Error),
    /// A configured legacy encoding label is not known.
    #[error("Unknown encoding label '{0}'")]
    UnknownEncoding(String),
}
