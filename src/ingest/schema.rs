//! Column-alias resolution and row normalization.

use csv::{ReaderBuilder, StringRecordsIntoIter};

use super::IngestError;
use super::detect::DetectedFormat;

/// Canonical name of the text column.
pub const CONTENT_COLUMN: &str = "content";
/// Canonical name of the label column.
pub const SENTIMENT_COLUMN: &str = "sentiment";

const CONTENT_ALIASES: &[&str] = &[
    "text", "review", "comment", "sentence", "文本", "内容", "评论", "句子",
];
const SENTIMENT_ALIASES: &[&str] = &["label", "class", "情感", "标签"];

/// One data row reduced to the two canonical columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    /// Trimmed text cell; never empty.
    pub content: String,
    /// Label cell as written in the file; never blank.
    pub raw_label: String,
}

/// Column indices of the canonical fields within a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub content: usize,
    pub sentiment: usize,
}

/// Decoded table with resolved canonical columns.
///
/// The decoded text is owned, so [`SchemaReader::records`] can be called any
/// number of times and always replays the same rows.
#[derive(Debug)]
pub struct SchemaReader {
    text: String,
    format: DetectedFormat,
    headers: Vec<String>,
    columns: ResolvedColumns,
    had_decode_errors: bool,
}

impl SchemaReader {
    /// Decode `bytes` with the detected format and resolve the header row.
    pub fn from_bytes(bytes: &[u8], format: DetectedFormat) -> Result<Self, IngestError> {
        let (text, had_decode_errors) = format.encoding.decode_lossy(bytes);
        if had_decode_errors {
            tracing::warn!(
                encoding = format.encoding.name(),
                "Input has byte sequences the detected encoding cannot decode; they were replaced"
            );
        }
        let headers: Vec<String> = {
            let mut reader = csv_reader(&text, format.delimiter, false);
            match reader.records().next() {
                Some(row) => row
                    .map_err(IngestError::Header)?
                    .iter()
                    .map(clean_header)
                    .collect(),
                None => Vec::new(),
            }
        };
        let columns = ResolvedColumns {
            content: resolve_column(&headers, CONTENT_COLUMN, CONTENT_ALIASES)?,
            sentiment: resolve_column(&headers, SENTIMENT_COLUMN, SENTIMENT_ALIASES)?,
        };
        Ok(Self {
            text,
            format,
            headers,
            columns,
            had_decode_errors,
        })
    }

    pub fn format(&self) -> DetectedFormat {
        self.format
    }

    /// Header cells, trimmed.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn columns(&self) -> ResolvedColumns {
        self.columns
    }

    /// Whether lossy decoding had to replace malformed byte sequences.
    pub fn had_decode_errors(&self) -> bool {
        self.had_decode_errors
    }

    /// Lazily iterate the data rows as normalized records.
    pub fn records(&self) -> NormalizedRecords<'_> {
        NormalizedRecords {
            rows: csv_reader(&self.text, self.format.delimiter, true).into_records(),
            columns: self.columns,
            skipped: 0,
        }
    }
}

/// Iterator over [`NormalizedRecord`]s that counts the rows it drops.
pub struct NormalizedRecords<'a> {
    rows: StringRecordsIntoIter<&'a [u8]>,
    columns: ResolvedColumns,
    skipped: usize,
}

impl NormalizedRecords<'_> {
    /// Rows dropped so far: empty content, blank or absent label, or unparsable.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for NormalizedRecords<'_> {
    type Item = NormalizedRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(err) => {
                    tracing::debug!("Skipping unparsable row: {err}");
                    self.skipped += 1;
                    continue;
                }
            };
            let content = row.get(self.columns.content).map(str::trim).unwrap_or("");
            let raw_label = row.get(self.columns.sentiment).unwrap_or("");
            if content.is_empty() || raw_label.trim().is_empty() {
                self.skipped += 1;
                continue;
            }
            return Some(NormalizedRecord {
                content: content.to_string(),
                raw_label: raw_label.to_string(),
            });
        }
    }
}

fn csv_reader(text: &str, delimiter: u8, has_headers: bool) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(text.as_bytes())
}

fn clean_header(cell: &str) -> String {
    cell.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .to_string()
}

/// Resolve a canonical column: an exact canonical header wins, otherwise the
/// first header matching an alias. Matching is case-insensitive.
fn resolve_column(
    headers: &[String],
    canonical: &'static str,
    aliases: &[&str],
) -> Result<usize, IngestError> {
    let folded: Vec<String> = headers.iter().map(|header| header.to_lowercase()).collect();
    folded
        .iter()
        .position(|header| header == canonical)
        .or_else(|| {
            folded
                .iter()
                .position(|header| aliases.contains(&header.as_str()))
        })
        .ok_or_else(|| IngestError::MissingRequiredColumn {
            column: canonical,
            headers: headers.to_vec(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::detect::TextEncoding;

    fn comma() -> DetectedFormat {
        DetectedFormat {
            encoding: TextEncoding::Utf8,
            delimiter: b',',
        }
    }

    #[test]
    fn resolves_aliases_case_insensitively() {
        let reader = SchemaReader::from_bytes(b"id,Review,LABEL\n1,nice,1\n", comma()).unwrap();
        assert_eq!(
            reader.columns(),
            ResolvedColumns {
                content: 1,
                sentiment: 2
            }
        );
    }

    #[test]
    fn canonical_header_beats_earlier_alias() {
        let reader =
            SchemaReader::from_bytes(b"text,content,sentiment\na,b,1\n", comma()).unwrap();
        assert_eq!(reader.columns().content, 1);
        let first = reader.records().next().unwrap();
        assert_eq!(first.content, "b");
    }

    #[test]
    fn localized_headers_resolve() {
        let reader = SchemaReader::from_bytes("评论,标签\n很好,正面\n".as_bytes(), comma()).unwrap();
        assert_eq!(
            reader.columns(),
            ResolvedColumns {
                content: 0,
                sentiment: 1
            }
        );
    }

    #[test]
    fn unknown_headers_fail_with_missing_column() {
        let err = SchemaReader::from_bytes(b"a,b\nx,1\n", comma()).unwrap_err();
        match err {
            IngestError::MissingRequiredColumn { column, headers } => {
                assert_eq!(column, CONTENT_COLUMN);
                assert_eq!(headers, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_rows_are_dropped_and_counted() {
        let data = "content,sentiment\n  hello  ,1\n   ,1\nworld,\nshort\nlast,0\n";
        let reader = SchemaReader::from_bytes(data.as_bytes(), comma()).unwrap();
        let mut records = reader.records();
        let collected: Vec<NormalizedRecord> = records.by_ref().collect();
        assert_eq!(
            collected,
            vec![
                NormalizedRecord {
                    content: "hello".to_string(),
                    raw_label: "1".to_string()
                },
                NormalizedRecord {
                    content: "last".to_string(),
                    raw_label: "0".to_string()
                },
            ]
        );
        assert_eq!(records.skipped(), 3);
    }

    #[test]
    fn records_replay_identically() {
        let data = "content,sentiment\n\"a, quoted\",1\nb,0\n";
        let reader = SchemaReader::from_bytes(data.as_bytes(), comma()).unwrap();
        let first: Vec<_> = reader.records().collect();
        let second: Vec<_> = reader.records().collect();
        assert_eq!(first, second);
        assert_eq!(first[0].content, "a, quoted");
    }

    #[test]
    fn raw_label_is_kept_verbatim() {
        let reader =
            SchemaReader::from_bytes(b"content,sentiment\nok, Positive \n", comma()).unwrap();
        let record = reader.records().next().unwrap();
        assert_eq!(record.raw_label, " Positive ");
    }
}
