//! Character encoding and field delimiter detection for CSV-family files.
//!
//! Encodings are tried in a fixed order: UTF-8 with BOM, plain UTF-8, then the
//! configured CJK legacy encodings. Each candidate strictly decodes a bounded
//! prefix of the input; the first one that succeeds wins. Earlier entries are
//! more specific, so a BOM-tagged file is never reported as plain UTF-8 and
//! valid UTF-8 is never reported as GBK.

use encoding_rs::{DecoderResult, Encoding, UTF_8};

use super::IngestError;
use crate::config::IngestSettings;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Field delimiters considered during sniffing, in tie-break order.
pub const DELIMITER_CANDIDATES: [u8; 4] = [b',', b'\t', b';', b'|'];

/// Text encoding of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8 prefixed with a byte-order mark.
    Utf8Bom,
    /// UTF-8 without a byte-order mark.
    Utf8,
    /// A legacy multibyte encoding such as GBK or Big5.
    Legacy(&'static Encoding),
}

impl TextEncoding {
    /// Stable display name (`utf-8-sig`, `utf-8`, or the WHATWG name).
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8Bom => "utf-8-sig",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Legacy(encoding) => encoding.name(),
        }
    }

    fn codec(&self) -> &'static Encoding {
        match self {
            TextEncoding::Utf8Bom | TextEncoding::Utf8 => UTF_8,
            TextEncoding::Legacy(encoding) => encoding,
        }
    }

    fn payload<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        match self {
            TextEncoding::Utf8Bom => bytes.strip_prefix(UTF8_BOM),
            _ => Some(bytes),
        }
    }

    /// Decode without replacement. `complete` is false when `bytes` is a
    /// truncated prefix, in which case a trailing partial sequence is accepted.
    fn decode_strict(&self, bytes: &[u8], complete: bool) -> Option<String> {
        let payload = self.payload(bytes)?;
        let mut decoder = self.codec().new_decoder_without_bom_handling();
        let capacity = decoder.max_utf8_buffer_length_without_replacement(payload.len())?;
        let mut out = String::with_capacity(capacity);
        let (result, _) = decoder.decode_to_string_without_replacement(payload, &mut out, complete);
        match result {
            DecoderResult::InputEmpty => Some(out),
            DecoderResult::OutputFull | DecoderResult::Malformed(..) => None,
        }
    }

    /// Decode the whole buffer, substituting U+FFFD for malformed sequences.
    /// The flag reports whether any substitution happened.
    pub fn decode_lossy(&self, bytes: &[u8]) -> (String, bool) {
        let payload = self.payload(bytes).unwrap_or(bytes);
        let (text, had_errors) = self.codec().decode_without_bom_handling(payload);
        (text.into_owned(), had_errors)
    }
}

/// Result of sniffing an input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedFormat {
    pub encoding: TextEncoding,
    pub delimiter: u8,
}

impl DetectedFormat {
    /// Printable delimiter name for logs and reports.
    pub fn delimiter_name(&self) -> &'static str {
        match self.delimiter {
            b',' => "comma",
            b'\t' => "tab",
            b';' => "semicolon",
            b'|' => "pipe",
            _ => "other",
        }
    }
}

/// Resolve the ordered encoding candidates for `settings`.
pub fn encoding_candidates(settings: &IngestSettings) -> Result<Vec<TextEncoding>, IngestError> {
    let mut candidates = vec![TextEncoding::Utf8Bom, TextEncoding::Utf8];
    for label in &settings.legacy_encodings {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| IngestError::UnknownEncoding(label.clone()))?;
        let candidate = TextEncoding::Legacy(encoding);
        if encoding != UTF_8 && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    Ok(candidates)
}

/// Detect the encoding and delimiter of `bytes`.
pub fn detect_format(bytes: &[u8], settings: &IngestSettings) -> Result<DetectedFormat, IngestError> {
    if bytes.is_empty() {
        return Err(IngestError::UndetectableFormat {
            reason: "input is empty".to_string(),
            tried: Vec::new(),
        });
    }
    let complete = bytes.len() <= settings.sniff_bytes;
    let prefix = &bytes[..bytes.len().min(settings.sniff_bytes)];

    let mut tried = Vec::new();
    for encoding in encoding_candidates(settings)? {
        tried.push(encoding.name());
        let Some(text) = encoding.decode_strict(prefix, complete) else {
            continue;
        };
        let sample = if complete {
            text.as_str()
        } else {
            // The last line of a truncated prefix is partial.
            text.rsplit_once('\n').map_or(text.as_str(), |(head, _)| head)
        };
        let Some(delimiter) = sniff_delimiter(sample, settings.sniff_lines) else {
            return Err(IngestError::UndetectableFormat {
                reason: format!("no delimiter candidate appears in {} text", encoding.name()),
                tried,
            });
        };
        let format = DetectedFormat {
            encoding,
            delimiter,
        };
        tracing::debug!(
            encoding = encoding.name(),
            delimiter = format.delimiter_name(),
            "Detected input format"
        );
        return Ok(format);
    }
    Err(IngestError::UndetectableFormat {
        reason: "no candidate encoding decodes the input".to_string(),
        tried,
    })
}

/// Pick the delimiter with the most occurrences across the first `max_lines`
/// non-blank lines. Ties prefer a candidate with the same count on every
/// line, then candidate order. Returns `None` when no candidate appears.
pub fn sniff_delimiter(text: &str, max_lines: usize) -> Option<u8> {
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(max_lines.max(1))
        .collect();

    DELIMITER_CANDIDATES
        .iter()
        .enumerate()
        .filter_map(|(order, &candidate)| {
            let counts: Vec<usize> = lines
                .iter()
                .map(|line| count_unquoted(line, candidate))
                .collect();
            let total: usize = counts.iter().sum();
            let consistent = counts.windows(2).all(|pair| pair[0] == pair[1]);
            (total > 0).then_some((candidate, total, consistent, order))
        })
        .max_by(|a, b| {
            a.1.cmp(&b.1)
                .then(a.2.cmp(&b.2))
                .then(b.3.cmp(&a.3))
        })
        .map(|(candidate, ..)| candidate)
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for &byte in line.as_bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}
