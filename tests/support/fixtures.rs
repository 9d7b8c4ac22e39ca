use std::path::Path;

use encoding_rs::Encoding;

/// Write `text` to `path` in `encoding`, panicking on unmappable characters.
pub fn write_encoded(path: &Path, text: &str, encoding: &'static Encoding) {
    let (bytes, _, had_errors) = encoding.encode(text);
    assert!(!had_errors, "{} cannot encode fixture", encoding.name());
    std::fs::write(path, bytes).expect("write fixture");
}

/// Write `text` as UTF-8 with a byte-order mark.
pub fn write_utf8_bom(path: &Path, text: &str) {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(text.as_bytes());
    std::fs::write(path, bytes).expect("write fixture");
}

/// A two-class review table with `per_class` rows of each class.
///
/// Row `idx` mixes a shared sentiment word with a per-row filler word, so the
/// classes are separable but not trivially memorized.
pub fn review_rows(per_class: usize) -> Vec<(String, &'static str)> {
    const POSITIVE: &[&str] = &["很好", "喜欢", "满意", "推荐", "great", "love"];
    const NEGATIVE: &[&str] = &["很差", "失望", "退货", "糟糕", "awful", "broken"];
    const FILLER: &[&str] = &["包装", "物流", "价格", "客服", "颜色", "size", "box"];
    let mut rows = Vec::with_capacity(per_class * 2);
    for idx in 0..per_class {
        let filler = FILLER[idx % FILLER.len()];
        rows.push((
            format!("{} {filler} {}", POSITIVE[idx % POSITIVE.len()], POSITIVE[(idx + 1) % POSITIVE.len()]),
            "positive",
        ));
        rows.push((
            format!("{} {filler} {}", NEGATIVE[idx % NEGATIVE.len()], NEGATIVE[(idx + 1) % NEGATIVE.len()]),
            "negative",
        ));
    }
    rows
}

/// Render rows as a comma-separated table with the canonical header.
pub fn to_csv(rows: &[(String, &str)]) -> String {
    let mut out = String::from("content,sentiment\n");
    for (content, label) in rows {
        out.push_str(&format!("\"{content}\",{label}\n"));
    }
    out
}
