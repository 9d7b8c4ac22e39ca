pub(super) const MIN_SNIFF_BYTES: usize = 1024;
pub(super) const MAX_SNIFF_LINES: usize = 1_000;
pub(super) const MAX_PROGRESS_STRIDE: usize = 1_000_000;
pub(super) const MAX_HOLDOUT_FRACTION: f64 = 0.9;

pub(super) fn default_sniff_bytes() -> usize {
    64 * 1024
}

pub(super) fn default_sniff_lines() -> usize {
    20
}

/// GBK decoding also accepts GB2312 and GB18030 bytes. Big5, Shift_JIS and
/// EUC-KR overlap GBK's byte ranges, so they are opt-in and must be listed
/// ahead of `gbk` to win.
pub(super) fn default_legacy_encodings() -> Vec<String> {
    vec!["gbk".to_string()]
}

pub(super) fn default_seed() -> u64 {
    42
}

pub(super) fn default_split_positive_share() -> f64 {
    0.7
}

pub(super) fn default_progress_stride() -> usize {
    100
}

pub(super) fn default_holdout_fraction() -> f64 {
    0.0
}

pub(super) fn default_negative_threshold() -> f64 {
    0.4
}

pub(super) fn default_positive_threshold() -> f64 {
    0.6
}

pub(super) fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
