//! First-match label resolution.
//!
//! Given the per-entry match booleans for one query embedding, the resolved
//! label is that of the earliest stored record whose comparison was true:
//! first-match-wins by store insertion order, never closest-match.

/// Sentinel label for a face matching no stored record.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Resolve the label for one query given its match booleans.
///
/// `matches` and `labels` are aligned index-for-index with the store.
/// Returns [`UNKNOWN_LABEL`] when no comparison evaluated true.
pub fn resolve_label<'a>(matches: &[bool], labels: &'a [String]) -> &'a str {
    matches
        .iter()
        .position(|&m| m)
        .and_then(|i| labels.get(i))
        .map(String::as_str)
        .unwrap_or(UNKNOWN_LABEL)
}
