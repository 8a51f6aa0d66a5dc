//! Endpoint path classification
//!
//! Audit rows must group by endpoint, so dynamic path segments (record
//! ids, UUIDs, cuid-style tokens) are normalized to `:id` before the
//! path is folded into `{module, api_name}` labels. Without this every
//! distinct id would mint a new label and the table's cardinality would
//! be unbounded.

use regex::Regex;

/// Low-cardinality labels derived from an endpoint path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointClass {
    /// Top-level API area, e.g. `interviews`
    pub module: String,
    /// Dotted route name with ids normalized, e.g. `interviews.:id.evaluate`
    pub api_name: String,
}

/// Whether a path segment looks like a record identifier rather than a
/// route word.
fn is_id_segment(segment: &str) -> bool {
    static UUID_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let uuid_re = UUID_RE.get_or_init(|| {
        Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .unwrap()
    });

    if segment.is_empty() {
        return false;
    }
    // Pure numeric ids
    if segment.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    // Canonical UUIDs
    if uuid_re.is_match(segment) {
        return true;
    }
    // Long opaque tokens (cuid, nanoid, hex ids). Requiring a digit
    // keeps long route words out.
    segment.len() >= 16
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        && segment.bytes().any(|b| b.is_ascii_digit())
}

/// Whether a segment is an API version prefix like `v1`
fn is_version_segment(segment: &str) -> bool {
    let mut bytes = segment.bytes();
    bytes.next() == Some(b'v')
        && !segment[1..].is_empty()
        && segment[1..].bytes().all(|b| b.is_ascii_digit())
}

/// Classify an endpoint path into `{module, api_name}`.
///
/// The query string is ignored, `api` and version prefixes are
/// dropped, and id-like segments become `:id`.
pub fn classify(path: &str) -> EndpointClass {
    let path = path.split('?').next().unwrap_or(path);

    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .skip_while(|s| *s == "api" || is_version_segment(s))
        .map(|s| {
            if is_id_segment(s) {
                ":id".to_string()
            } else {
                s.to_lowercase()
            }
        })
        .collect();

    let module = segments
        .iter()
        .find(|s| *s != ":id")
        .cloned()
        .unwrap_or_else(|| "root".to_string());
    let api_name = if segments.is_empty() {
        "root".to_string()
    } else {
        segments.join(".")
    };

    EndpointClass { module, api_name }
}
