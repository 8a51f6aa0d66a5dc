//! Correlation id handling
//!
//! Every inbound request is correlated by an opaque id. An `X-Request-Id`
//! header sent by the caller is honored after sanitization; otherwise an
//! id is minted as `<epoch-ms>-<random>`.

use uuid::Uuid;

/// Maximum accepted length for an inbound correlation id
pub const MAX_REQUEST_ID_LEN: usize = 128;

/// Length of the random suffix on minted ids
const MINT_SUFFIX_LEN: usize = 12;

/// Sanitize an inbound correlation id.
///
/// Keeps `[A-Za-z0-9._-]`, truncates to [`MAX_REQUEST_ID_LEN`], and
/// returns `None` when nothing usable survives.
#[must_use]
pub fn sanitize(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(MAX_REQUEST_ID_LEN)
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Mint a fresh correlation id: `<epoch-ms>-<random>`.
#[must_use]
pub fn mint() -> String {
    let epoch_ms = chrono::Utc::now().timestamp_millis();
    let entropy = Uuid::new_v4().simple().to_string();
    format!("{}-{}", epoch_ms, &entropy[..MINT_SUFFIX_LEN])
}

/// Resolve the request id for an inbound call: honor a sanitized header
/// value when present, mint otherwise.
#[must_use]
pub fn from_header(header: Option<&str>) -> String {
    header.and_then(sanitize).unwrap_or_else(mint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_safe_chars() {
        assert_eq!(
            sanitize("req-123.abc_DEF").as_deref(),
            Some("req-123.abc_DEF")
        );
    }

    #[test]
    fn test_sanitize_strips_unsafe_chars() {
        assert_eq!(
            sanitize("abc\r\n<script>!?").as_deref(),
            Some("abcscript")
        );
        assert_eq!(sanitize("\r\n\t !?"), None);
        assert_eq!(sanitize(""), None);
    }

    #[test]
    fn test_sanitize_truncates_long_ids() {
        let long = "a".repeat(400);
        let cleaned = sanitize(&long).unwrap();
        assert_eq!(cleaned.len(), MAX_REQUEST_ID_LEN);
    }

    #[test]
    fn test_mint_shape() {
        let id = mint();
        let (epoch, suffix) = id.split_once('-').unwrap();
        assert!(epoch.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), MINT_SUFFIX_LEN);
    }

    #[test]
    fn test_mint_is_unique() {
        let a = mint();
        let b = mint();
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_header_honors_valid_header() {
        assert_eq!(from_header(Some("client-id-1")), "client-id-1");
    }

    #[test]
    fn test_from_header_mints_when_missing_or_garbage() {
        let minted = from_header(None);
        assert!(minted.contains('-'));

        let minted = from_header(Some("\r\n"));
        assert!(minted.contains('-'));
    }
}
