//! crates/document_insights_core/src/keys.rs
//!
//! Generation of blob keys for uploaded files.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Builds a collision-resistant key: `{uuid}-{unix millis}[.{ext}]`.
///
/// Only the extension of `original_filename` is used, so two uploads with the
/// same name never share a key and user input never becomes a path component.
pub fn object_key(original_filename: &str, now: DateTime<Utc>) -> String {
    let base = format!("{}-{}", Uuid::new_v4(), now.timestamp_millis());
    match file_extension(original_filename) {
        Some(ext) => format!("{}.{}", base, ext),
        None => base,
    }
}

fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_760_000_000_123).unwrap()
    }

    #[test]
    fn keeps_lowercased_extension() {
        let key = object_key("Tax Notice 2026.PDF", fixed_now());
        assert!(key.ends_with("-1760000000123.pdf"), "unexpected key {}", key);
    }

    #[test]
    fn keys_are_unique_for_identical_names() {
        let a = object_key("invoice.pdf", fixed_now());
        let b = object_key("invoice.pdf", fixed_now());
        assert_ne!(a, b);
    }

    #[test]
    fn missing_or_unsafe_extensions_are_dropped() {
        assert!(object_key("README", fixed_now()).ends_with("-1760000000123"));
        assert!(object_key("scan.", fixed_now()).ends_with("-1760000000123"));
        assert!(object_key("evil.pdf/../x", fixed_now()).ends_with("-1760000000123"));
    }

    #[test]
    fn key_starts_with_a_uuid() {
        let key = object_key("letter.txt", fixed_now());
        let uuid_part = &key[..36];
        assert!(Uuid::parse_str(uuid_part).is_ok());
    }
}
