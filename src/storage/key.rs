//! Storage key policies

use chrono::Utc;

pub trait KeyStrategy: Send + Sync {
    fn key_for(&self, field_name: &str, original_name: &str) -> String;
}

/// `<field>-<unix millis><ext>`, e.g. `image-1718000000000.png`.
///
/// Two uploads for the same field within the same millisecond collide.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampKeys;

impl KeyStrategy for TimestampKeys {
    fn key_for(&self, field_name: &str, original_name: &str) -> String {
        storage_key(field_name, original_name, Utc::now().timestamp_millis())
    }
}

pub fn storage_key(field_name: &str, original_name: &str, millis: i64) -> String {
    format!("{}-{}{}", field_name, millis, extension_of(original_name))
}

/// Extension of the last path component, including the leading dot.
///
/// Dotfiles such as `.bashrc` have no extension.
pub fn extension_of(name: &str) -> &str {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if base.trim_start_matches('.').is_empty() {
        return "";
    }
    match base.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &base[idx..],
    }
}
