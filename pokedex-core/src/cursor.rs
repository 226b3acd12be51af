//! Opaque pagination cursors
//!
//! A cursor is `base64("arrayconnection:" + offset)`. Cursors come from
//! clients and are untrusted, so decoding never fails loudly: anything
//! that is not a cursor this module produced decodes to `None` and the
//! caller falls back to its own default offset.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

const PREFIX: &str = "arrayconnection:";

/// Creates the cursor string for an absolute offset.
pub fn encode(offset: i64) -> String {
    STANDARD.encode(format!("{}{}", PREFIX, offset))
}

/// Rederives the offset from a cursor string.
///
/// Returns `None` for malformed base64, a foreign prefix, a non-integer
/// tail or a negative offset.
pub fn decode(cursor: &str) -> Option<i64> {
    let bytes = STANDARD.decode(cursor).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let digits = text.strip_prefix(PREFIX)?;
    let offset: i64 = digits.parse().ok()?;
    (offset >= 0).then_some(offset)
}

/// Offset named by `cursor`, or `default` when the cursor is absent or invalid.
pub fn offset_with_default(cursor: Option<&str>, default: i64) -> i64 {
    match cursor {
        Some(cursor) => decode(cursor).unwrap_or_else(|| {
            tracing::debug!(cursor, default, "ignoring invalid cursor");
            default
        }),
        None => default,
    }
}
