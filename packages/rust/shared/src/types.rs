//! Identifier service.
//!
//! Every chapter, sequential and vertical receives an identifier exactly
//! once, the first time it is observed without one; the index file store
//! persists it from then on.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;

/// Generate a new opaque, time-sortable identifier.
///
/// UUID v7 rendered without dashes, e.g. `01920c5d7b1e7c4a9f3e2d1c0b0a0908`.
pub fn new_id() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Derive the global identifier used as a search-document key.
///
/// `global_id("Card", "abc")` is the standard base64 encoding of `Card:abc`.
pub fn global_id(kind: &str, id: &str) -> String {
    STANDARD.encode(format!("{kind}:{id}"))
}

/// Reverse of [`global_id`]. Returns `None` for malformed input.
pub fn split_global_id(global: &str) -> Option<(String, String)> {
    let bytes = STANDARD.decode(global).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let (kind, id) = text.split_once(':')?;
    Some((kind.to_string(), id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn id_is_opaque_hex() {
        let id = new_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn global_id_encoding() {
        assert_eq!(global_id("Course", "intro"), "Q291cnNlOmludHJv");
        let (kind, id) = split_global_id(&global_id("Card", "a:b")).expect("decode");
        assert_eq!(kind, "Card");
        assert_eq!(id, "a:b");
        assert!(split_global_id("!!not base64").is_none());
    }
}
