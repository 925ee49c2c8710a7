//! Cache key construction and the stable selection hash.
//!
//! Keys are namespaced strings; the selection hash canonicalizes an unordered
//! list of typed codes into a fixed-length token so that permutations of the
//! same choices share one cache entry.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha1::{Digest, Sha1};

use crate::domain::Selection;

const LOCK_PREFIX: &str = "sbridg:lock:";
const RANK_PREFIX: &str = "sbridg:cache:v1:soc:rank:industry:";
const SHORTAGE_PREFIX: &str = "sb:shortage:by-anzsco:v1:";

/// Key of the lock entry guarding recomputation of a business key.
pub fn lock_key(key: &str) -> String {
    format!("{LOCK_PREFIX}{key}")
}

/// Key for a ranked-occupations response, scoped by industry.
pub fn rank_key(scope: &str, selection_hash: &str) -> String {
    format!("{RANK_PREFIX}{scope}:{selection_hash}")
}

/// Key for the shortage aggregation of a 4-digit ANZSCO prefix.
pub fn shortage_key(prefix4: &str) -> String {
    format!("{SHORTAGE_PREFIX}{prefix4}")
}

/// Normalize an optional industry filter into a key scope: lower-cased,
/// inner whitespace collapsed, `all` when absent or blank.
pub fn industry_scope(industry: Option<&str>) -> String {
    match industry {
        Some(raw) if !raw.trim().is_empty() => raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase(),
        _ => "all".to_string(),
    }
}

/// Canonical token for an unordered selection list.
///
/// Selections are normalized (kind lower-cased, code trimmed), empties
/// dropped, and the rest sorted by the concatenation of kind and code so the
/// token is independent of input order. The sorted list is serialized as a
/// compact JSON array with fixed field order and digested with SHA-1,
/// encoded in the URL-safe unpadded base64 alphabet.
///
/// Duplicate selections are kept: the input is treated as a multiset, so a
/// repeated code changes the token.
pub fn stable_hash(selections: &[Selection]) -> String {
    let mut normalized: Vec<Selection> = selections
        .iter()
        .filter_map(Selection::normalized)
        .collect();
    normalized.sort_by_key(|sel| format!("{}{}", sel.kind, sel.code));

    let canonical =
        serde_json::to_string(&normalized).expect("selection list serializes to JSON");
    URL_SAFE_NO_PAD.encode(Sha1::digest(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(kind: &str, code: &str) -> Selection {
        Selection::new(kind, code)
    }

    #[test]
    fn hash_is_order_and_kind_case_insensitive() {
        let a = stable_hash(&[sel("Skill", "abc"), sel("Tech", "xyz")]);
        let b = stable_hash(&[sel("tech", "xyz"), sel("skill", "abc")]);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_ignores_surrounding_whitespace_on_code() {
        let a = stable_hash(&[sel("skill", " abc ")]);
        let b = stable_hash(&[sel("skill", "abc")]);
        assert_eq!(a, b);
    }

    #[test]
    fn code_case_changes_the_hash() {
        let upper = stable_hash(&[sel("skill", "ABC")]);
        let lower = stable_hash(&[sel("skill", "abc")]);
        assert_ne!(upper, lower);
    }

    #[test]
    fn empty_components_are_dropped_before_hashing() {
        let with_noise = stable_hash(&[sel("skill", "abc"), sel("", "zzz"), sel("tech", "  ")]);
        let clean = stable_hash(&[sel("skill", "abc")]);
        assert_eq!(with_noise, clean);
    }

    #[test]
    fn duplicates_are_a_multiset_not_a_set() {
        let once = stable_hash(&[sel("skill", "abc")]);
        let twice = stable_hash(&[sel("skill", "abc"), sel("skill", "abc")]);
        assert_ne!(once, twice);
    }

    #[test]
    fn token_is_fixed_length_and_url_safe() {
        let token = stable_hash(&[sel("knowledge", "2.C.1.a"), sel("tech", "43231507")]);
        // 20-byte SHA-1 digest in unpadded base64.
        assert_eq!(token.len(), 27);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn key_builders_namespace_correctly() {
        assert_eq!(lock_key("k"), "sbridg:lock:k");
        assert_eq!(shortage_key("2613"), "sb:shortage:by-anzsco:v1:2613");
        assert_eq!(
            rank_key("all", "h"),
            "sbridg:cache:v1:soc:rank:industry:all:h"
        );
    }

    #[test]
    fn industry_scope_normalizes() {
        assert_eq!(industry_scope(None), "all");
        assert_eq!(industry_scope(Some("  ")), "all");
        assert_eq!(
            industry_scope(Some("Information   Media and Telecommunications")),
            "information media and telecommunications"
        );
    }
}
