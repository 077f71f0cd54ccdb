//! Deterministic cache keys for analysis requests.
//!
//! Two requests that mean the same thing must map to the same key: targets
//! are trimmed, sorted and de-duplicated, option maps are serialized with
//! object keys in sorted order at every depth. The requester identity does
//! not take part, so equivalent requests from different callers share
//! results.

use serde_json::Value;
use sitelens_core::{
    compute_content_hash, content_hash_hex, AnalysisKind, AnalysisOptions, AnalysisRequest,
};
use std::fmt;

/// Version tag mixed into every key. Bump when the canonical form changes.
const KEY_VERSION: &str = "sitelens-key-v1";

/// Number of hex characters exposed by [`CacheKey::prefix`].
pub const KEY_PREFIX_LEN: usize = 12;

/// Opaque, fixed-form cache key (64 lowercase hex characters).
///
/// The private inner field means a key can only be produced from a request
/// or its canonical parts, never from an arbitrary string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    digest: String,
}

impl CacheKey {
    /// Derive the key for a request.
    pub fn for_request(request: &AnalysisRequest) -> Self {
        Self::from_parts(request.kind, &request.canonical_targets(), &request.options)
    }

    /// Derive a key from already-canonical targets.
    ///
    /// Targets are re-canonicalized here as well, so callers passing raw
    /// lists still get order-independent keys.
    pub fn from_parts(kind: AnalysisKind, targets: &[String], options: &AnalysisOptions) -> Self {
        let mut targets: Vec<&str> = targets
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        targets.sort_unstable();
        targets.dedup();

        let mut canonical = String::new();
        push_component(&mut canonical, KEY_VERSION);
        push_component(&mut canonical, kind.as_str());

        canonical.push_str(&format!("targets:{}\n", targets.len()));
        for target in targets {
            push_component(&mut canonical, target);
        }

        canonical.push_str(&format!("options:{}\n", options.len()));
        for (key, value) in options {
            push_component(&mut canonical, key);
            let mut encoded = String::new();
            write_canonical_json(value, &mut encoded);
            push_component(&mut canonical, &encoded);
        }

        let digest = content_hash_hex(&compute_content_hash(canonical.as_bytes()));
        Self { digest }
    }

    /// Full hex digest.
    pub fn as_str(&self) -> &str {
        &self.digest
    }

    /// Short prefix suitable for logs and stats.
    pub fn prefix(&self) -> &str {
        &self.digest[..KEY_PREFIX_LEN.min(self.digest.len())]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest)
    }
}

/// Length-prefixed component, so `["ab", "c"]` and `["a", "bc"]` differ.
fn push_component(out: &mut String, component: &str) {
    out.push_str(&component.len().to_string());
    out.push(':');
    out.push_str(component);
    out.push('\n');
}

/// Serialize JSON with object keys sorted at every depth.
fn write_canonical_json(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical_json(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_json(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(targets: &[&str]) -> AnalysisRequest {
        AnalysisRequest::new(targets.iter().copied(), AnalysisKind::Quick, "user-1")
    }

    #[test]
    fn test_key_is_fixed_form() {
        let key = CacheKey::for_request(&request(&["a.com"]));
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(key.prefix().len(), KEY_PREFIX_LEN);
        assert!(key.as_str().starts_with(key.prefix()));
    }

    #[test]
    fn test_target_order_does_not_matter() {
        let a = CacheKey::for_request(&request(&["a.com", "b.com", "c.com"]));
        let b = CacheKey::for_request(&request(&["c.com", "a.com", "b.com"]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_and_padded_targets_collapse() {
        let a = CacheKey::for_request(&request(&["a.com", "b.com"]));
        let b = CacheKey::for_request(&request(&[" b.com", "a.com", "a.com "]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_kind_changes_key() {
        let quick = CacheKey::for_request(&request(&["a.com"]));
        let mut deep = request(&["a.com"]);
        deep.kind = AnalysisKind::Comprehensive;
        assert_ne!(quick, CacheKey::for_request(&deep));
    }

    #[test]
    fn test_requester_does_not_change_key() {
        let mut other = request(&["a.com"]);
        other.requester_id = "user-2".to_string();
        assert_eq!(
            CacheKey::for_request(&request(&["a.com"])),
            CacheKey::for_request(&other)
        );
    }

    #[test]
    fn test_options_change_key() {
        let plain = CacheKey::for_request(&request(&["a.com"]));
        let mobile =
            CacheKey::for_request(&request(&["a.com"]).with_option("device", json!("mobile")));
        let desktop =
            CacheKey::for_request(&request(&["a.com"]).with_option("device", json!("desktop")));
        assert_ne!(plain, mobile);
        assert_ne!(mobile, desktop);
    }

    #[test]
    fn test_nested_option_objects_are_canonical() {
        let a = request(&["a.com"]).with_option("crawl", json!({"depth": 2, "follow": true}));
        let b = request(&["a.com"]).with_option("crawl", json!({"follow": true, "depth": 2}));
        assert_eq!(CacheKey::for_request(&a), CacheKey::for_request(&b));
    }

    #[test]
    fn test_component_boundaries_are_unambiguous() {
        let a = CacheKey::from_parts(
            AnalysisKind::Quick,
            &["ab".to_string(), "c".to_string()],
            &AnalysisOptions::new(),
        );
        let b = CacheKey::from_parts(
            AnalysisKind::Quick,
            &["a".to_string(), "bc".to_string()],
            &AnalysisOptions::new(),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let mut out = String::new();
        write_canonical_json(&json!({"b": [ {"z": 1, "a": 2} ], "a": null}), &mut out);
        assert_eq!(out, r#"{"a":null,"b":[{"a":2,"z":1}]}"#);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn target_strategy() -> impl Strategy<Value = String> {
        "[a-z]{1,8}\\.(com|org|io)"
    }

    fn kind_strategy() -> impl Strategy<Value = AnalysisKind> {
        prop_oneof![
            Just(AnalysisKind::Quick),
            Just(AnalysisKind::Standard),
            Just(AnalysisKind::Comprehensive),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Property: Any permutation of the same targets yields the same key.
        #[test]
        fn prop_key_ignores_target_order(
            targets in prop::collection::vec(target_strategy(), 1..12),
            kind in kind_strategy(),
            seed in any::<u64>(),
        ) {
            let mut shuffled = targets.clone();
            // Deterministic rotation and reversal driven by the seed.
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            if seed % 2 == 0 {
                shuffled.reverse();
            }

            let options = AnalysisOptions::new();
            prop_assert_eq!(
                CacheKey::from_parts(kind, &targets, &options),
                CacheKey::from_parts(kind, &shuffled, &options)
            );
        }

        /// Property: Distinct target sets yield distinct keys.
        #[test]
        fn prop_distinct_target_sets_distinct_keys(
            a in prop::collection::btree_set(target_strategy(), 1..6),
            b in prop::collection::btree_set(target_strategy(), 1..6),
        ) {
            let a: Vec<String> = a.into_iter().collect();
            let b: Vec<String> = b.into_iter().collect();
            let options = AnalysisOptions::new();
            let key_a = CacheKey::from_parts(AnalysisKind::Quick, &a, &options);
            let key_b = CacheKey::from_parts(AnalysisKind::Quick, &b, &options);
            if a == b {
                prop_assert_eq!(key_a, key_b);
            } else {
                prop_assert_ne!(key_a, key_b);
            }
        }
    }
}
