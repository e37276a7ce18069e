//! Uniform access to request parameters
//!
//! DataTables sends the same flat keys (`draw`, `columns[0][name]`, ...)
//! either in the query string or in a form body. The parser only needs
//! "value for key, or absent", so every transport-specific container
//! implements [`ParamSource`].

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// Read-only "value by key" accessor
///
/// Absence (`None`) is distinct from an empty value (`Some("")`): the parser
/// uses absence of `columns[i][name]` as the end-of-list signal.
///
/// A key sent more than once resolves to its last value in every container,
/// matching what axum's `Query` and `Form` extractors keep in a map.
pub trait ParamSource {
    /// Value for `key`, if the key was sent
    fn param(&self, key: &str) -> Option<&str>;

    /// Best-effort 32-bit integer; absent or unparseable reads as 0
    fn int_param(&self, key: &str) -> i32 {
        self.param(key)
            .and_then(|value| value.trim().parse::<i32>().ok())
            .unwrap_or(0)
    }
}

impl<S: BuildHasher> ParamSource for HashMap<String, String, S> {
    fn param(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl ParamSource for BTreeMap<String, String> {
    fn param(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl ParamSource for [(String, String)] {
    fn param(&self, key: &str) -> Option<&str> {
        self.iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl ParamSource for [(&str, &str)] {
    fn param(&self, key: &str) -> Option<&str> {
        self.iter().rev().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

impl ParamSource for Vec<(String, String)> {
    fn param(&self, key: &str) -> Option<&str> {
        self.as_slice().param(key)
    }
}

impl<T: ParamSource + ?Sized> ParamSource for &T {
    fn param(&self, key: &str) -> Option<&str> {
        (**self).param(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_differs_from_empty() {
        let params: &[(&str, &str)] = &[("columns[0][name]", "")];
        assert_eq!(params.param("columns[0][name]"), Some(""));
        assert_eq!(params.param("columns[1][name]"), None);
    }

    #[test]
    fn test_int_param_is_best_effort() {
        let params: HashMap<String, String> = [
            ("draw", " 7 "),
            ("start", "abc"),
            ("length", "99999999999"),
            ("neg", "-5"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        assert_eq!(params.int_param("draw"), 7);
        assert_eq!(params.int_param("start"), 0);
        // overflows i32, treated like any other unparseable value
        assert_eq!(params.int_param("length"), 0);
        assert_eq!(params.int_param("neg"), -5);
        assert_eq!(params.int_param("missing"), 0);
    }

    #[test]
    fn test_pair_list_last_wins() {
        let params = vec![
            ("draw".to_string(), "1".to_string()),
            ("draw".to_string(), "2".to_string()),
        ];
        assert_eq!(params.param("draw"), Some("2"));
    }

    #[test]
    fn test_repeated_keys_agree_across_containers() {
        let pairs = vec![
            ("draw".to_string(), "1".to_string()),
            ("columns[0][name]".to_string(), "id".to_string()),
            ("draw".to_string(), "5".to_string()),
            ("columns[0][name]".to_string(), "name".to_string()),
        ];
        let map: HashMap<String, String> = pairs.clone().into_iter().collect();
        let tree: BTreeMap<String, String> = pairs.clone().into_iter().collect();
        let borrowed: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        for key in ["draw", "columns[0][name]", "start"] {
            assert_eq!(pairs.param(key), map.param(key), "key {}", key);
            assert_eq!(tree.param(key), map.param(key), "key {}", key);
            assert_eq!(borrowed.as_slice().param(key), map.param(key), "key {}", key);
        }
        assert_eq!(pairs.int_param("draw"), 5);
    }

    #[test]
    fn test_btree_map_and_reference() {
        let mut params = BTreeMap::new();
        params.insert("search[value]".to_string(), "foo".to_string());
        let by_ref = &params;
        assert_eq!(by_ref.param("search[value]"), Some("foo"));
    }
}
