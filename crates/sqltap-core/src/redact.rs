//! Parameter redaction and display projection.
//!
//! Parameters pass through a privacy policy before anything about them is
//! recorded: mapping entries with sensitive keys are replaced wholesale,
//! binary blobs collapse to a length placeholder, and long strings are
//! truncated. The redacted tree is then flattened into the ordered list of
//! display strings that travels in the event payload.
//!
//! Redaction is pure and total — it cannot fail and never panics.

use crate::param::ParamValue;
use serde::{Deserialize, Serialize};

/// Privacy policy applied to statement parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionPolicy {
    /// Case-insensitive substrings; a mapping key containing any of them
    /// has its value replaced with [`replacement`](Self::replacement).
    pub redact_keys: Vec<String>,
    /// Literal written in place of a redacted value.
    pub replacement: String,
    /// Maximum length of any display string, ellipsis included.
    pub max_param_len: usize,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            redact_keys: vec![
                "password".to_string(),
                "passwd".to_string(),
                "secret".to_string(),
                "token".to_string(),
            ],
            replacement: "***".to_string(),
            max_param_len: 2048,
        }
    }
}

impl RedactionPolicy {
    /// Replace the redact-key list.
    pub fn with_redact_keys(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.redact_keys = keys.into_iter().collect();
        self
    }

    /// Replace the redaction literal.
    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = replacement.into();
        self
    }

    /// Replace the display-string length limit.
    pub fn with_max_param_len(mut self, max: usize) -> Self {
        self.max_param_len = max;
        self
    }

    fn matches_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.redact_keys
            .iter()
            .any(|marker| key.contains(&marker.to_lowercase()))
    }
}

/// Truncate `value` so the result is at most `max` characters, ending in
/// `...` when anything was cut. Character-based, not byte-based.
pub fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = value.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Project a parameter value through the redaction policy.
pub fn redact(value: &ParamValue, policy: &RedactionPolicy) -> ParamValue {
    match value {
        ParamValue::Map(entries) => ParamValue::Map(
            entries
                .iter()
                .map(|(k, v)| {
                    if policy.matches_key(k) {
                        (k.clone(), ParamValue::Str(policy.replacement.clone()))
                    } else {
                        (k.clone(), redact(v, policy))
                    }
                })
                .collect(),
        ),
        ParamValue::Seq(items) => {
            ParamValue::Seq(items.iter().map(|v| redact(v, policy)).collect())
        }
        ParamValue::Bytes(b) => ParamValue::Str(format!("<bytes:{}>", b.len())),
        ParamValue::Str(s) => ParamValue::Str(truncate(s, policy.max_param_len)),
        other => other.clone(),
    }
}

/// Flatten a redacted parameter value into the ordered display strings
/// carried by the event payload: mapping entries become `"key=value"`,
/// sequence elements are stringified, a scalar yields one element. Every
/// element is independently truncated.
pub fn display_params(params: Option<&ParamValue>, policy: &RedactionPolicy) -> Option<Vec<String>> {
    let redacted = redact(params?, policy);
    let out = match redacted {
        ParamValue::Map(entries) => entries
            .iter()
            .map(|(k, v)| truncate(&format!("{k}={v}"), policy.max_param_len))
            .collect(),
        ParamValue::Seq(items) => items
            .iter()
            .map(|v| truncate(&v.to_string(), policy.max_param_len))
            .collect(),
        scalar => vec![truncate(&scalar.to_string(), policy.max_param_len)],
    };
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RedactionPolicy {
        RedactionPolicy::default()
    }

    #[test]
    fn test_redacts_matching_map_keys() {
        let params = ParamValue::map([
            ("password", ParamValue::str("x")),
            ("n", ParamValue::str("Jane")),
        ]);
        let redacted = redact(&params, &policy());
        assert_eq!(
            redacted,
            ParamValue::map([
                ("password", ParamValue::str("***")),
                ("n", ParamValue::str("Jane")),
            ])
        );
    }

    #[test]
    fn test_key_match_is_case_insensitive_substring() {
        let params = ParamValue::map([("UserPassword2", ParamValue::str("x"))]);
        let redacted = redact(&params, &policy());
        assert_eq!(
            redacted,
            ParamValue::map([("UserPassword2", ParamValue::str("***"))])
        );
    }

    #[test]
    fn test_nested_structures_recurse() {
        let params = ParamValue::map([(
            "outer",
            ParamValue::seq([ParamValue::map([("api_token", ParamValue::str("abc"))])]),
        )]);
        let redacted = redact(&params, &policy());
        assert_eq!(
            redacted,
            ParamValue::map([(
                "outer",
                ParamValue::seq([ParamValue::map([("api_token", ParamValue::str("***"))])]),
            )])
        );
    }

    #[test]
    fn test_bytes_collapse_to_length() {
        let redacted = redact(&ParamValue::Bytes(vec![0u8; 42]), &policy());
        assert_eq!(redacted, ParamValue::str("<bytes:42>"));
    }

    #[test]
    fn test_truncation_is_exact() {
        let long = "a".repeat(50);
        let out = truncate(&long, 10);
        assert_eq!(out.chars().count(), 10);
        assert!(out.ends_with("..."));
        assert_eq!(out, format!("{}...", "a".repeat(7)));

        // at the limit: untouched
        assert_eq!(truncate("abcdef", 6), "abcdef");
    }

    #[test]
    fn test_truncation_counts_chars_not_bytes() {
        let long = "é".repeat(20);
        let out = truncate(&long, 8);
        assert_eq!(out.chars().count(), 8);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_display_params_map() {
        let params = ParamValue::map([
            ("password", ParamValue::str("hunter2")),
            ("name", ParamValue::str("Jane")),
        ]);
        let out = display_params(Some(&params), &policy()).unwrap();
        assert_eq!(out, vec!["password=***", "name=Jane"]);
    }

    #[test]
    fn test_display_params_seq_and_scalar() {
        let params = ParamValue::seq([ParamValue::Int(1), ParamValue::str("x"), ParamValue::Null]);
        let out = display_params(Some(&params), &policy()).unwrap();
        assert_eq!(out, vec!["1", "x", "NULL"]);

        let out = display_params(Some(&ParamValue::Int(9)), &policy()).unwrap();
        assert_eq!(out, vec!["9"]);
    }

    #[test]
    fn test_display_params_none() {
        assert_eq!(display_params(None, &policy()), None);
    }

    #[test]
    fn test_display_params_elements_truncated() {
        let p = policy().with_max_param_len(8);
        let params = ParamValue::map([("key", ParamValue::str("a very long value"))]);
        let out = display_params(Some(&params), &p).unwrap();
        assert_eq!(out[0].chars().count(), 8);
        assert!(out[0].ends_with("..."));
    }
}
