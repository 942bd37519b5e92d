//! Redaction of credential-bearing fields before persistence or export.

use std::collections::BTreeMap;

pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "authorization",
    "api_key",
    "apikey",
    "credential",
    "cookie",
    "private_key",
];

pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key.contains(s))
}

/// Replace values of sensitive keys in place.
pub fn redact_map(map: &mut BTreeMap<String, String>) {
    for (key, value) in map.iter_mut() {
        if is_sensitive_key(key) {
            *value = REDACTED.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_value_redacted() {
        let mut map = BTreeMap::new();
        map.insert("password".to_string(), "hunter2".to_string());
        map.insert("course_id".to_string(), "math-101".to_string());

        redact_map(&mut map);

        assert_eq!(map["password"], REDACTED);
        assert_eq!(map["course_id"], "math-101");
    }

    #[test]
    fn test_key_matching_is_substring_and_case_insensitive() {
        assert!(is_sensitive_key("X-Api-Key"));
        assert!(is_sensitive_key("refreshToken"));
        assert!(is_sensitive_key("AUTHORIZATION"));
        assert!(!is_sensitive_key("username"));
    }
}
