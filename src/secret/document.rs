//! # Secret Document
//!
//! The secret value stored in Secrets Manager is a JSON object of string
//! key-value pairs, for example:
//!
//! ```json
//! {"username": "foo", "password": "bar"}
//! ```
//!
//! Unknown fields are carried through rotation untouched. Keys are kept
//! ordered so the serialized form is deterministic, which matters because a
//! retried `PutSecretValue` with the same version id is only accepted when
//! the content is byte-identical.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use zeroize::Zeroize;

/// Errors parsing a secret string
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(
        "secret string is missing or empty; it must be valid JSON like '{{\"username\":\"foo\",\"password\":\"bar\"}}'"
    )]
    Empty,
    #[error(
        "secret string is 'null' literal; it must be valid JSON like '{{\"username\":\"foo\",\"password\":\"bar\"}}'"
    )]
    Null,
    #[error("secret string is not a JSON object of string values: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Key-value secret document
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretDocument {
    fields: BTreeMap<String, String>,
}

impl SecretDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a secret string
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] for an empty string, the `null` literal, or
    /// anything that is not a JSON object of strings.
    pub fn parse(secret_string: &str) -> Result<Self, DocumentError> {
        if secret_string.trim().is_empty() {
            return Err(DocumentError::Empty);
        }
        let fields: Option<BTreeMap<String, String>> = serde_json::from_str(secret_string)?;
        fields.map(|fields| Self { fields }).ok_or(DocumentError::Null)
    }

    /// Serialize to the JSON string stored in Secrets Manager
    ///
    /// # Errors
    ///
    /// Only fails if `serde_json` fails to serialize a string map.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Insert or replace a field, zeroizing the replaced value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        if let Some(mut old) = self.fields.insert(key.into(), value.into()) {
            old.zeroize();
        }
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretDocument {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// Values are secret; only field names are printed.
impl fmt::Debug for SecretDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretDocument")
            .field("keys", &self.fields.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Drop for SecretDocument {
    fn drop(&mut self) {
        for value in self.fields.values_mut() {
            value.zeroize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_unknown_fields() {
        let doc = SecretDocument::parse(r#"{"username":"foo","password":"p1","v":"1"}"#).unwrap();
        assert_eq!(doc.get("username"), Some("foo"));
        assert_eq!(doc.get("v"), Some("1"));
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn test_parse_rejects_empty_and_null() {
        assert!(matches!(SecretDocument::parse(""), Err(DocumentError::Empty)));
        assert!(matches!(SecretDocument::parse("   "), Err(DocumentError::Empty)));
        assert!(matches!(SecretDocument::parse("null"), Err(DocumentError::Null)));
    }

    #[test]
    fn test_parse_rejects_non_string_values() {
        assert!(matches!(
            SecretDocument::parse(r#"{"port":3306}"#),
            Err(DocumentError::Malformed(_))
        ));
        assert!(matches!(
            SecretDocument::parse(r#"["a","b"]"#),
            Err(DocumentError::Malformed(_))
        ));
    }

    #[test]
    fn test_to_json_is_key_ordered() {
        let doc: SecretDocument = [("password", "p1"), ("username", "foo"), ("host", "db")]
            .into_iter()
            .collect();
        assert_eq!(
            doc.to_json().unwrap(),
            r#"{"host":"db","password":"p1","username":"foo"}"#
        );
    }

    #[test]
    fn test_debug_hides_values() {
        let doc: SecretDocument = [("password", "hunter2")].into_iter().collect();
        let printed = format!("{doc:?}");
        assert!(printed.contains("password"));
        assert!(!printed.contains("hunter2"));
    }
}
