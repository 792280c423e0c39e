//! Logical resource identifiers and their store keys.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Prefix applied to every identifier to form its store key.
pub const STORE_KEY_PREFIX: &str = "presence:";

/// Maximum length of a resource type or explicit identifier.
pub const MAX_IDENTIFIER_LEN: usize = 200;

const RESOURCE_TYPE_PATTERN: &str = r"^[A-Za-z0-9_.\-]+$";

static RESOURCE_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(RESOURCE_TYPE_PATTERN).expect("valid regex"));

/// Key grouping all viewers of one logical resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Derive the identifier for a viewed resource.
    ///
    /// A non-blank `explicit` override wins. Otherwise the identifier is
    /// `"{resource_type}:{resource_key}"`, or just the resource type when no
    /// specific record is viewed (e.g. a create screen).
    pub fn derive(
        explicit: Option<&str>,
        resource_type: &str,
        resource_key: Option<&str>,
    ) -> Result<Self, CoreError> {
        if let Some(explicit) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
            check_len("identifier", explicit)?;
            return Ok(Self(explicit.to_string()));
        }

        validate_resource_type(resource_type)?;
        let id = match resource_key.map(str::trim).filter(|s| !s.is_empty()) {
            Some(key) => format!("{resource_type}:{key}"),
            None => resource_type.to_string(),
        };
        check_len("identifier", &id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which this identifier's presence set is stored.
    pub fn store_key(&self) -> String {
        format!("{STORE_KEY_PREFIX}{}", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate a resource type name. Returns a validation error on failure.
pub fn validate_resource_type(resource_type: &str) -> Result<(), CoreError> {
    if !RESOURCE_TYPE_RE.is_match(resource_type) {
        return Err(CoreError::Validation(format!(
            "Invalid resource_type '{resource_type}'. Use letters, digits, '_', '.' or '-'"
        )));
    }
    check_len("resource_type", resource_type)
}

fn check_len(field: &str, value: &str) -> Result<(), CoreError> {
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(CoreError::Validation(format!(
            "{field} must be at most {MAX_IDENTIFIER_LEN} characters, got {}",
            value.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_type_and_key() {
        let id = Identifier::derive(None, "post", Some("42")).unwrap();
        assert_eq!(id.as_str(), "post:42");
        assert_eq!(id.store_key(), "presence:post:42");
    }

    #[test]
    fn test_type_only_for_create_screen() {
        let id = Identifier::derive(None, "post", None).unwrap();
        assert_eq!(id.as_str(), "post");

        let blank_key = Identifier::derive(None, "post", Some("  ")).unwrap();
        assert_eq!(blank_key, id);
    }

    #[test]
    fn test_override_wins() {
        let id = Identifier::derive(Some("shared-board"), "post", Some("42")).unwrap();
        assert_eq!(id.as_str(), "shared-board");
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let id = Identifier::derive(Some(" "), "post", Some("1")).unwrap();
        assert_eq!(id.as_str(), "post:1");
    }

    #[test]
    fn test_same_resource_same_identifier() {
        let a = Identifier::derive(None, "App.Models.Post", Some("9")).unwrap();
        let b = Identifier::derive(None, "App.Models.Post", Some("9")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_resource_type() {
        assert_matches!(
            Identifier::derive(None, "", Some("1")),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            Identifier::derive(None, "post type", None),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn test_too_long_identifier() {
        let long = "x".repeat(MAX_IDENTIFIER_LEN + 1);
        assert_matches!(
            Identifier::derive(Some(&long), "post", None),
            Err(CoreError::Validation(_))
        );
    }
}
