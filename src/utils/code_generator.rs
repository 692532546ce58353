//! Alias generation and validation utilities.

use crate::error::AppError;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::json;

/// Length of generated aliases.
pub const GENERATED_ALIAS_LENGTH: usize = 6;

pub const MIN_ALIAS_LENGTH: usize = 3;
pub const MAX_ALIAS_LENGTH: usize = 100;

/// Aliases that would shadow system routes.
pub const RESERVED_ALIASES: &[&str] = &["api", "health", "metrics"];

/// Generates a random alphanumeric alias of `length` characters.
///
/// # Examples
///
/// ```ignore
/// let alias = generate_alias(6);
/// assert_eq!(alias.len(), 6);
/// assert!(alias.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn generate_alias(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Validates a user-provided custom alias.
///
/// # Rules
///
/// - Length: 3-100 characters
/// - Allowed characters: ASCII letters and digits
/// - Cannot be a reserved system alias (case-insensitive)
///
/// # Errors
///
/// Returns [`AppError::Validation`] if any rule is violated.
pub fn validate_custom_alias(alias: &str) -> Result<(), AppError> {
    if alias.len() < MIN_ALIAS_LENGTH || alias.len() > MAX_ALIAS_LENGTH {
        return Err(AppError::validation(
            "Custom alias must be 3-100 characters",
            json!({ "provided_length": alias.len() }),
        ));
    }

    if !alias.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::validation(
            "Custom alias can only contain letters and digits",
            json!({ "alias": alias }),
        ));
    }

    if RESERVED_ALIASES
        .iter()
        .any(|r| r.eq_ignore_ascii_case(alias))
    {
        return Err(AppError::validation(
            "This alias is reserved",
            json!({ "alias": alias }),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_alias_has_correct_length() {
        assert_eq!(generate_alias(GENERATED_ALIAS_LENGTH).len(), 6);
        assert_eq!(generate_alias(10).len(), 10);
    }

    #[test]
    fn test_generate_alias_alphanumeric() {
        let alias = generate_alias(64);
        assert!(alias.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_alias_mostly_unique() {
        let aliases: HashSet<String> = (0..1000).map(|_| generate_alias(6)).collect();
        // 62^6 possibilities; a handful of collisions at most.
        assert!(aliases.len() > 990);
    }

    #[test]
    fn test_validate_length_bounds() {
        assert!(validate_custom_alias("abc").is_ok());
        assert!(validate_custom_alias(&"a".repeat(100)).is_ok());

        let err = validate_custom_alias("ab").unwrap_err();
        assert!(err.to_string().contains("3-100 characters"));
        assert!(validate_custom_alias(&"a".repeat(101)).is_err());
        assert!(validate_custom_alias("").is_err());
    }

    #[test]
    fn test_validate_mixed_case_and_digits() {
        assert!(validate_custom_alias("MyLink2024").is_ok());
    }

    #[test]
    fn test_validate_rejects_symbols() {
        for alias in ["my-link", "my_link", "my link", "link@1", "ünï"] {
            let err = validate_custom_alias(alias).unwrap_err();
            assert!(
                matches!(err, AppError::Validation { .. }),
                "'{alias}' should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_all_reserved_aliases() {
        for &reserved in RESERVED_ALIASES {
            assert!(
                validate_custom_alias(reserved).is_err(),
                "Reserved alias '{}' should be invalid",
                reserved
            );
        }
        assert!(validate_custom_alias("HEALTH").is_err());
    }
}
