//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted player identifier.
pub const MAX_PLAYER_ID_LEN: usize = 64;

/// Validates that a player ID is 1 to 64 ASCII letters, digits, `-` or `_`.
///
/// # Examples
///
/// ```ignore
/// validate_player_id("665f1c2e9b1d4a0012ab34cd") // Ok
/// validate_player_id("")                         // Err - empty
/// validate_player_id("alice smith")              // Err - space
/// ```
pub fn validate_player_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_PLAYER_ID_LEN {
        let mut err = ValidationError::new("player_id_length");
        err.message = Some(
            format!(
                "Player ID must be between 1 and {MAX_PLAYER_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("player_id_format");
        err.message = Some("Player ID may only contain letters, digits, '-' and '_'".into());
        return Err(err);
    }

    Ok(())
}

/// Rejects names made only of whitespace.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("name_blank");
        err.message = Some("Name must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_player_id_valid() {
        assert!(validate_player_id("665f1c2e9b1d4a0012ab34cd").is_ok());
        assert!(validate_player_id("a").is_ok());
        assert!(validate_player_id("3f2a-11_b").is_ok());
    }

    #[test]
    fn test_validate_player_id_invalid_length() {
        assert!(validate_player_id("").is_err());
        assert!(validate_player_id(&"x".repeat(MAX_PLAYER_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_player_id_invalid_format() {
        assert!(validate_player_id("alice smith").is_err());
        assert!(validate_player_id("a/b").is_err());
        assert!(validate_player_id("ünï").is_err());
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("alice").is_ok());
        assert!(validate_display_name("   ").is_err());
    }
}
