//! Validation helpers for DTOs.

use validator::ValidationError;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;

/// Validates a login name: 3 to 32 ASCII letters, digits, `_`, `-` or `.`.
///
/// # Examples
///
/// ```ignore
/// validate_username("alice_01") // Ok
/// validate_username("al")       // Err - too short
/// validate_username("al ice")   // Err - space
/// ```
pub fn validate_username(name: &str) -> Result<(), ValidationError> {
    let len = name.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!("Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters (got {len})")
                .into(),
        );
        return Err(err);
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        let mut err = ValidationError::new("username_format");
        err.message = Some("Username may only contain letters, digits, '_', '-' and '.'".into());
        return Err(err);
    }

    Ok(())
}
