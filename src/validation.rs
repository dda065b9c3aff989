//! Input validation for user-submitted data.

/// Validates username format.
///
/// Requirements:
/// - 3-32 characters
/// - Alphanumeric characters plus underscore and hyphen
/// - Cannot start or end with underscore or hyphen
pub fn validate_username(name: &str) -> Result<(), String> {
    if name.len() < 3 {
        return Err("Username must be at least 3 characters long".to_string());
    }

    if name.len() > 32 {
        return Err("Username must not exceed 32 characters".to_string());
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(
            "Username can only contain alphanumeric characters, underscores, and hyphens"
                .to_string(),
        );
    }

    if name.starts_with('_') || name.starts_with('-') || name.ends_with('_') || name.ends_with('-')
    {
        return Err("Username cannot start or end with underscore or hyphen".to_string());
    }

    Ok(())
}

/// Validates email shape. Deliberately loose: one `@` with something on
/// both sides; deliverability is the mail server's problem.
pub fn validate_email(email: &str) -> Result<(), String> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Email address is not valid".to_string());
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err("Email address is not valid".to_string());
    }

    if email.len() > 254 {
        return Err("Email address must not exceed 254 characters".to_string());
    }

    Ok(())
}

/// Validates password strength: at least 8 characters.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if password.len() > 128 {
        return Err("Password must not exceed 128 characters".to_string());
    }

    Ok(())
}

/// Validates that a text body is non-empty after trimming.
pub fn validate_non_empty(value: &str, what: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{what} must not be empty"));
    }

    Ok(())
}
