use super::ApiError;

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }

    let Some((local, domain)) = trimmed.split_once('@') else {
        return Err(ApiError::validation(format!("Invalid email: {trimmed}")));
    };

    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ApiError::validation(format!("Invalid email: {trimmed}")));
    }

    Ok(trimmed)
}

pub fn validate_password(password: &str) -> Result<&str, ApiError> {
    if password.len() < 8 {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }
    Ok(password)
}

pub fn validate_user_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid user ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_guild_name(name: &str) -> Result<&str, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Guild name is required"));
    }

    if trimmed.len() > 100 {
        return Err(ApiError::validation(
            "Guild name must be 100 characters or less",
        ));
    }

    Ok(trimmed)
}

pub fn validate_page(page: u64) -> Result<u64, ApiError> {
    if page == 0 {
        return Err(ApiError::validation("Page must be at least 1"));
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("jane@example.com").is_ok());
        assert_eq!(validate_email("  jane@example.com  ").unwrap(), "jane@example.com");
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("jane@").is_err());
        assert!(validate_email("jane@nodot").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("").is_err());
    }

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id(1).is_ok());
        assert!(validate_user_id(0).is_err());
        assert!(validate_user_id(-5).is_err());
    }

    #[test]
    fn test_validate_guild_name() {
        assert!(validate_guild_name("St. Cecilia Choir").is_ok());
        assert!(validate_guild_name("").is_err());
        assert!(validate_guild_name("   ").is_err());
        assert!(validate_guild_name(&"a".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_page() {
        assert!(validate_page(1).is_ok());
        assert!(validate_page(0).is_err());
    }
}
