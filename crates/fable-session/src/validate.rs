//! Local input validation, run before anything is sent to the backend.

use crate::error::{Result, SessionError};

/// Minimum password length accepted locally.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Username length bounds.
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 30;

/// Check that an email address has a plausible shape.
///
/// This is a shape check only; the backend owns real verification.
pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(SessionError::validation("email", "Email is required"));
    }
    let invalid = || SessionError::validation("email", "Please enter a valid email address");

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    validate_password_field("password", password)
}

pub(crate) fn validate_password_field(field: &'static str, password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(SessionError::validation(field, "Password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(SessionError::validation(
            field,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

/// Usernames: 3 to 30 ASCII letters, digits or underscores.
pub fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if len < MIN_USERNAME_LEN || len > MAX_USERNAME_LEN {
        return Err(SessionError::validation(
            "username",
            format!(
                "Username must be between {} and {} characters",
                MIN_USERNAME_LEN, MAX_USERNAME_LEN
            ),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(SessionError::validation(
            "username",
            "Username may only contain letters, numbers and underscores",
        ));
    }
    Ok(())
}

/// Input for account registration.
#[derive(Debug, Clone, Default)]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub username: String,
    pub display_name: Option<String>,
}

impl RegisterData {
    /// Validate every field, reporting the first failure.
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        validate_username(&self.username)?;
        validate_password(&self.password)?;
        if self.password != self.confirm_password {
            return Err(SessionError::validation(
                "confirm_password",
                "Passwords do not match",
            ));
        }
        Ok(())
    }
}
