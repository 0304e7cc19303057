//! Field rules shared by the request bodies.

use std::borrow::Cow;

use validator::ValidationError;

const PASSWORD_SPECIALS: &str = "!@#$%^&*(),.?\":{}|<>";

pub fn person_name(name: &str) -> Result<(), ValidationError> {
    if name.chars().all(|c| c.is_ascii_alphabetic() || c == ' ') {
        Ok(())
    } else {
        Err(invalid("name", "Name can only contain letters and spaces"))
    }
}

/// Upper, lower, digit and one of `PASSWORD_SPECIALS`. Length is checked separately.
pub fn strong_password(password: &str) -> Result<(), ValidationError> {
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));

    if has_upper && has_lower && has_digit && has_special {
        Ok(())
    } else {
        Err(invalid(
            "password",
            "Password must contain at least one uppercase letter, one lowercase letter, one number and one special character",
        ))
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}
