use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{RegisterRequest, ResetPasswordRequest};
use crate::error::{AuthError, FieldErrors};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;
pub const MIN_TOKEN_LEN: usize = 10;

const INVALID_EMAIL: &str = "Please provide a valid email address.";
const SHORT_PASSWORD: &str = "Password must be at least 6 characters.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are unique as stored, so only surrounding whitespace is removed.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_string()
}

#[derive(Debug)]
pub struct ValidRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub fn validate_registration(req: RegisterRequest) -> Result<ValidRegistration, AuthError> {
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);
    let mut errors = FieldErrors::new();

    if name.chars().count() < MIN_NAME_LEN {
        errors.add("name", "Name must be at least 2 characters.");
    }
    if !is_valid_email(&email) {
        errors.add("email", INVALID_EMAIL);
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", SHORT_PASSWORD);
    }
    errors.into_result()?;

    Ok(ValidRegistration {
        name,
        email,
        password: req.password,
    })
}

pub fn validate_email_field(email: &str) -> Result<String, AuthError> {
    let email = normalize_email(email);
    let mut errors = FieldErrors::new();
    if !is_valid_email(&email) {
        errors.add("email", INVALID_EMAIL);
    }
    errors.into_result()?;
    Ok(email)
}

pub fn validate_password_reset(req: &ResetPasswordRequest) -> Result<(), AuthError> {
    let mut errors = FieldErrors::new();
    if req.token.trim().len() < MIN_TOKEN_LEN {
        errors.add("token", "Invalid token.");
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", SHORT_PASSWORD);
    }
    if req.confirm_password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("confirm_password", "Please confirm your password.");
    } else if req.password != req.confirm_password {
        errors.add("confirm_password", "Passwords do not match.");
    }
    errors.into_result()
}

/// Login input that cannot match any account; reported as the generic
/// credential failure, never as a field error.
pub fn login_input_plausible(email: &str, password: &str) -> bool {
    is_valid_email(email) && password.chars().count() >= MIN_PASSWORD_LEN
}
