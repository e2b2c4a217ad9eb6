//! Input validation for the add form
//!
//! Rules are checked in order and the first failure wins:
//! 1. both fields present after trimming
//! 2. email looks like `local@domain.tld`
//! 3. name uses letters, whitespace, hyphens and apostrophes only
//! 4. name is at most [`MAX_NAME_LEN`] characters

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::models::Subscriber;

/// Maximum subscriber name length, in characters
pub const MAX_NAME_LEN: usize = 50;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z\s'-]+$").expect("name pattern"));

/// Why a (name, email) pair was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Both name and email are required.")]
    MissingFields,

    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("Name can only contain letters, spaces, hyphens (-), and apostrophes (').")]
    InvalidName,

    #[error("Name is too long (max {MAX_NAME_LEN} characters).")]
    NameTooLong { len: usize },
}

/// Validate raw form input, returning a subscriber built from the trimmed values
pub fn validate(name: &str, email: &str) -> Result<Subscriber, ValidationError> {
    let name = name.trim();
    let email = email.trim();

    if name.is_empty() || email.is_empty() {
        return Err(ValidationError::MissingFields);
    }

    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }

    if !NAME_RE.is_match(name) {
        return Err(ValidationError::InvalidName);
    }

    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong { len });
    }

    Ok(Subscriber::new(name, email))
}
