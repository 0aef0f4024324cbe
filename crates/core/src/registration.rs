//! Input rules for the account-creation workflow.
//!
//! [`RegistrationInput::normalized`] must run before validation so that
//! uniqueness checks and the published event see the same canonical
//! username and email that end up in the `users` table.

use std::fmt;

use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::error::CoreError;

/// Request body for `POST /api/v1/users/register`.
///
/// | Field      | Rule                              |
/// |------------|-----------------------------------|
/// | `username` | ASCII alphanumeric, 3-30 chars    |
/// | `email`    | syntactically valid address       |
/// | `password` | 6-72 chars                        |
#[derive(Clone, Deserialize, Validate)]
pub struct RegistrationInput {
    #[validate(
        length(min = 3, max = 30),
        custom(function = "validate_alphanumeric")
    )]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6, max = 72))]
    pub password: String,
}

/// The password never reaches logs.
impl fmt::Debug for RegistrationInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationInput")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl RegistrationInput {
    /// Trim the username, trim and lowercase the email. The password is
    /// left untouched.
    pub fn normalized(self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            password: self.password,
        }
    }

    /// Normalize and validate in one step.
    pub fn into_validated(self) -> Result<Self, CoreError> {
        let input = self.normalized();
        input
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        Ok(input)
    }
}

fn validate_alphanumeric(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(ValidationError::new("alphanumeric"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(username: &str, email: &str, password: &str) -> RegistrationInput {
        RegistrationInput {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn normalizes_username_and_email() {
        let normalized = input("  alice ", "  Alice@Example.COM ", " secret ").normalized();
        assert_eq!(normalized.username, "alice");
        assert_eq!(normalized.email, "alice@example.com");
        assert_eq!(normalized.password, " secret ");
    }

    #[test]
    fn accepts_valid_input() {
        let validated = input("alice", "a@example.com", "hunter22")
            .into_validated()
            .expect("input should be valid");
        assert_eq!(validated.username, "alice");
    }

    #[test]
    fn rejects_non_alphanumeric_username() {
        let err = input("al ice", "a@example.com", "hunter22")
            .into_validated()
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn rejects_short_username() {
        assert!(input("al", "a@example.com", "hunter22").into_validated().is_err());
    }

    #[test]
    fn rejects_invalid_email() {
        assert!(input("alice", "not-an-email", "hunter22").into_validated().is_err());
    }

    #[test]
    fn rejects_out_of_range_password() {
        assert!(input("alice", "a@example.com", "short").into_validated().is_err());
        let long = "x".repeat(73);
        assert!(input("alice", "a@example.com", &long).into_validated().is_err());
    }

    #[test]
    fn debug_output_redacts_password() {
        let printed = format!("{:?}", input("alice", "a@example.com", "hunter22"));
        assert!(printed.contains("alice"));
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("hunter22"));
    }

    #[test]
    fn whitespace_only_fields_fail_after_trimming() {
        assert!(input("   ", "a@example.com", "hunter22").into_validated().is_err());
        assert!(input("alice", "   ", "hunter22").into_validated().is_err());
    }
}
