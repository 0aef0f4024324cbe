//! Account-creation workflow.
//!
//! The account write and the event publish are deliberately not atomic: the
//! row is committed first, then the event is handed to the broker on a
//! best-effort basis. A failed publish is logged and counted but never
//! turns a successful registration into an error.

use filmnesia_core::error::CoreError;
use filmnesia_core::registration::RegistrationInput;
use filmnesia_db::models::user::{CreateUser, User};
use filmnesia_db::repositories::UserRepo;
use filmnesia_events::{PublishOutcome, UserRegisteredEvent};

use crate::auth::password::hash_password;
use crate::error::AppResult;
use crate::state::AppState;

/// Create an account and announce it.
///
/// Steps:
/// 1. Normalize and validate the input.
/// 2. Reject a taken username or email with [`CoreError::Conflict`].
/// 3. Hash the password and insert the row.
/// 4. Publish [`UserRegisteredEvent`] (best effort).
pub async fn register_user(state: &AppState, input: RegistrationInput) -> AppResult<User> {
    let input = input.into_validated()?;

    if UserRepo::find_by_username(&state.pool, &input.username)
        .await?
        .is_some()
    {
        return Err(CoreError::Conflict("Username is already taken".into()).into());
    }

    if UserRepo::find_by_email(&state.pool, &input.email)
        .await?
        .is_some()
    {
        return Err(CoreError::Conflict("Email is already registered".into()).into());
    }

    let password_hash = hash_password(&input.password)
        .map_err(|e| CoreError::Internal(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            username: input.username,
            email: input.email,
            password_hash,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    let event =
        UserRegisteredEvent::for_account(user.id, &user.email, &user.username, user.created_at);
    if state.notifier.publish(&event).await == PublishOutcome::Dropped {
        tracing::warn!(user_id = %user.id, "Registration succeeded without a UserRegistered event");
    }

    Ok(user)
}
