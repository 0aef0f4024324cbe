//! Handlers for the `/users` resource.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use filmnesia_core::error::CoreError;
use filmnesia_core::registration::RegistrationInput;
use filmnesia_core::types::UserId;
use filmnesia_db::models::user::UserResponse;
use filmnesia_db::repositories::UserRepo;

use crate::error::AppResult;
use crate::registration::register_user;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/users/register
///
/// Create an account. Returns 201 with the new user; 409 if the username or
/// email is taken; 400 if the body is malformed or the input is invalid.
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegistrationInput>, JsonRejection>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    let Json(input) = body?;
    let user = register_user(&state, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UserResponse::from(&user),
        }),
    ))
}

/// GET /api/v1/users/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = UserRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "User",
            id: id.to_string(),
        })?;
    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}
