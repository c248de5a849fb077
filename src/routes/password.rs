// routes/password.rs
// PUT /api/password/reset -> replaces the caller's password.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use validator::Validate;

use crate::error::AppError;
use crate::models::{ActivityAction, normalize_email};
use crate::routes::hash_password;
use crate::session::AuthUser;
use crate::state::{AppState, update_password};
use crate::validation::validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 20))]
    pub password: String,
    #[validate(length(min = 1))]
    pub confirm_password: String,
}

pub async fn reset_password(
    State(st): State<Arc<AppState>>,
    auth: AuthUser,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = payload?;
    validate(&body)?;
    if normalize_email(&body.email) != normalize_email(auth.email()) {
        return Err(AppError::Unauthorized(
            "you can only reset your own password".to_string(),
        ));
    }
    if body.password != body.confirm_password {
        return Err(AppError::validation("passwords do not match"));
    }

    let password_hash = hash_password(&st, body.password).await?;
    update_password(&st, &body.email, &password_hash).await?;
    st.recorder
        .record(auth.user_id(), ActivityAction::UserUpdatedAccount, Map::new());
    Ok(Json(json!({ "message": "password updated" })))
}
