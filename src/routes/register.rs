// routes/register.rs
// POST /api/register -> creates a user account.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, json};
use validator::Validate;

use crate::error::AppError;
use crate::models::{ActivityAction, User, UserResponse};
use crate::routes::hash_password;
use crate::state::{AppState, add_user};
use crate::validation::validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 20))]
    pub password: String,
    #[validate(length(min = 1))]
    pub phone_number: String,
}

pub async fn register(
    State(st): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;
    validate(&body)?;

    let password_hash = hash_password(&st, body.password).await?;
    let user = User::new(
        &body.first_name,
        &body.last_name,
        &body.email,
        &password_hash,
        &body.phone_number,
        Utc::now(),
    )?;

    let stored = add_user(&st, user.clone()).await?;
    if stored.id != user.id {
        return Err(AppError::Conflict("user already exists".to_string()));
    }

    st.recorder
        .record(&stored.id, ActivityAction::UserCreatedAccount, Map::new());
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "account created",
            "user": UserResponse::from(&stored),
        })),
    )
        .into_response())
}
