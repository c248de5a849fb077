// routes/login.rs
// POST /api/login { "email": "...", "password": "..." } -> bearer token in the
// Authorization header, a cookie and the body.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{
        HeaderValue, StatusCode,
        header::{AUTHORIZATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Map, json};
use tracing::info;
use validator::Validate;

use crate::error::AppError;
use crate::models::ActivityAction;
use crate::routes::verify_password;
use crate::state::{AppState, save_token, verify_login};
use crate::token::TOKEN_TTL_HOURS;
use crate::validation::validate;

pub const TOKEN_COOKIE_NAME: &str = "token";

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

fn invalid_login() -> AppError {
    AppError::Unauthorized("invalid login details".to_string())
}

pub async fn login(
    State(st): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;
    validate(&body)?;

    let user = match verify_login(&st, &body.email).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => return Err(invalid_login()),
        Err(err) => return Err(err),
    };
    verify_password(&st, user.password.clone(), body.password)
        .await
        .map_err(|_| invalid_login())?;

    let token = st
        .tokens
        .issue(&user.id, &user.email)
        .map_err(|err| AppError::Internal(err.to_string()))?;
    save_token(&st, &user.id, &token).await?;
    info!(user_id = %user.id, "user logged in");
    st.recorder
        .record(&user.id, ActivityAction::UserLoggedIn, Map::new());

    let mut response = (
        StatusCode::OK,
        Json(json!({
            "message": "login successful",
            "user_id": user.id,
            "token": token,
        })),
    )
        .into_response();
    set_token_headers(&mut response, &token);
    Ok(response)
}

fn set_token_headers(response: &mut Response, token: &str) {
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
        response.headers_mut().insert(AUTHORIZATION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        TOKEN_COOKIE_NAME,
        token,
        TOKEN_TTL_HOURS * 3600
    )) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}
