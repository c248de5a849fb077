use tracing::info;

use crate::error::{AppError, persistence};
use crate::models::{User, normalize_email};

use super::AppState;

/// Inserts `user` unless the email is already taken, in which case the
/// existing user is returned untouched. Callers detect duplicates by
/// comparing ids. Two concurrent sign-ups can both pass the check.
pub async fn add_user(state: &AppState, user: User) -> Result<User, AppError> {
    if let Some(existing) = state
        .deadline(state.store.find_user_by_email(&user.email))
        .await
        .map_err(|err| persistence("find user", err))?
    {
        return Ok(existing);
    }

    state
        .deadline(state.store.insert_user(&user))
        .await
        .map_err(|err| persistence("insert user", err))?;
    info!(user_id = %user.id, "user created");
    Ok(user)
}

/// Returns the stored credential record; the password check is the caller's.
pub async fn verify_login(state: &AppState, email: &str) -> Result<User, AppError> {
    let email = normalize_email(email);
    state
        .deadline(state.store.find_user_by_email(&email))
        .await
        .map_err(|err| persistence("find user", err))?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))
}

pub async fn save_token(state: &AppState, user_id: &str, token: &str) -> Result<(), AppError> {
    let matched = state
        .deadline(state.store.set_user_token(user_id, token))
        .await
        .map_err(|err| persistence("save token", err))?;
    if matched == 0 {
        return Err(AppError::NotFound("user not found".to_string()));
    }
    Ok(())
}

pub async fn update_password(
    state: &AppState,
    email: &str,
    password_hash: &str,
) -> Result<(), AppError> {
    let email = normalize_email(email);
    let matched = state
        .deadline(state.store.set_user_password(&email, password_hash))
        .await
        .map_err(|err| persistence("update password", err))?;
    if matched == 0 {
        return Err(AppError::NotFound("user not found".to_string()));
    }
    info!("password updated");
    Ok(())
}
