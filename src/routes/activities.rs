// routes/activities.rs
// GET /api/invoice/{user_id}/activities?limit=N -> newest invoice activities first.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::Activity;
use crate::session::AuthUser;
use crate::state::{AppState, DEFAULT_ACTIVITY_LIMIT, MAX_ACTIVITY_LIMIT, invoice_activities};

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

pub async fn list_activities(
    State(st): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<String>,
    query: Result<Query<ActivityQuery>, QueryRejection>,
) -> Result<Json<Vec<Activity>>, AppError> {
    let owner = auth.owner(&user_id)?;
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    if !(1..=MAX_ACTIVITY_LIMIT).contains(&limit) {
        return Err(AppError::validation(format!(
            "limit must be between 1 and {MAX_ACTIVITY_LIMIT}"
        )));
    }
    invoice_activities(&st, owner, limit).await.map(Json)
}
