use crate::error::{AppError, persistence};
use crate::models::{Activity, ActivityAction};

use super::AppState;

pub const DEFAULT_ACTIVITY_LIMIT: i64 = 10;
pub const MAX_ACTIVITY_LIMIT: i64 = 100;

/// Most recent invoice activities (create, issue, update) of one user.
pub async fn invoice_activities(
    state: &AppState,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Activity>, AppError> {
    state
        .deadline(
            state
                .store
                .recent_activities(user_id, &ActivityAction::INVOICE_FEED, limit),
        )
        .await
        .map_err(|err| persistence("list activities", err))
}
