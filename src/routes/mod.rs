// routes/mod.rs
// Router assembly plus the helpers shared by the handlers.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::password::PasswordError;
use crate::session;
use crate::state::AppState;

pub mod activities;
pub mod download;
pub mod home;
pub mod invoices;
pub mod login;
pub mod password;
pub mod register;

pub use activities::list_activities;
pub use download::download_invoice;
pub use home::home;
pub use invoices::{
    create_invoice, delete_invoice, get_invoice, invoice_items, invoice_stats, list_invoices,
    ready_invoices, send_invoice, update_invoice,
};
pub use login::login;
pub use password::reset_password;
pub use register::register;

pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/invoice/{user_id}/create", post(create_invoice))
        .route("/api/invoice/{user_id}/get/{invoice_id}", get(get_invoice))
        .route("/api/invoice/{user_id}/all", get(list_invoices))
        .route(
            "/api/invoice/{user_id}/update/{invoice_id}",
            put(update_invoice),
        )
        .route(
            "/api/invoice/{user_id}/delete/{invoice_id}",
            delete(delete_invoice),
        )
        .route("/api/invoice/{user_id}/stats", get(invoice_stats))
        .route("/api/invoice/{user_id}/send/{invoice_id}", post(send_invoice))
        .route(
            "/api/invoice/{user_id}/download/{invoice_id}",
            get(download_invoice),
        )
        .route("/api/invoice/{user_id}/activities", get(list_activities))
        .route("/api/invoice/{user_id}/items/{invoice_id}", get(invoice_items))
        .route("/api/invoice/{user_id}/ready", get(ready_invoices))
        .route("/api/password/reset", put(reset_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_bearer,
        ));

    Router::new()
        .route("/", get(home))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// bcrypt is CPU-bound, so it runs off the async workers.
pub(crate) async fn hash_password(state: &AppState, password: String) -> Result<String, AppError> {
    let hasher = state.hasher;
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|err| AppError::Internal(format!("password hashing task failed: {err}")))?
        .map_err(|err| match err {
            PasswordError::EmptyInput => AppError::validation(err.to_string()),
            other => AppError::Internal(other.to_string()),
        })
}

pub(crate) async fn verify_password(
    state: &AppState,
    hash: String,
    password: String,
) -> Result<(), PasswordError> {
    let hasher = state.hasher;
    tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
        .await
        .map_err(|err| PasswordError::Hashing(err.to_string()))?
}
