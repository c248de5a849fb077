// routes/invoices.rs
// Invoice CRUD, issuing and read-only views for one tenant.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::{ActivityAction, Invoice, InvoiceDraft, InvoiceSummary, Item, check_invoice_id};
use crate::recorder::invoice_metadata;
use crate::session::AuthUser;
use crate::state::{self, AppState};
use crate::validation::validate;

pub async fn create_invoice(
    State(st): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<String>,
    payload: Result<Json<InvoiceDraft>, JsonRejection>,
) -> Result<Response, AppError> {
    let owner = auth.owner(&user_id)?;
    let Json(draft) = payload?;
    validate(&draft)?;

    let invoice = Invoice::new(draft, Utc::now())?;
    let invoice = state::add_new_invoice(&st, owner, invoice).await?;
    st.recorder.record(
        owner,
        ActivityAction::CreateInvoice,
        invoice_metadata(&invoice.invoice_id),
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "invoice created",
            "invoice_id": invoice.invoice_id,
        })),
    )
        .into_response())
}

pub async fn get_invoice(
    State(st): State<Arc<AppState>>,
    auth: AuthUser,
    Path((user_id, invoice_id)): Path<(String, String)>,
) -> Result<Json<Invoice>, AppError> {
    let owner = auth.owner(&user_id)?;
    let invoice_id = check_invoice_id(&invoice_id)?;
    state::find_invoice(&st, owner, invoice_id).await.map(Json)
}

pub async fn list_invoices(
    State(st): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let owner = auth.owner(&user_id)?;
    state::find_all_invoices(&st, owner).await.map(Json)
}

pub async fn update_invoice(
    State(st): State<Arc<AppState>>,
    auth: AuthUser,
    Path((user_id, invoice_id)): Path<(String, String)>,
    payload: Result<Json<InvoiceDraft>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let owner = auth.owner(&user_id)?;
    let invoice_id = check_invoice_id(&invoice_id)?;
    let Json(draft) = payload?;
    validate(&draft)?;

    let invoice = state::update_before_due_date(&st, owner, invoice_id, draft).await?;
    st.recorder.record(
        owner,
        ActivityAction::UpdateInvoice,
        invoice_metadata(invoice_id),
    );
    Ok(Json(json!({ "message": "invoice updated", "invoice": invoice })))
}

pub async fn delete_invoice(
    State(st): State<Arc<AppState>>,
    auth: AuthUser,
    Path((user_id, invoice_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let owner = auth.owner(&user_id)?;
    let invoice_id = check_invoice_id(&invoice_id)?;
    state::delete_invoice(&st, owner, invoice_id).await?;
    st.recorder.record(
        owner,
        ActivityAction::DeleteInvoice,
        invoice_metadata(invoice_id),
    );
    Ok(Json(json!({ "message": "invoice deleted" })))
}

pub async fn invoice_stats(
    State(st): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<InvoiceSummary>, AppError> {
    let owner = auth.owner(&user_id)?;
    state::invoice_summary(&st, owner, Utc::now().date_naive())
        .await
        .map(Json)
}

/// Issues the invoice. A non-issuable status is reported, not rejected.
pub async fn send_invoice(
    State(st): State<Arc<AppState>>,
    auth: AuthUser,
    Path((user_id, invoice_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let owner = auth.owner(&user_id)?;
    let invoice_id = check_invoice_id(&invoice_id)?;
    let current = state::find_invoice(&st, owner, invoice_id).await?;

    let issued = state::update_status_to_issued(&st, owner, invoice_id).await?;
    if !issued {
        return Ok(Json(json!({
            "message": format!("invoice is {} and cannot be issued", current.status.as_str()),
            "issued": false,
        })));
    }
    st.recorder.record(
        owner,
        ActivityAction::IssueInvoice,
        invoice_metadata(invoice_id),
    );
    Ok(Json(json!({ "message": "invoice issued", "issued": true })))
}

pub async fn invoice_items(
    State(st): State<Arc<AppState>>,
    auth: AuthUser,
    Path((user_id, invoice_id)): Path<(String, String)>,
) -> Result<Json<Vec<Item>>, AppError> {
    let owner = auth.owner(&user_id)?;
    let invoice_id = check_invoice_id(&invoice_id)?;
    state::invoice_items(&st, owner, invoice_id).await.map(Json)
}

pub async fn ready_invoices(
    State(st): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let owner = auth.owner(&user_id)?;
    state::ready_to_issue(&st, owner, Utc::now().date_naive())
        .await
        .map(Json)
}
