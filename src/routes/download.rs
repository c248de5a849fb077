// routes/download.rs
// GET /api/invoice/{user_id}/download/{invoice_id} -> the invoice as a PDF attachment.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{ActivityAction, Invoice, check_invoice_id};
use crate::recorder::invoice_metadata;
use crate::render::{
    RenderError, RenderedDocument, compile_pdf, invoice_source, schedule_cleanup,
};
use crate::session::AuthUser;
use crate::state::{AppState, find_invoice};

async fn render(invoice: &Invoice, config: &AppConfig) -> Result<RenderedDocument, RenderError> {
    let source = invoice_source(invoice)?;
    compile_pdf(&source, &config.typst_bin, &config.download_dir).await
}

pub async fn download_invoice(
    State(st): State<Arc<AppState>>,
    auth: AuthUser,
    Path((user_id, invoice_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let owner = auth.owner(&user_id)?;
    let invoice_id = check_invoice_id(&invoice_id)?;
    let invoice = find_invoice(&st, owner, invoice_id).await?;

    let config = &st.config;
    let document = render(&invoice, config).await.map_err(|err| {
        error!(invoice_id, error = %err, "invoice rendering failed");
        AppError::Internal("could not render the invoice".to_string())
    })?;

    let bytes = tokio::fs::read(&document.path).await;
    schedule_cleanup(document.dir, config.download_cleanup);
    let bytes = bytes.map_err(|err| {
        error!(invoice_id, error = %err, "rendered invoice unreadable");
        AppError::Internal("could not render the invoice".to_string())
    })?;

    st.recorder.record(
        owner,
        ActivityAction::DownloadInvoice,
        invoice_metadata(invoice_id),
    );

    let mut response = (StatusCode::OK, bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{invoice_id}.pdf\""))
    {
        headers.insert(CONTENT_DISPOSITION, value);
    }
    Ok(response)
}
