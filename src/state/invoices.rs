use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::error::{AppError, persistence};
use crate::models::{Invoice, InvoiceDraft, InvoiceSummary, Item};
use crate::store::{StoreError, UnitOfWork, Write};

use super::AppState;

/// Look-ahead used by the ready-to-issue listing.
pub const READY_WINDOW_DAYS: u64 = 30;

fn invoice_not_found() -> AppError {
    AppError::NotFound("invoice not found".to_string())
}

fn invoice_locked() -> AppError {
    AppError::ImmutableInvoice(
        "invoice can no longer be edited: it has been issued or is past its issue or due date"
            .to_string(),
    )
}

/// Writes the invoice into the owner's embedded list and the standalone
/// collection in one transaction.
pub async fn add_new_invoice(
    state: &AppState,
    owner_id: &str,
    invoice: Invoice,
) -> Result<Invoice, AppError> {
    let work = UnitOfWork::new()
        .must(Write::PushEmbedded {
            owner_id: owner_id.to_string(),
            invoice: invoice.clone(),
        })
        .must(Write::InsertStandalone {
            invoice: invoice.clone(),
        });

    match state.deadline(state.store.commit(work)).await {
        Ok(_) => {
            info!(user_id = owner_id, invoice_id = %invoice.invoice_id, "invoice created");
            Ok(invoice)
        }
        Err(StoreError::NoMatch { .. }) => Err(AppError::NotFound("user not found".to_string())),
        Err(err) => Err(persistence("add invoice", err)),
    }
}

pub async fn find_invoice(
    state: &AppState,
    owner_id: &str,
    invoice_id: &str,
) -> Result<Invoice, AppError> {
    state
        .deadline(state.store.find_embedded_invoice(owner_id, invoice_id))
        .await
        .map_err(|err| persistence("find invoice", err))?
        .ok_or_else(invoice_not_found)
}

pub async fn find_all_invoices(state: &AppState, owner_id: &str) -> Result<Vec<Invoice>, AppError> {
    state
        .deadline(state.store.list_embedded_invoices(owner_id))
        .await
        .map_err(|err| persistence("list invoices", err))?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))
}

/// Replaces both copies of the invoice with the revision built from `draft`,
/// but only while its edit window is open.
pub async fn update_before_due_date(
    state: &AppState,
    owner_id: &str,
    invoice_id: &str,
    draft: InvoiceDraft,
) -> Result<Invoice, AppError> {
    let now = Utc::now();
    let current = find_invoice(state, owner_id, invoice_id).await?;
    if !current.edit_window_open(now) {
        return Err(invoice_locked());
    }
    let revised = current.revise(draft, now)?;

    let work = UnitOfWork::new()
        .must(Write::ReplaceEmbedded {
            owner_id: owner_id.to_string(),
            invoice: revised.clone(),
        })
        .must(Write::ReplaceStandalone {
            invoice: revised.clone(),
        });
    match state.deadline(state.store.commit(work)).await {
        Ok(_) => {
            info!(user_id = owner_id, invoice_id, "invoice updated");
            Ok(revised)
        }
        // Issued or deleted since the read above.
        Err(StoreError::NoMatch { .. }) => {
            find_invoice(state, owner_id, invoice_id).await?;
            Err(invoice_locked())
        }
        Err(err) => Err(persistence("update invoice", err)),
    }
}

/// Moves a draft, pending or overdue invoice to issued in both collections.
/// Any other status, or an invoice the owner does not hold, matches nothing
/// and the call is a no-op; the return value reports whether it changed.
pub async fn update_status_to_issued(
    state: &AppState,
    owner_id: &str,
    invoice_id: &str,
) -> Result<bool, AppError> {
    let issued_at = Utc::now();
    let work = UnitOfWork::new()
        .anchor(Write::MarkEmbeddedIssued {
            owner_id: owner_id.to_string(),
            invoice_id: invoice_id.to_string(),
            issued_at,
        })
        .may(Write::MarkStandaloneIssued {
            invoice_id: invoice_id.to_string(),
            issued_at,
        });
    let matched = state
        .deadline(state.store.commit(work))
        .await
        .map_err(|err| persistence("issue invoice", err))?;

    let issued = matched.first().copied().unwrap_or(0) > 0;
    if issued {
        info!(user_id = owner_id, invoice_id, "invoice issued");
    }
    Ok(issued)
}

/// Hard delete from both collections. Deleting an unknown id, or one held by
/// another owner, succeeds without touching anything.
pub async fn delete_invoice(state: &AppState, owner_id: &str, invoice_id: &str) -> Result<(), AppError> {
    let work = UnitOfWork::new()
        .anchor(Write::PullEmbedded {
            owner_id: owner_id.to_string(),
            invoice_id: invoice_id.to_string(),
        })
        .may(Write::DeleteStandalone {
            invoice_id: invoice_id.to_string(),
        });
    state
        .deadline(state.store.commit(work))
        .await
        .map_err(|err| persistence("delete invoice", err))?;
    info!(user_id = owner_id, invoice_id, "invoice deleted");
    Ok(())
}

pub async fn invoice_summary(
    state: &AppState,
    owner_id: &str,
    today: NaiveDate,
) -> Result<InvoiceSummary, AppError> {
    state
        .deadline(state.store.summarize_invoices(owner_id, today))
        .await
        .map_err(|err| persistence("summarize invoices", err))
}

pub async fn invoice_items(
    state: &AppState,
    owner_id: &str,
    invoice_id: &str,
) -> Result<Vec<Item>, AppError> {
    find_invoice(state, owner_id, invoice_id)
        .await
        .map(|invoice| invoice.items)
}

pub async fn ready_to_issue(
    state: &AppState,
    owner_id: &str,
    today: NaiveDate,
) -> Result<Vec<Invoice>, AppError> {
    let invoices = find_all_invoices(state, owner_id).await?;
    Ok(invoices
        .into_iter()
        .filter(|invoice| invoice.ready_to_issue(today, READY_WINDOW_DAYS))
        .collect())
}
