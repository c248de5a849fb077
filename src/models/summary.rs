use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Invoice, InvoiceStatus};

/// Per-user invoice aggregate, computed on demand and never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub total_paid: f64,
    pub total_overdue: f64,
    pub total_draft: f64,
    pub total_unpaid: f64,
}

impl InvoiceSummary {
    /// Mirrors the stats grouping: invoices are narrowed to `paid` before any
    /// bucket is summed, so the overdue and draft buckets can only ever be zero
    /// and `total_unpaid` is never accumulated. Kept as-is pending a product
    /// decision on the intended buckets.
    pub fn from_invoices<'a>(
        invoices: impl IntoIterator<Item = &'a Invoice>,
        today: NaiveDate,
    ) -> Self {
        let mut summary = InvoiceSummary::default();
        for invoice in invoices
            .into_iter()
            .filter(|invoice| invoice.status == InvoiceStatus::Paid)
        {
            summary.total_paid += invoice.total_amount_due;
            if invoice.status == InvoiceStatus::Overdue && invoice.due_date < today {
                summary.total_overdue += invoice.total_amount_due;
            }
            if invoice.status == InvoiceStatus::Draft {
                summary.total_draft += invoice.total_amount_due;
            }
        }
        summary
    }
}
