use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable activity tags as stored in the activity collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ActivityAction {
    #[serde(rename = "user_created_account")]
    UserCreatedAccount,
    #[serde(rename = "user_logged_in")]
    UserLoggedIn,
    #[serde(rename = "user_updated_account")]
    UserUpdatedAccount,
    #[serde(rename = "user_deleted_account")]
    UserDeletedAccount,
    #[serde(rename = "create_invoice_activity")]
    CreateInvoice,
    #[serde(rename = "update_invoice_activity")]
    UpdateInvoice,
    #[serde(rename = "issue_invoice_activity")]
    IssueInvoice,
    #[serde(rename = "delete_invoice_activity")]
    DeleteInvoice,
    #[serde(rename = "download_invoice_activity")]
    DownloadInvoice,
    #[serde(rename = "invoice_reminder_activity")]
    InvoiceReminder,
    #[serde(rename = "payment_made_activity")]
    PaymentMade,
    #[serde(rename = "payment_failed_activity")]
    PaymentFailed,
    #[serde(rename = "invoice_paid_activity")]
    InvoicePaid,
    #[serde(rename = "invoice_cancelled_activity")]
    InvoiceCancelled,
    #[serde(rename = "invoice_refunded_activity")]
    InvoiceRefunded,
}

impl ActivityAction {
    /// Tags surfaced by the invoice activity feed.
    pub const INVOICE_FEED: [ActivityAction; 3] = [
        ActivityAction::CreateInvoice,
        ActivityAction::IssueInvoice,
        ActivityAction::UpdateInvoice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::UserCreatedAccount => "user_created_account",
            ActivityAction::UserLoggedIn => "user_logged_in",
            ActivityAction::UserUpdatedAccount => "user_updated_account",
            ActivityAction::UserDeletedAccount => "user_deleted_account",
            ActivityAction::CreateInvoice => "create_invoice_activity",
            ActivityAction::UpdateInvoice => "update_invoice_activity",
            ActivityAction::IssueInvoice => "issue_invoice_activity",
            ActivityAction::DeleteInvoice => "delete_invoice_activity",
            ActivityAction::DownloadInvoice => "download_invoice_activity",
            ActivityAction::InvoiceReminder => "invoice_reminder_activity",
            ActivityAction::PaymentMade => "payment_made_activity",
            ActivityAction::PaymentFailed => "payment_failed_activity",
            ActivityAction::InvoicePaid => "invoice_paid_activity",
            ActivityAction::InvoiceCancelled => "invoice_cancelled_activity",
            ActivityAction::InvoiceRefunded => "invoice_refunded_activity",
        }
    }
}

/// Append-only record of something a user did.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub user_id: String,
    pub action: ActivityAction,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Activity {
    pub fn new(user_id: impl Into<String>, action: ActivityAction, metadata: Map<String, Value>) -> Self {
        Activity {
            user_id: user_id.into(),
            action,
            timestamp: Utc::now(),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_serialize_to_their_stored_names() {
        for action in [
            ActivityAction::CreateInvoice,
            ActivityAction::IssueInvoice,
            ActivityAction::UserCreatedAccount,
            ActivityAction::InvoiceRefunded,
        ] {
            let json = serde_json::to_value(action).unwrap();
            assert_eq!(json, Value::String(action.as_str().to_string()));
        }
    }
}
