use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DomainError, check_email, new_invoice_id, require_text};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const MIN_ACCOUNT_NUMBER_LEN: usize = 11;
pub const MIN_ROUTING_NUMBER_LEN: usize = 7;

/// Invoice lifecycle states. Only draft/pending/overdue -> issued has a
/// producing transition; the remaining states exist for reporting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Pending,
    Overdue,
    Issued,
    Paid,
    Cancelled,
    Refunded,
}

impl InvoiceStatus {
    /// Source states accepted by the issue transition.
    pub const ISSUABLE: [InvoiceStatus; 3] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Pending,
        InvoiceStatus::Overdue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Refunded => "refunded",
        }
    }

    pub fn is_issuable(&self) -> bool {
        Self::ISSUABLE.contains(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
    #[serde(default)]
    pub total_price: f64,
}

impl Item {
    pub fn new(description: &str, quantity: i64, unit_price: f64) -> Result<Self, DomainError> {
        require_text(description, "item description")?;
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(DomainError::InvalidQuantity)?;
        if unit_price < 0.0 || !unit_price.is_finite() {
            return Err(DomainError::NegativeUnitPrice);
        }
        Ok(Item {
            description: description.trim().to_string(),
            quantity,
            unit_price,
            total_price: f64::from(quantity) * unit_price,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct PaymentInformation {
    #[validate(length(min = 1))]
    pub account_name: String,
    #[validate(length(min = 1))]
    pub account_number: String,
    #[validate(length(min = 1))]
    pub routing_number: String,
    #[validate(length(min = 1))]
    pub bank_name: String,
}

impl PaymentInformation {
    fn check(&self) -> Result<(), DomainError> {
        require_text(&self.account_name, "account name")?;
        if self.account_number.trim().len() < MIN_ACCOUNT_NUMBER_LEN {
            return Err(DomainError::TooShort {
                field: "account number",
                min: MIN_ACCOUNT_NUMBER_LEN,
            });
        }
        if self.routing_number.trim().len() < MIN_ROUTING_NUMBER_LEN {
            return Err(DomainError::TooShort {
                field: "routing number",
                min: MIN_ROUTING_NUMBER_LEN,
            });
        }
        require_text(&self.bank_name, "bank name")
    }
}

/// Contact block printed on an invoice for either party.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct ContactDetails {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub address: String,
}

pub type CustomerDetails = ContactDetails;
pub type SenderDetails = ContactDetails;

impl ContactDetails {
    fn check(&self, party: &'static str) -> Result<(), DomainError> {
        let invalid = |err: DomainError| DomainError::InvalidParty {
            party,
            reason: err.to_string(),
        };
        require_text(&self.name, "name").map_err(invalid)?;
        require_text(&self.phone, "phone").map_err(invalid)?;
        check_email(&self.email).map_err(invalid)?;
        require_text(&self.address, "address").map_err(invalid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ItemDraft {
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(range(min = 1))]
    pub quantity: i64,
    #[validate(range(min = 0.0))]
    pub unit_price: f64,
}

/// Caller-supplied invoice fields, used both for creation and for edits.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InvoiceDraft {
    #[validate(length(min = 1))]
    pub invoice_number: String,
    #[validate(length(min = 1))]
    pub billing_currency: String,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub discount: f64,
    #[validate(length(min = 1))]
    pub issue_date: String,
    #[validate(length(min = 1))]
    pub due_date: String,
    #[validate(length(min = 1), nested)]
    pub items: Vec<ItemDraft>,
    #[serde(default)]
    pub notes: String,
    #[validate(nested)]
    pub payment_info: PaymentInformation,
    #[validate(nested)]
    pub customer: CustomerDetails,
    #[validate(nested)]
    pub sender: SenderDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub invoice_id: String,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub billing_currency: String,
    pub items: Vec<Item>,
    pub discount: f64,
    pub total_amount_due: f64,
    #[serde(default)]
    pub notes: String,
    pub status: InvoiceStatus,
    pub payment_info: PaymentInformation,
    pub customer: CustomerDetails,
    pub sender: SenderDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Validates the draft against `now` and builds a fresh draft-status invoice
    /// with a newly generated id and a computed total.
    pub fn new(draft: InvoiceDraft, now: DateTime<Utc>) -> Result<Self, DomainError> {
        require_text(&draft.invoice_number, "invoice number")?;
        require_text(&draft.billing_currency, "billing currency")?;
        check_discount(draft.discount)?;
        if draft.items.is_empty() {
            return Err(DomainError::NoItems);
        }
        draft.customer.check("customer")?;
        draft.sender.check("sender")?;
        let items = draft
            .items
            .iter()
            .map(|item| Item::new(&item.description, item.quantity, item.unit_price))
            .collect::<Result<Vec<_>, _>>()?;
        let (issue_date, due_date) =
            check_dates(&draft.issue_date, &draft.due_date, now.date_naive())?;
        draft.payment_info.check()?;

        Ok(Invoice {
            invoice_id: new_invoice_id(),
            invoice_number: draft.invoice_number.trim().to_string(),
            issue_date,
            due_date,
            billing_currency: draft.billing_currency.trim().to_string(),
            total_amount_due: calculate_total(&items, draft.discount),
            items,
            discount: draft.discount,
            notes: draft.notes,
            status: InvoiceStatus::Draft,
            payment_info: draft.payment_info,
            customer: draft.customer,
            sender: draft.sender,
            created_at: now,
            updated_at: now,
            issued_at: None,
        })
    }

    /// Builds the replacement for this invoice from an edit, keeping identity,
    /// status and creation time.
    pub fn revise(&self, draft: InvoiceDraft, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let mut revised = Invoice::new(draft, now)?;
        revised.invoice_id = self.invoice_id.clone();
        revised.status = self.status;
        revised.created_at = self.created_at;
        revised.issued_at = self.issued_at;
        Ok(revised)
    }

    pub fn add_item(&mut self, item: Item, now: DateTime<Utc>) -> Result<(), DomainError> {
        let item = Item::new(&item.description, i64::from(item.quantity), item.unit_price)?;
        self.items.push(item);
        self.total_amount_due = calculate_total(&self.items, self.discount);
        self.updated_at = now;
        Ok(())
    }

    pub fn update_discount(&mut self, discount: f64, now: DateTime<Utc>) -> Result<(), DomainError> {
        check_discount(discount)?;
        self.discount = discount;
        self.total_amount_due = calculate_total(&self.items, self.discount);
        self.updated_at = now;
        Ok(())
    }

    pub fn update_payment_info(
        &mut self,
        payment_info: PaymentInformation,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        payment_info.check()?;
        self.payment_info = payment_info;
        self.updated_at = now;
        Ok(())
    }

    /// An invoice is editable only while it is pre-issue and `now` has reached
    /// neither the start of its issue date nor the start of its due date.
    /// The issue date itself is already too late.
    pub fn edit_window_open(&self, now: DateTime<Utc>) -> bool {
        let issue_start = self.issue_date.and_time(NaiveTime::MIN).and_utc();
        let due_start = self.due_date.and_time(NaiveTime::MIN).and_utc();
        self.status.is_issuable() && !(issue_start < now || now > due_start)
    }

    /// Ready to issue: pre-issue status and an issue date within `[today, today + days]`.
    pub fn ready_to_issue(&self, today: NaiveDate, days: u64) -> bool {
        let horizon = today
            .checked_add_days(chrono::Days::new(days))
            .unwrap_or(NaiveDate::MAX);
        self.status.is_issuable() && self.issue_date >= today && self.issue_date <= horizon
    }
}

pub fn calculate_total(items: &[Item], discount: f64) -> f64 {
    let subtotal: f64 = items
        .iter()
        .map(|item| f64::from(item.quantity) * item.unit_price)
        .sum();
    subtotal * (1.0 - discount / 100.0)
}

pub fn parse_date(raw: &str, field: &'static str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| DomainError::InvalidDate { field })
}

fn check_discount(discount: f64) -> Result<(), DomainError> {
    if !(0.0..=100.0).contains(&discount) {
        return Err(DomainError::DiscountOutOfRange);
    }
    Ok(())
}

fn check_dates(
    issue_raw: &str,
    due_raw: &str,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), DomainError> {
    let issue_date = parse_date(issue_raw, "issue date")?;
    let due_date = parse_date(due_raw, "due date")?;
    if today > issue_date {
        return Err(DomainError::IssueDateInPast);
    }
    if issue_date > due_date {
        return Err(DomainError::IssueAfterDue);
    }
    if today > due_date {
        return Err(DomainError::DueDateInPast);
    }
    Ok((issue_date, due_date))
}
