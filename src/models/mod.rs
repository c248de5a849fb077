// models module: domain entities shared by the store backends and the HTTP layer.

use mongodb::bson::oid::ObjectId;
use thiserror::Error;
use validator::ValidateEmail;

mod activity;
mod invoice;
mod summary;
mod user;

pub use activity::*;
pub use invoice::*;
pub use summary::*;
pub use user::*;

pub const INVOICE_ID_PREFIX: &str = "INV-";

/// Construction-time invariant violations for users and invoices.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    #[error("discount must be between 0 and 100")]
    DiscountOutOfRange,
    #[error("invoice must have at least one item")]
    NoItems,
    #[error("item quantity must be greater than 0")]
    InvalidQuantity,
    #[error("item unit price must be greater than or equal to 0")]
    NegativeUnitPrice,
    #[error("invalid {field} format: expected YYYY-MM-DD")]
    InvalidDate { field: &'static str },
    #[error("issue date cannot be in the past")]
    IssueDateInPast,
    #[error("issue date cannot be after due date")]
    IssueAfterDue,
    #[error("due date cannot be in the past")]
    DueDateInPast,
    #[error("invalid {party} details: {reason}")]
    InvalidParty { party: &'static str, reason: String },
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
    #[error("invalid email format")]
    InvalidEmail,
    #[error("invalid {0} identifier")]
    InvalidIdentifier(&'static str),
}

pub fn new_user_id() -> String {
    ObjectId::new().to_hex()
}

pub fn new_invoice_id() -> String {
    format!("{}{}", INVOICE_ID_PREFIX, ObjectId::new().to_hex())
}

/// Accepts only 24-hex object ids.
pub fn check_user_id(raw: &str) -> Result<&str, DomainError> {
    ObjectId::parse_str(raw)
        .map(|_| raw)
        .map_err(|_| DomainError::InvalidIdentifier("user"))
}

/// Accepts only `INV-<24 hex>` ids.
pub fn check_invoice_id(raw: &str) -> Result<&str, DomainError> {
    raw.strip_prefix(INVOICE_ID_PREFIX)
        .and_then(|hex| ObjectId::parse_str(hex).ok())
        .map(|_| raw)
        .ok_or(DomainError::InvalidIdentifier("invoice"))
}

/// Syntactic email check plus an alphabetic top-level domain of two or more letters.
pub(crate) fn check_email(email: &str) -> Result<(), DomainError> {
    let email = email.trim();
    let has_tld = email
        .rsplit_once('@')
        .and_then(|(_, domain)| domain.rsplit_once('.'))
        .is_some_and(|(_, tld)| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));
    if !has_tld || !email.validate_email() {
        return Err(DomainError::InvalidEmail);
    }
    Ok(())
}

pub(crate) fn require_text(value: &str, field: &'static str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        Err(DomainError::Empty(field))
    } else {
        Ok(())
    }
}
