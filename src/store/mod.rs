//! Persistence backends.
//!
//! Invoices live in two places: embedded in the owning user's document and as a
//! standalone copy in the invoice collection. Every write that touches both goes
//! through a [`UnitOfWork`], which a backend applies all-or-nothing.

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::BoxFuture;
use thiserror::Error;

use crate::models::{Activity, ActivityAction, Invoice, InvoiceSummary, User};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("transaction aborted at step {step}: {reason}")]
    Aborted { step: usize, reason: String },
    #[error("step {step} of the unit of work matched no documents")]
    NoMatch { step: usize },
    #[error("database deadline exceeded")]
    Timeout,
}

/// A single write against either invoice representation.
#[derive(Debug, Clone)]
pub enum Write {
    PushEmbedded {
        owner_id: String,
        invoice: Invoice,
    },
    InsertStandalone {
        invoice: Invoice,
    },
    /// Only matches while the stored invoice is in an issuable status.
    ReplaceEmbedded {
        owner_id: String,
        invoice: Invoice,
    },
    /// Only matches while the stored invoice is in an issuable status.
    ReplaceStandalone {
        invoice: Invoice,
    },
    /// Only matches while the invoice is in an issuable status.
    MarkEmbeddedIssued {
        owner_id: String,
        invoice_id: String,
        issued_at: DateTime<Utc>,
    },
    /// Only matches while the invoice is in an issuable status.
    MarkStandaloneIssued {
        invoice_id: String,
        issued_at: DateTime<Utc>,
    },
    PullEmbedded {
        owner_id: String,
        invoice_id: String,
    },
    DeleteStandalone {
        invoice_id: String,
    },
}

/// What a step matching zero documents does to the rest of the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnZero {
    /// Abort the unit with [`StoreError::NoMatch`].
    Abort,
    /// Carry on with the next step.
    Continue,
    /// Skip every later step; earlier writes still commit.
    Stop,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub write: Write,
    pub on_zero: OnZero,
}

/// Ordered writes committed in one transaction.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    steps: Vec<Step>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(self, write: Write) -> Self {
        self.step(write, OnZero::Abort)
    }

    pub fn may(self, write: Write) -> Self {
        self.step(write, OnZero::Continue)
    }

    /// The rest of the unit only runs when this write matched something.
    /// Keys a standalone write to the owner's embedded copy.
    pub fn anchor(self, write: Write) -> Self {
        self.step(write, OnZero::Stop)
    }

    fn step(mut self, write: Write, on_zero: OnZero) -> Self {
        self.steps.push(Step { write, on_zero });
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

/// Storage operations used by the repositories.
///
/// Methods return boxed futures so the store can sit behind `Arc<dyn Store>`
/// in the shared application state.
pub trait Store: Send + Sync {
    fn find_user_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, StoreResult<Option<User>>>;

    fn insert_user<'a>(&'a self, user: &'a User) -> BoxFuture<'a, StoreResult<()>>;

    /// Returns the number of matched users.
    fn set_user_token<'a>(&'a self, user_id: &'a str, token: &'a str) -> BoxFuture<'a, StoreResult<u64>>;

    /// Returns the number of matched users.
    fn set_user_password<'a>(
        &'a self,
        email: &'a str,
        password_hash: &'a str,
    ) -> BoxFuture<'a, StoreResult<u64>>;

    fn find_embedded_invoice<'a>(
        &'a self,
        owner_id: &'a str,
        invoice_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Invoice>>>;

    fn find_standalone_invoice<'a>(
        &'a self,
        invoice_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Invoice>>>;

    /// `None` when the owner does not exist.
    fn list_embedded_invoices<'a>(
        &'a self,
        owner_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Vec<Invoice>>>>;

    fn summarize_invoices<'a>(
        &'a self,
        owner_id: &'a str,
        today: NaiveDate,
    ) -> BoxFuture<'a, StoreResult<InvoiceSummary>>;

    /// Applies every step or none. Returns the matched count per step; steps
    /// skipped after a zero-match anchor report zero.
    fn commit(&self, work: UnitOfWork) -> BoxFuture<'_, StoreResult<Vec<u64>>>;

    fn insert_activity(&self, activity: Activity) -> BoxFuture<'_, StoreResult<()>>;

    /// Newest first.
    fn recent_activities<'a>(
        &'a self,
        user_id: &'a str,
        actions: &'a [ActivityAction],
        limit: i64,
    ) -> BoxFuture<'a, StoreResult<Vec<Activity>>>;
}
