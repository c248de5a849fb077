//! In-process store: all three collections behind one async mutex.
//!
//! A unit of work is applied to a scratch copy and swapped in only after every
//! step succeeded, so an abort leaves no partial state behind.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::models::{Activity, ActivityAction, Invoice, InvoiceStatus, InvoiceSummary, User};

use super::{OnZero, Store, StoreError, StoreResult, UnitOfWork, Write};

const NO_FAILURE: usize = usize::MAX;

#[derive(Debug, Clone)]
struct UserRecord {
    user: User,
    invoices: Vec<Invoice>,
}

#[derive(Debug, Clone, Default)]
struct Collections {
    users: BTreeMap<String, UserRecord>,
    invoices: BTreeMap<String, Invoice>,
    activities: Vec<Activity>,
}

impl Collections {
    fn embedded_mut(&mut self, owner_id: &str, invoice_id: &str) -> Option<&mut Invoice> {
        self.users
            .get_mut(owner_id)?
            .invoices
            .iter_mut()
            .find(|invoice| invoice.invoice_id == invoice_id)
    }

    fn apply(&mut self, write: Write) -> u64 {
        match write {
            Write::PushEmbedded { owner_id, invoice } => match self.users.get_mut(&owner_id) {
                Some(record) => {
                    record.invoices.push(invoice);
                    1
                }
                None => 0,
            },
            Write::InsertStandalone { invoice } => {
                self.invoices.insert(invoice.invoice_id.clone(), invoice);
                1
            }
            Write::ReplaceEmbedded { owner_id, invoice } => {
                replace_issuable(self.embedded_mut(&owner_id, &invoice.invoice_id), invoice)
            }
            Write::ReplaceStandalone { invoice } => {
                replace_issuable(self.invoices.get_mut(&invoice.invoice_id), invoice)
            }
            Write::MarkEmbeddedIssued {
                owner_id,
                invoice_id,
                issued_at,
            } => match self.embedded_mut(&owner_id, &invoice_id) {
                Some(invoice) => mark_issued(invoice, issued_at),
                None => 0,
            },
            Write::MarkStandaloneIssued {
                invoice_id,
                issued_at,
            } => match self.invoices.get_mut(&invoice_id) {
                Some(invoice) => mark_issued(invoice, issued_at),
                None => 0,
            },
            Write::PullEmbedded {
                owner_id,
                invoice_id,
            } => match self.users.get_mut(&owner_id) {
                Some(record) => {
                    let before = record.invoices.len();
                    record
                        .invoices
                        .retain(|invoice| invoice.invoice_id != invoice_id);
                    u64::from(record.invoices.len() != before)
                }
                None => 0,
            },
            Write::DeleteStandalone { invoice_id } => {
                u64::from(self.invoices.remove(&invoice_id).is_some())
            }
        }
    }
}

fn replace_issuable(slot: Option<&mut Invoice>, invoice: Invoice) -> u64 {
    match slot {
        Some(slot) if slot.status.is_issuable() => {
            *slot = invoice;
            1
        }
        _ => 0,
    }
}

fn mark_issued(invoice: &mut Invoice, issued_at: DateTime<Utc>) -> u64 {
    if !invoice.status.is_issuable() {
        return 0;
    }
    invoice.status = InvoiceStatus::Issued;
    invoice.issue_date = issued_at.date_naive();
    invoice.issued_at = Some(issued_at);
    invoice.updated_at = issued_at;
    1
}

#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<Mutex<Collections>>,
    fail_at: Arc<AtomicUsize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            data: Arc::new(Mutex::new(Collections::default())),
            fail_at: Arc::new(AtomicUsize::new(NO_FAILURE)),
        }
    }

    /// Makes the next committed unit of work fail when it reaches `step`
    /// (zero-based), as if that write had been rejected by the database.
    pub fn fail_at_step(&self, step: usize) {
        self.fail_at.store(step, Ordering::SeqCst);
    }

    pub async fn activity_count(&self) -> usize {
        self.data.lock().await.activities.len()
    }
}

impl Store for MemoryStore {
    fn find_user_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, StoreResult<Option<User>>> {
        Box::pin(async move {
            let data = self.data.lock().await;
            Ok(data
                .users
                .values()
                .find(|record| record.user.email == email)
                .map(|record| record.user.clone()))
        })
    }

    fn insert_user<'a>(&'a self, user: &'a User) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let mut data = self.data.lock().await;
            if data.users.contains_key(&user.id) {
                return Err(StoreError::Backend(format!("duplicate user id {}", user.id)));
            }
            data.users.insert(
                user.id.clone(),
                UserRecord {
                    user: user.clone(),
                    invoices: Vec::new(),
                },
            );
            Ok(())
        })
    }

    fn set_user_token<'a>(&'a self, user_id: &'a str, token: &'a str) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            let mut data = self.data.lock().await;
            Ok(match data.users.get_mut(user_id) {
                Some(record) => {
                    record.user.token = Some(token.to_string());
                    1
                }
                None => 0,
            })
        })
    }

    fn set_user_password<'a>(
        &'a self,
        email: &'a str,
        password_hash: &'a str,
    ) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            let mut data = self.data.lock().await;
            Ok(
                match data.users.values_mut().find(|record| record.user.email == email) {
                    Some(record) => {
                        record.user.password = password_hash.to_string();
                        record.user.updated_at = Utc::now();
                        1
                    }
                    None => 0,
                },
            )
        })
    }

    fn find_embedded_invoice<'a>(
        &'a self,
        owner_id: &'a str,
        invoice_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Invoice>>> {
        Box::pin(async move {
            let data = self.data.lock().await;
            Ok(data.users.get(owner_id).and_then(|record| {
                record
                    .invoices
                    .iter()
                    .find(|invoice| invoice.invoice_id == invoice_id)
                    .cloned()
            }))
        })
    }

    fn find_standalone_invoice<'a>(
        &'a self,
        invoice_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Invoice>>> {
        Box::pin(async move { Ok(self.data.lock().await.invoices.get(invoice_id).cloned()) })
    }

    fn list_embedded_invoices<'a>(
        &'a self,
        owner_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Vec<Invoice>>>> {
        Box::pin(async move {
            let data = self.data.lock().await;
            Ok(data.users.get(owner_id).map(|record| record.invoices.clone()))
        })
    }

    fn summarize_invoices<'a>(
        &'a self,
        owner_id: &'a str,
        today: NaiveDate,
    ) -> BoxFuture<'a, StoreResult<InvoiceSummary>> {
        Box::pin(async move {
            let data = self.data.lock().await;
            Ok(match data.users.get(owner_id) {
                Some(record) => InvoiceSummary::from_invoices(&record.invoices, today),
                None => InvoiceSummary::default(),
            })
        })
    }

    fn commit(&self, work: UnitOfWork) -> BoxFuture<'_, StoreResult<Vec<u64>>> {
        Box::pin(async move {
            let fail_at = self.fail_at.swap(NO_FAILURE, Ordering::SeqCst);
            let mut data = self.data.lock().await;
            let mut scratch = data.clone();
            let total = work.len();
            let mut matched = Vec::with_capacity(total);

            for (index, step) in work.into_steps().into_iter().enumerate() {
                if index == fail_at {
                    return Err(StoreError::Aborted {
                        step: index,
                        reason: "injected write failure".to_string(),
                    });
                }
                let count = scratch.apply(step.write);
                matched.push(count);
                if count == 0 {
                    match step.on_zero {
                        OnZero::Abort => return Err(StoreError::NoMatch { step: index }),
                        OnZero::Stop => break,
                        OnZero::Continue => {}
                    }
                }
            }
            matched.resize(total, 0);

            *data = scratch;
            Ok(matched)
        })
    }

    fn insert_activity(&self, activity: Activity) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.data.lock().await.activities.push(activity);
            Ok(())
        })
    }

    fn recent_activities<'a>(
        &'a self,
        user_id: &'a str,
        actions: &'a [ActivityAction],
        limit: i64,
    ) -> BoxFuture<'a, StoreResult<Vec<Activity>>> {
        Box::pin(async move {
            let data = self.data.lock().await;
            let mut found: Vec<Activity> = data
                .activities
                .iter()
                .filter(|activity| activity.user_id == user_id && actions.contains(&activity.action))
                .cloned()
                .collect();
            found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            found.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
            Ok(found)
        })
    }
}
