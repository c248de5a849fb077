use chrono::{DateTime, NaiveDate, Utc};
use futures::future::BoxFuture;
use futures::stream::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::MongoConfig;
use crate::models::{
    Activity, ActivityAction, DATE_FORMAT, Invoice, InvoiceStatus, InvoiceSummary, User,
};

use super::{OnZero, Store, StoreError, StoreResult, UnitOfWork, Write};

const USERS: &str = "users";
const INVOICES: &str = "invoices";
const ACTIVITIES: &str = "activities";

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(err: bson::ser::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(err: bson::de::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Projection of the embedded invoice array of a user document.
#[derive(Debug, Deserialize)]
struct EmbeddedInvoices {
    #[serde(default)]
    invoices: Vec<Invoice>,
}

/// Activities keep a native BSON date so the feed can sort on it.
#[derive(Debug, Serialize, Deserialize)]
struct ActivityDoc {
    user_id: String,
    action: ActivityAction,
    timestamp: bson::DateTime,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl From<Activity> for ActivityDoc {
    fn from(activity: Activity) -> Self {
        ActivityDoc {
            user_id: activity.user_id,
            action: activity.action,
            timestamp: bson::DateTime::from_chrono(activity.timestamp),
            metadata: activity.metadata,
        }
    }
}

impl From<ActivityDoc> for Activity {
    fn from(doc: ActivityDoc) -> Self {
        Activity {
            user_id: doc.user_id,
            action: doc.action,
            timestamp: doc.timestamp.to_chrono(),
            metadata: doc.metadata,
        }
    }
}

#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    users: Collection<Document>,
    invoices: Collection<Invoice>,
    activities: Collection<ActivityDoc>,
}

impl MongoStore {
    /// Connects with the configured pool, pinging until the server answers or
    /// the attempts run out, then makes sure the collections and indexes exist.
    pub async fn connect(config: &MongoConfig) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.app_name = Some("invoicedesk".to_string());
        options.max_pool_size = Some(config.pool.max_pool_size);
        options.min_pool_size = Some(config.pool.min_pool_size);
        options.max_idle_time = Some(config.pool.max_idle_time);
        let client = Client::with_options(options)?;
        let db = client.database(&config.database);

        let attempts = config.connect_attempts.max(1);
        let mut attempt = 1;
        loop {
            match db.run_command(doc! { "ping": 1 }).await {
                Ok(_) => break,
                Err(err) if attempt < attempts => {
                    warn!(attempt, error = %err, "mongodb not reachable yet, retrying");
                    tokio::time::sleep(config.retry_delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
        info!(database = %config.database, "connected to mongodb");

        ensure_collections(&db).await?;
        Ok(MongoStore {
            users: db.collection(USERS),
            invoices: db.collection(INVOICES),
            activities: db.collection(ACTIVITIES),
            client,
        })
    }

    async fn apply(&self, session: &mut ClientSession, write: Write) -> mongodb::error::Result<u64> {
        let count = match write {
            Write::PushEmbedded { owner_id, invoice } => {
                self.users
                    .update_one(
                        doc! { "_id": owner_id },
                        doc! { "$push": { "invoices": invoice_bson(&invoice)? } },
                    )
                    .session(&mut *session)
                    .await?
                    .matched_count
            }
            Write::InsertStandalone { invoice } => {
                self.invoices.insert_one(&invoice).session(&mut *session).await?;
                1
            }
            Write::ReplaceEmbedded { owner_id, invoice } => {
                self.users
                    .update_one(
                        doc! {
                            "_id": owner_id,
                            "invoices": { "$elemMatch": {
                                "invoice_id": &invoice.invoice_id,
                                "status": { "$in": issuable_statuses() },
                            }},
                        },
                        doc! { "$set": { "invoices.$": invoice_bson(&invoice)? } },
                    )
                    .session(&mut *session)
                    .await?
                    .matched_count
            }
            Write::ReplaceStandalone { invoice } => {
                self.invoices
                    .replace_one(
                        doc! {
                            "invoice_id": &invoice.invoice_id,
                            "status": { "$in": issuable_statuses() },
                        },
                        &invoice,
                    )
                    .session(&mut *session)
                    .await?
                    .matched_count
            }
            Write::MarkEmbeddedIssued {
                owner_id,
                invoice_id,
                issued_at,
            } => {
                self.users
                    .update_one(
                        doc! {
                            "_id": owner_id,
                            "invoices": { "$elemMatch": {
                                "invoice_id": invoice_id,
                                "status": { "$in": issuable_statuses() },
                            }},
                        },
                        doc! { "$set": issued_fields("invoices.$.", issued_at)? },
                    )
                    .session(&mut *session)
                    .await?
                    .matched_count
            }
            Write::MarkStandaloneIssued {
                invoice_id,
                issued_at,
            } => {
                self.invoices
                    .update_one(
                        doc! {
                            "invoice_id": invoice_id,
                            "status": { "$in": issuable_statuses() },
                        },
                        doc! { "$set": issued_fields("", issued_at)? },
                    )
                    .session(&mut *session)
                    .await?
                    .matched_count
            }
            Write::PullEmbedded {
                owner_id,
                invoice_id,
            } => {
                self.users
                    .update_one(
                        doc! { "_id": owner_id },
                        doc! { "$pull": { "invoices": { "invoice_id": invoice_id } } },
                    )
                    .session(&mut *session)
                    .await?
                    .modified_count
            }
            Write::DeleteStandalone { invoice_id } => {
                self.invoices
                    .delete_one(doc! { "invoice_id": invoice_id })
                    .session(&mut *session)
                    .await?
                    .deleted_count
            }
        };
        Ok(count)
    }

    async fn run_steps(&self, session: &mut ClientSession, work: UnitOfWork) -> StoreResult<Vec<u64>> {
        let total = work.len();
        let mut matched = Vec::with_capacity(total);
        for (index, step) in work.into_steps().into_iter().enumerate() {
            let count = self
                .apply(session, step.write)
                .await
                .map_err(|err| StoreError::Aborted {
                    step: index,
                    reason: err.to_string(),
                })?;
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
        Ok(matched)
    }
}

async fn ensure_collections(db: &Database) -> StoreResult<()> {
    let existing = db.list_collection_names().await?;
    for name in [USERS, INVOICES, ACTIVITIES] {
        if !existing.iter().any(|found| found == name) {
            db.create_collection(name).await?;
        }
    }

    // Plain lookup index: sign-up stays check-then-insert.
    db.collection::<Document>(USERS)
        .create_index(IndexModel::builder().keys(doc! { "email": 1 }).build())
        .await?;
    db.collection::<Document>(INVOICES)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "invoice_id": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("invoice_id_unique".to_string())
                        .build(),
                )
                .build(),
        )
        .await?;
    db.collection::<Document>(ACTIVITIES)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user_id": 1, "timestamp": -1 })
                .build(),
        )
        .await?;
    Ok(())
}

fn invoice_bson(invoice: &Invoice) -> mongodb::error::Result<Bson> {
    Ok(bson::to_bson(invoice)?)
}

fn issuable_statuses() -> Vec<&'static str> {
    InvoiceStatus::ISSUABLE.iter().map(InvoiceStatus::as_str).collect()
}

fn issued_fields(prefix: &str, issued_at: DateTime<Utc>) -> mongodb::error::Result<Document> {
    let stamp = bson::to_bson(&issued_at)?;
    let mut fields = Document::new();
    fields.insert(format!("{prefix}status"), InvoiceStatus::Issued.as_str());
    fields.insert(
        format!("{prefix}issue_date"),
        issued_at.date_naive().format(DATE_FORMAT).to_string(),
    );
    fields.insert(format!("{prefix}issued_at"), stamp.clone());
    fields.insert(format!("{prefix}updated_at"), stamp);
    Ok(fields)
}

fn number(doc: &Document, key: &str) -> f64 {
    match doc.get(key) {
        Some(Bson::Double(value)) => *value,
        Some(Bson::Int32(value)) => f64::from(*value),
        Some(Bson::Int64(value)) => *value as f64,
        _ => 0.0,
    }
}

impl Store for MongoStore {
    fn find_user_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, StoreResult<Option<User>>> {
        Box::pin(async move {
            let found = self
                .users
                .find_one(doc! { "email": email })
                .projection(doc! { "invoices": 0 })
                .await?;
            Ok(found.map(bson::from_document::<User>).transpose()?)
        })
    }

    fn insert_user<'a>(&'a self, user: &'a User) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let mut document = bson::to_document(user)?;
            document.insert("invoices", Bson::Array(Vec::new()));
            self.users.insert_one(document).await?;
            Ok(())
        })
    }

    fn set_user_token<'a>(&'a self, user_id: &'a str, token: &'a str) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            let result = self
                .users
                .update_one(doc! { "_id": user_id }, doc! { "$set": { "token": token } })
                .await?;
            Ok(result.matched_count)
        })
    }

    fn set_user_password<'a>(
        &'a self,
        email: &'a str,
        password_hash: &'a str,
    ) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            let updated_at = bson::to_bson(&Utc::now())?;
            let result = self
                .users
                .update_one(
                    doc! { "email": email },
                    doc! { "$set": { "password": password_hash, "updated_at": updated_at } },
                )
                .await?;
            Ok(result.matched_count)
        })
    }

    fn find_embedded_invoice<'a>(
        &'a self,
        owner_id: &'a str,
        invoice_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Invoice>>> {
        Box::pin(async move {
            let found = self
                .users
                .clone_with_type::<EmbeddedInvoices>()
                .find_one(doc! { "_id": owner_id, "invoices.invoice_id": invoice_id })
                .projection(doc! { "invoices.$": 1 })
                .await?;
            Ok(found.and_then(|embedded| embedded.invoices.into_iter().next()))
        })
    }

    fn find_standalone_invoice<'a>(
        &'a self,
        invoice_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Invoice>>> {
        Box::pin(async move {
            Ok(self
                .invoices
                .find_one(doc! { "invoice_id": invoice_id })
                .await?)
        })
    }

    fn list_embedded_invoices<'a>(
        &'a self,
        owner_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Vec<Invoice>>>> {
        Box::pin(async move {
            let found = self
                .users
                .clone_with_type::<EmbeddedInvoices>()
                .find_one(doc! { "_id": owner_id })
                .projection(doc! { "invoices": 1 })
                .await?;
            Ok(found.map(|embedded| embedded.invoices))
        })
    }

    fn summarize_invoices<'a>(
        &'a self,
        owner_id: &'a str,
        today: NaiveDate,
    ) -> BoxFuture<'a, StoreResult<InvoiceSummary>> {
        Box::pin(async move {
            let today = today.format(DATE_FORMAT).to_string();
            // The paid filter runs before grouping, so only total_paid can be non-zero.
            let pipeline = vec![
                doc! { "$match": { "_id": owner_id } },
                doc! { "$unwind": "$invoices" },
                doc! { "$match": { "invoices.status": InvoiceStatus::Paid.as_str() } },
                doc! { "$group": {
                    "_id": Bson::Null,
                    "total_paid": { "$sum": "$invoices.total_amount_due" },
                    "total_overdue": { "$sum": { "$cond": [
                        { "$and": [
                            { "$eq": ["$invoices.status", InvoiceStatus::Overdue.as_str()] },
                            { "$lt": ["$invoices.due_date", today] },
                        ]},
                        "$invoices.total_amount_due",
                        0,
                    ]}},
                    "total_draft": { "$sum": { "$cond": [
                        { "$eq": ["$invoices.status", InvoiceStatus::Draft.as_str()] },
                        "$invoices.total_amount_due",
                        0,
                    ]}},
                }},
            ];

            let mut cursor = self.users.aggregate(pipeline).await?;
            let mut summary = InvoiceSummary::default();
            if let Some(group) = cursor.try_next().await? {
                summary.total_paid = number(&group, "total_paid");
                summary.total_overdue = number(&group, "total_overdue");
                summary.total_draft = number(&group, "total_draft");
            }
            Ok(summary)
        })
    }

    fn commit(&self, work: UnitOfWork) -> BoxFuture<'_, StoreResult<Vec<u64>>> {
        Box::pin(async move {
            let mut session = self.client.start_session().await?;
            session.start_transaction().await?;

            match self.run_steps(&mut session, work).await {
                Ok(matched) => {
                    session.commit_transaction().await.map_err(|err| StoreError::Aborted {
                        step: matched.len(),
                        reason: err.to_string(),
                    })?;
                    Ok(matched)
                }
                Err(err) => {
                    if let Err(abort_err) = session.abort_transaction().await {
                        warn!(error = %abort_err, "failed to abort transaction");
                    }
                    Err(err)
                }
            }
        })
    }

    fn insert_activity(&self, activity: Activity) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.activities.insert_one(ActivityDoc::from(activity)).await?;
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
            let tags: Vec<&str> = actions.iter().map(ActivityAction::as_str).collect();
            let cursor = self
                .activities
                .find(doc! { "user_id": user_id, "action": { "$in": tags } })
                .sort(doc! { "timestamp": -1 })
                .limit(limit)
                .await?;
            let docs: Vec<ActivityDoc> = cursor.try_collect().await?;
            Ok(docs.into_iter().map(Activity::from).collect())
        })
    }
}
