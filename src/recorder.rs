//! Best-effort activity trail.
//!
//! Handlers hand activities to a bounded queue drained by a single worker.
//! Nothing here ever blocks a request: a full or closed queue drops the
//! activity, and a failed insert is logged and forgotten.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::{Activity, ActivityAction};
use crate::store::{Store, StoreError};

#[derive(Clone)]
pub struct ActivityRecorder {
    tx: Sender<Activity>,
}

impl ActivityRecorder {
    /// Creates the queue without starting a worker.
    pub fn new(capacity: usize) -> (Self, Receiver<Activity>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ActivityRecorder { tx }, rx)
    }

    pub fn spawn(store: Arc<dyn Store>, capacity: usize, deadline: Duration) -> (Self, JoinHandle<()>) {
        let (recorder, rx) = Self::new(capacity);
        let worker = tokio::spawn(run(store, rx, deadline));
        (recorder, worker)
    }

    /// Returns whether the activity was queued.
    pub fn record(&self, user_id: &str, action: ActivityAction, metadata: Map<String, Value>) -> bool {
        match self.tx.try_send(Activity::new(user_id, action, metadata)) {
            Ok(()) => true,
            Err(TrySendError::Full(activity)) => {
                warn!(
                    user_id = %activity.user_id,
                    action = activity.action.as_str(),
                    "activity queue full, dropping activity"
                );
                false
            }
            Err(TrySendError::Closed(activity)) => {
                warn!(
                    user_id = %activity.user_id,
                    action = activity.action.as_str(),
                    "activity worker stopped, dropping activity"
                );
                false
            }
        }
    }
}

/// Drains the queue until every sender is gone.
pub async fn run(store: Arc<dyn Store>, mut rx: Receiver<Activity>, deadline: Duration) {
    while let Some(activity) = rx.recv().await {
        let action = activity.action.as_str();
        let user_id = activity.user_id.clone();
        let result = tokio::time::timeout(deadline, store.insert_activity(activity))
            .await
            .unwrap_or(Err(StoreError::Timeout));
        match result {
            Ok(()) => debug!(%user_id, action, "activity recorded"),
            Err(err) => warn!(%user_id, action, error = %err, "failed to record activity"),
        }
    }
    debug!("activity worker stopped");
}

/// Shorthand for the `{ "invoice_id": ... }` metadata most invoice activities carry.
pub fn invoice_metadata(invoice_id: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("invoice_id".to_string(), Value::String(invoice_id.to_string()));
    metadata
}
