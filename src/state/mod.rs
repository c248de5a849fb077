// state module: AppState, initialization, and re-exports of the repositories.

use std::{future::Future, sync::Arc};

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{AppConfig, StoreBackend};
use crate::password::PasswordHasher;
use crate::recorder::ActivityRecorder;
use crate::store::{MemoryStore, MongoStore, Store, StoreError, StoreResult};
use crate::token::TokenService;

mod activities;
mod invoices;
mod users;

pub use activities::*;
pub use invoices::*;
pub use users::*;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub hasher: PasswordHasher,
    pub tokens: TokenService,
    pub recorder: ActivityRecorder,
}

impl AppState {
    /// Wires the services around `store` and starts the activity worker.
    /// The worker stops once every clone of the state is dropped.
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> (Self, JoinHandle<()>) {
        let (recorder, worker) = ActivityRecorder::spawn(
            store.clone(),
            config.activity_queue_capacity,
            config.db_timeout,
        );
        let state = AppState {
            hasher: PasswordHasher::with_cost(config.password_cost),
            tokens: TokenService::new(&config.auth_token_key),
            config: Arc::new(config),
            store,
            recorder,
        };
        (state, worker)
    }

    /// Bounds a store call by the configured database deadline.
    pub(crate) async fn deadline<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        tokio::time::timeout(self.config.db_timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }
}

pub async fn init_state(config: AppConfig) -> Result<(AppState, JoinHandle<()>)> {
    let store: Arc<dyn Store> = match config.backend {
        StoreBackend::Mongo => Arc::new(
            MongoStore::connect(&config.mongo)
                .await
                .context("failed to connect to MongoDB")?,
        ),
        StoreBackend::Memory => {
            info!("using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(AppState::new(store, config))
}
