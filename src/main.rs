// main.rs
// Loads configuration, connects the store, builds the router and serves until Ctrl-C.
//
// Endpoints:
// - GET    /                                          -> greeting
// - POST   /api/register                              -> sign up
// - POST   /api/login                                 -> bearer token
// - POST   /api/invoice/{user_id}/create              -> new invoice
// - GET    /api/invoice/{user_id}/get/{invoice_id}    -> one invoice
// - GET    /api/invoice/{user_id}/all                 -> every invoice of the user
// - PUT    /api/invoice/{user_id}/update/{invoice_id} -> edit before the issue date
// - DELETE /api/invoice/{user_id}/delete/{invoice_id} -> hard delete
// - GET    /api/invoice/{user_id}/stats               -> totals
// - POST   /api/invoice/{user_id}/send/{invoice_id}   -> mark issued
// - GET    /api/invoice/{user_id}/download/{invoice_id} -> PDF
// - GET    /api/invoice/{user_id}/activities          -> recent invoice activity
// - GET    /api/invoice/{user_id}/items/{invoice_id}  -> line items
// - GET    /api/invoice/{user_id}/ready               -> issuable within 30 days
// - PUT    /api/password/reset                        -> new password

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use invoicedesk::{config::AppConfig, routes, state};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    let config = AppConfig::from_env().context("invalid configuration")?;
    let bind_addr = config.bind_addr.clone();

    let (state, worker) = state::init_state(config)
        .await
        .context("failed to initialize application state")?;
    let app = routes::router(Arc::new(state));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!("listening on http://{bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // The router held the last state clone; the worker drains what is queued and exits.
    match tokio::time::timeout(Duration::from_secs(5), worker).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "activity worker ended abnormally"),
        Err(_) => tracing::warn!("activity worker still busy at exit"),
    }
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
