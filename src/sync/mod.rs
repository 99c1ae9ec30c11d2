//! Offline-first delivery of check-ins, check-outs, shifts and breaks.
//!
//! Every such write is tried right away ([submit::send_or_queue]). When the server can't be
//! reached it lands in the outbox, and the `fieldtrack-sync` daemon ([worker::SyncModule]) keeps
//! retrying it with the same `client_ref` until the server accepts or refuses it.

pub mod args;
pub mod backoff;
pub mod shutdown;
pub mod submit;
pub mod worker;

use std::path::PathBuf;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use worker::SyncModule;

use crate::{
    api::client::HttpTrackerApi,
    config::AppConfig,
    storage::{outbox::Outbox, session::SessionStore},
    utils::clock::DefaultClock,
};

/// Represents the starting point for the sync daemon.
pub async fn start_sync(dir: PathBuf, config: AppConfig) -> Result<()> {
    let token = SessionStore::new(&dir).user().await?.and_then(|u| u.token);
    let api = HttpTrackerApi::new(&config.api_base, config.request_timeout())?.with_token(token);
    info!("Syncing {:?} to {}", dir, config.api_base);

    let shutdown_token = CancellationToken::new();
    let module = SyncModule::new(
        Box::new(api),
        Outbox::new(&dir),
        shutdown_token.clone(),
        config.sync_interval(),
        Box::new(DefaultClock),
    );

    let (_, sync_result) = tokio::join!(shutdown::detect_shutdown(shutdown_token.clone()), async {
        let result = module.run().await;
        shutdown_token.cancel();
        result
    });

    if let Err(sync_result) = sync_result {
        error!("Sync module got an error {:?}", sync_result);
    }
    info!("Sync daemon stopped");
    Ok(())
}
