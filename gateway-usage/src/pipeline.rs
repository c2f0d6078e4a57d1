use std::sync::Arc;
use std::time::Duration;

use gateway_data::{UsageRepository, UsageRow};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::UsagePipelineConfig;
use crate::fallback::FallbackSink;
use crate::worker::{Command, Worker};

/// Handle to the running usage pipeline. Cloning shares the same
/// background worker; every handler in the gateway binary holds a clone.
#[derive(Clone)]
pub struct UsagePipeline {
    tx: mpsc::Sender<Command>,
    repo: Arc<dyn UsageRepository>,
    fallback: Arc<FallbackSink>,
    cancel: CancellationToken,
}

impl UsagePipeline {
    /// Spawns the background worker and returns a handle to it.
    pub fn spawn(repo: Arc<dyn UsageRepository>, config: UsagePipelineConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity());
        let fallback = Arc::new(FallbackSink::new(config.fallback_path.clone()));
        let cancel = CancellationToken::new();

        let worker = Worker {
            repo: repo.clone(),
            fallback: fallback.clone(),
            rx,
            batch_size: config.batch_size,
            flush_interval: config.flush_interval,
            cancel: cancel.clone(),
        };
        tokio::spawn(worker.run());

        Self {
            tx,
            repo,
            fallback,
            cancel,
        }
    }

    /// Non-blocking from the caller's perspective beyond a single insert:
    /// enqueues for batching, or on a full queue inserts the row directly
    /// and falls back to the NDJSON sink if that insert also fails.
    pub async fn record(&self, row: UsageRow) {
        match self.tx.try_send(Command::Record(row)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(Command::Record(row)))
            | Err(mpsc::error::TrySendError::Closed(Command::Record(row))) => {
                self.direct_insert_or_fallback(row).await;
            }
            _ => unreachable!(),
        }
    }

    async fn direct_insert_or_fallback(&self, row: UsageRow) {
        if let Err(e) = self.repo.insert_batch(std::slice::from_ref(&row)).await {
            warn!(error = %e, "direct usage insert failed, routing to fallback");
            self.fallback.write_row(&row).await;
        }
    }

    /// Signals an immediate drain; returns without waiting for it.
    pub fn flush(&self) {
        let _ = self.tx.try_send(Command::Flush);
    }

    /// Stops accepting new records, drains within `deadline`, and writes
    /// any leftovers to the fallback sink.
    pub async fn shutdown(&self, deadline: Duration) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(done_tx)).await.is_err() {
            return;
        }
        if tokio::time::timeout(deadline, done_rx).await.is_err() {
            warn!("usage pipeline shutdown deadline exceeded before drain completed");
        }
        self.cancel.cancel();
    }
}
