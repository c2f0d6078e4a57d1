use std::sync::Arc;
use std::time::Duration;

use gateway_data::{UsageRepository, UsageRow};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::backoff::Backoff;
use crate::fallback::FallbackSink;

pub enum Command {
    Record(UsageRow),
    Flush,
    Shutdown(oneshot::Sender<()>),
}

pub struct Worker {
    pub repo: Arc<dyn UsageRepository>,
    pub fallback: Arc<FallbackSink>,
    pub rx: mpsc::Receiver<Command>,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub cancel: CancellationToken,
}

impl Worker {
    pub async fn run(mut self) {
        let mut batch: Vec<UsageRow> = Vec::with_capacity(self.batch_size);
        let mut backoff = Backoff::default();
        let mut tick = tokio::time::interval(self.flush_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    self.drain_remaining(&mut batch).await;
                    self.flush(&mut batch, &mut backoff).await;
                    break;
                }
                maybe_cmd = self.rx.recv() => {
                    match maybe_cmd {
                        Some(Command::Record(row)) => {
                            batch.push(row);
                            if batch.len() >= self.batch_size {
                                self.flush(&mut batch, &mut backoff).await;
                            }
                        }
                        Some(Command::Flush) => {
                            self.flush(&mut batch, &mut backoff).await;
                        }
                        Some(Command::Shutdown(done)) => {
                            self.drain_remaining(&mut batch).await;
                            self.flush(&mut batch, &mut backoff).await;
                            let _ = done.send(());
                            break;
                        }
                        None => {
                            self.flush(&mut batch, &mut backoff).await;
                            break;
                        }
                    }
                }
                _ = tick.tick() => {
                    if !batch.is_empty() {
                        self.flush(&mut batch, &mut backoff).await;
                    }
                }
            }
        }
    }

    async fn drain_remaining(&mut self, batch: &mut Vec<UsageRow>) {
        while let Ok(cmd) = self.rx.try_recv() {
            match cmd {
                Command::Record(row) => batch.push(row),
                Command::Flush => {}
                Command::Shutdown(done) => {
                    let _ = done.send(());
                }
            }
        }
    }

    async fn flush(&self, batch: &mut Vec<UsageRow>, backoff: &mut Backoff) {
        if batch.is_empty() {
            return;
        }

        if backoff.in_cooldown() {
            self.fallback.write_batch(batch).await;
            batch.clear();
            return;
        }

        match self.repo.insert_batch(batch).await {
            Ok(()) => {
                backoff.reset();
                batch.clear();
            }
            Err(e) => {
                warn!(error = %e, rows = batch.len(), "usage batch insert failed, routing to fallback");
                self.fallback.write_batch(batch).await;
                batch.clear();
                backoff.record_failure();
            }
        }
    }
}
