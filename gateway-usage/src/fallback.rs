use std::path::{Path, PathBuf};

use gateway_data::UsageRow;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::error;

/// Append-only newline-delimited-JSON sink. Opened once and held for the
/// pipeline's lifetime; each row is `writeln!`'d and flushed immediately,
/// trading throughput for durability since this path only runs when the
/// primary store is unavailable.
pub struct FallbackSink {
    path: PathBuf,
    file: Mutex<Option<tokio::fs::File>>,
}

impl FallbackSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    async fn open(&self) -> std::io::Result<tokio::fs::File> {
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
    }

    pub async fn write_row(&self, row: &UsageRow) {
        let line = match serde_json::to_vec(row) {
            Ok(mut bytes) => {
                bytes.push(b'\n');
                bytes
            }
            Err(e) => {
                error!(error = %e, "failed to serialize usage row for fallback sink");
                return;
            }
        };

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            match self.open().await {
                Ok(f) => *guard = Some(f),
                Err(e) => {
                    error!(error = %e, path = %self.path.display(), "failed to open usage fallback file");
                    return;
                }
            }
        }

        if let Some(file) = guard.as_mut() {
            if let Err(e) = file.write_all(&line).await {
                error!(error = %e, "failed to write usage fallback row");
                return;
            }
            if let Err(e) = file.flush().await {
                error!(error = %e, "failed to flush usage fallback file");
            }
        }
    }

    pub async fn write_batch(&self, rows: &[UsageRow]) {
        for row in rows {
            self.write_row(row).await;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
