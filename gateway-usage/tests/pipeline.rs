use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use gateway_data::{DataError, UsageRepository, UsageRow};
use gateway_usage::{UsagePipeline, UsagePipelineConfig};

fn sample_row(request_id: &str) -> UsageRow {
    UsageRow {
        ts: Utc::now(),
        api_type: "chat".into(),
        user_id: 1,
        model: "llama-3-8b".into(),
        request_id: request_id.into(),
        prompt_tokens: 10,
        completion_tokens: Some(5),
        total_tokens: 15,
        input_count: None,
        extra_data: serde_json::json!({}),
        host: "gateway-0".into(),
        pid: 1234,
    }
}

#[derive(Default)]
struct RecordingRepo {
    rows: Mutex<Vec<UsageRow>>,
}

#[async_trait]
impl UsageRepository for RecordingRepo {
    async fn insert_batch(&self, rows: &[UsageRow]) -> Result<(), DataError> {
        self.rows.lock().unwrap().extend_from_slice(rows);
        Ok(())
    }
}

struct AlwaysFailsRepo;

#[async_trait]
impl UsageRepository for AlwaysFailsRepo {
    async fn insert_batch(&self, _rows: &[UsageRow]) -> Result<(), DataError> {
        Err(DataError::transient(std::io::Error::other("connection refused")))
    }
}

#[tokio::test]
async fn records_flush_on_explicit_signal() {
    let repo = Arc::new(RecordingRepo::default());
    let dir = tempfile::tempdir().unwrap();
    let config = UsagePipelineConfig {
        batch_size: 50,
        flush_interval: Duration::from_secs(5),
        fallback_path: dir.path().join("fallback.ndjson"),
    };
    let pipeline = UsagePipeline::spawn(repo.clone(), config);

    pipeline.record(sample_row("req-1")).await;
    pipeline.flush();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(repo.rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn batch_flushes_once_size_threshold_hit() {
    let repo = Arc::new(RecordingRepo::default());
    let dir = tempfile::tempdir().unwrap();
    let config = UsagePipelineConfig {
        batch_size: 3,
        flush_interval: Duration::from_secs(60),
        fallback_path: dir.path().join("fallback.ndjson"),
    };
    let pipeline = UsagePipeline::spawn(repo.clone(), config);

    for i in 0..3 {
        pipeline.record(sample_row(&format!("req-{i}"))).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(repo.rows.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn insert_failures_route_to_fallback_file() {
    let repo = Arc::new(AlwaysFailsRepo);
    let dir = tempfile::tempdir().unwrap();
    let fallback_path = dir.path().join("fallback.ndjson");
    let config = UsagePipelineConfig {
        batch_size: 1,
        flush_interval: Duration::from_secs(60),
        fallback_path: fallback_path.clone(),
    };
    let pipeline = UsagePipeline::spawn(repo, config);

    pipeline.record(sample_row("req-failed")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let contents = tokio::fs::read_to_string(&fallback_path).await.unwrap();
    assert!(contents.contains("req-failed"));
}

#[tokio::test]
async fn shutdown_drains_pending_batch() {
    let repo = Arc::new(RecordingRepo::default());
    let dir = tempfile::tempdir().unwrap();
    let config = UsagePipelineConfig {
        batch_size: 100,
        flush_interval: Duration::from_secs(60),
        fallback_path: dir.path().join("fallback.ndjson"),
    };
    let pipeline = UsagePipeline::spawn(repo.clone(), config);

    pipeline.record(sample_row("req-pending")).await;
    pipeline.shutdown(Duration::from_secs(2)).await;

    assert_eq!(repo.rows.lock().unwrap().len(), 1);
}
