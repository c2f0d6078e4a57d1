use futures_util::future::join_all;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::chat::{ChatClient, ChatEvent, StopReason};
use crate::error::BackendError;
use crate::params::{Deadlines, GenerationParams};

#[derive(Debug)]
pub struct GenerationOutcome {
    pub index: usize,
    pub text: String,
    pub reason: StopReason,
    pub prompt_tokens: Option<i64>,
}

/// Drains one [`ChatClient::generate`] stream to completion, concatenating
/// chunks. Used by the aggregated (non-streaming) response path.
pub async fn collect(
    mut stream: tokio_stream::wrappers::ReceiverStream<Result<ChatEvent, BackendError>>,
) -> Result<(String, StopReason, Option<i64>), BackendError> {
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            ChatEvent::Chunk(chunk) => text.push_str(&chunk),
            ChatEvent::Done { reason, prompt_tokens } => return Ok((text, reason, prompt_tokens)),
        }
    }
    Ok((text, StopReason::BackendSentinel, None))
}

/// Spawns N independent Backend Client instances with distinct seeds
/// (`base_seed + i*1000`) and request ids (`{base}-{i}`), each connecting
/// fresh (streams are never shared across requests) and running to
/// completion or error. Partial failure is the caller's concern: every
/// slot's `Result` is returned so the caller can decide `len(choices) < N`
/// vs a total failure.
pub async fn generate_parallel(
    endpoint: &str,
    base_params: &GenerationParams,
    deadlines: Deadlines,
    n: usize,
) -> Vec<Result<GenerationOutcome, BackendError>> {
    let tasks = (0..n).map(|i| {
        let endpoint = endpoint.to_string();
        let params = base_params.for_parallel_index(i as u64);
        async move {
            let outcome = run_one(&endpoint, params, deadlines).await;
            outcome.map(|(text, reason, prompt_tokens)| GenerationOutcome {
                index: i,
                text,
                reason,
                prompt_tokens,
            })
        }
    });

    let results = join_all(tasks);
    match tokio::time::timeout(deadlines.parallel_join, results).await {
        Ok(results) => results,
        Err(_) => (0..n).map(|_| Err(BackendError::DeadlineExceeded)).collect(),
    }
}

async fn run_one(
    endpoint: &str,
    params: GenerationParams,
    deadlines: Deadlines,
) -> Result<(String, StopReason, Option<i64>), BackendError> {
    let client = ChatClient::connect(endpoint).await?;
    let cancel = CancellationToken::new();
    let stream = client.generate(params, deadlines, cancel);
    collect(stream).await
}

/// Keeps only the successful outcomes; errors only if every stream
/// failed, matching "the request fails only if ALL streams fail".
pub fn keep_successes(
    results: Vec<Result<GenerationOutcome, BackendError>>,
) -> Result<Vec<GenerationOutcome>, BackendError> {
    let mut successes = Vec::with_capacity(results.len());
    let mut last_error = None;
    for result in results {
        match result {
            Ok(outcome) => successes.push(outcome),
            Err(e) => last_error = Some(e),
        }
    }
    if successes.is_empty() {
        Err(last_error.unwrap_or(BackendError::StreamAborted("no generations ran".into())))
    } else {
        Ok(successes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_successes_passes_through_when_all_ok() {
        let results = vec![
            Ok(GenerationOutcome {
                index: 0,
                text: "a".into(),
                reason: StopReason::BackendSentinel,
                prompt_tokens: Some(3),
            }),
            Ok(GenerationOutcome {
                index: 1,
                text: "b".into(),
                reason: StopReason::BackendSentinel,
                prompt_tokens: Some(3),
            }),
        ];
        let kept = keep_successes(results).unwrap();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn keep_successes_tolerates_partial_failure() {
        let results = vec![
            Ok(GenerationOutcome {
                index: 0,
                text: "a".into(),
                reason: StopReason::BackendSentinel,
                prompt_tokens: Some(3),
            }),
            Err(BackendError::Unreachable("boom".into())),
        ];
        let kept = keep_successes(results).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].index, 0);
    }

    #[test]
    fn keep_successes_errors_when_all_fail() {
        let results = vec![
            Err(BackendError::Unreachable("a".into())),
            Err(BackendError::Unreachable("b".into())),
        ];
        assert!(keep_successes(results).is_err());
    }
}
