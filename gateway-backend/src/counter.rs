use std::time::Duration;

use tonic::transport::{Channel, Endpoint};

use crate::error::BackendError;
use crate::proto::counter_service_client::CounterServiceClient;
use crate::proto::CountRequest;

const UNAVAILABLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Client for the `counter` / `usage_counter` model used for prompt and
/// completion token accounting. Counts returned here are raw; memoizing
/// them by prompt prefix is the caller's job (a [`gateway_cache`] bounded
/// cache in the gateway binary).
pub struct CounterClient {
    inner: CounterServiceClient<Channel>,
}

impl CounterClient {
    pub async fn connect(endpoint: &str) -> Result<Self, BackendError> {
        let channel = Endpoint::from_shared(format!("http://{endpoint}"))
            .map_err(|e| BackendError::Unreachable(e.to_string()))?
            .connect()
            .await?;
        Ok(Self {
            inner: CounterServiceClient::new(channel),
        })
    }

    pub async fn count(&mut self, prompt: &[u8]) -> Result<i64, BackendError> {
        let response = self
            .inner
            .count(CountRequest {
                prompt: vec![prompt.to_vec()],
            })
            .await?
            .into_inner();
        Ok(response.num_tokens.iter().map(|&n| n as i64).sum())
    }

    /// Counts with a hard 2s unavailability budget, falling back to the
    /// `ceil(chars / 4)` estimate used throughout the gateway when the
    /// counter model can't answer in time.
    pub async fn count_or_estimate(&mut self, prompt: &str) -> i64 {
        match tokio::time::timeout(UNAVAILABLE_TIMEOUT, self.count(prompt.as_bytes())).await {
            Ok(Ok(count)) => count,
            _ => estimate_tokens(prompt),
        }
    }
}

/// `ceil(chars/4)`, the fallback estimate when the counter model is
/// unreachable or too slow.
pub fn estimate_tokens(text: &str) -> i64 {
    let chars = text.chars().count() as i64;
    chars.div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
