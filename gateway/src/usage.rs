//! Token counting: calls the backend's `counter` model, memoized by a
//! bounded TTL cache keyed on the first 500 chars of the input (the spec's
//! "small LRU (1000 entries, key = first 500 chars)" — eviction here is
//! TTL + capacity-bounded rather than strict LRU, but it's the pack's own
//! bounded-cache primitive and serves the same purpose: stop re-invoking
//! the counter model for repeat prompts within a short window).

use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use gateway_backend::CounterClient;
use gateway_cache::BoundedTtlCache;
use gateway_data::UsageRow;
use serde_json::Value;

const MEMO_CAPACITY: usize = 1000;
const MEMO_TTL: Duration = Duration::from_secs(300);
const KEY_PREFIX_CHARS: usize = 500;

fn memo_key(text: &str) -> String {
    text.chars().take(KEY_PREFIX_CHARS).collect()
}

fn local_hostname() -> &'static str {
    static HOST: OnceLock<String> = OnceLock::new();
    HOST.get_or_init(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".into())
    })
}

/// Builds one usage ledger row. `host`/`pid` identify the gateway process
/// that served the request, for multi-instance deployments.
#[allow(clippy::too_many_arguments)]
pub fn build_row(
    api_type: &str,
    user_id: i64,
    model: &str,
    request_id: &str,
    prompt_tokens: i64,
    completion_tokens: Option<i64>,
    input_count: Option<i64>,
    extra_data: Value,
) -> UsageRow {
    UsageRow {
        ts: Utc::now(),
        api_type: api_type.to_string(),
        user_id,
        model: model.to_string(),
        request_id: request_id.to_string(),
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens.unwrap_or(0),
        input_count,
        extra_data,
        host: local_hostname().to_string(),
        pid: std::process::id() as i32,
    }
}

#[derive(Clone)]
pub struct TokenCounter {
    endpoint: String,
    memo: BoundedTtlCache<String, i64>,
}

impl TokenCounter {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            memo: BoundedTtlCache::new(MEMO_TTL, MEMO_CAPACITY),
        }
    }

    /// Counts tokens in `text`, reusing a memoized count when the prefix
    /// key matches. Falls back to `⌈chars/4⌉` when the counter model can't
    /// answer within its own 2s budget or the connection fails outright.
    pub async fn count(&self, text: &str) -> i64 {
        let key = memo_key(text);
        if let Some(cached) = self.memo.get(&key) {
            return cached;
        }

        let count = match CounterClient::connect(&self.endpoint).await {
            Ok(mut client) => client.count_or_estimate(text).await,
            Err(_) => gateway_backend::estimate_tokens(text),
        };
        self.memo.insert(key, count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memo_key_truncates_to_prefix_length() {
        let long = "a".repeat(600);
        assert_eq!(memo_key(&long).chars().count(), KEY_PREFIX_CHARS);
    }

    #[test]
    fn memo_key_passes_short_text_through() {
        assert_eq!(memo_key("hi"), "hi");
    }

    #[test]
    fn build_row_sums_total_tokens() {
        let row = build_row("chat", 1, "llama-3-8b", "req-1", 10, Some(5), None, Value::Null);
        assert_eq!(row.total_tokens, 15);
        assert_eq!(row.api_type, "chat");
        assert!(!row.host.is_empty());
    }

    #[test]
    fn build_row_defaults_completion_to_zero_for_total() {
        let row = build_row("embeddings", 1, "embed-ada", "req-2", 7, None, Some(3), Value::Null);
        assert_eq!(row.total_tokens, 7);
        assert_eq!(row.input_count, Some(3));
    }
}
