use std::time::Duration;

use crate::tensor::{clamp_penalty, clamp_temperature, clamp_top_p};

/// Per-stream generation request. `prompt` is already-serialized model
/// input text (Llama-3 role-delimited tokens, a JSON object, or whatever
/// the dispatching route built); the Backend Client does not know about
/// chat message shapes.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub model_name: String,
    pub request_id: String,
    pub prompt: String,
    pub max_tokens: i32,
    pub stop_words: Vec<String>,
    pub top_p: f32,
    pub temperature: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub random_seed: u64,
    pub stream: bool,
}

impl GenerationParams {
    /// Clamps sampling parameters in place to the ranges the backend
    /// protocol requires, regardless of what the caller supplied.
    pub fn clamp(mut self) -> Self {
        self.top_p = clamp_top_p(self.top_p);
        self.temperature = clamp_temperature(self.temperature);
        self.presence_penalty = clamp_penalty(self.presence_penalty);
        self.frequency_penalty = clamp_penalty(self.frequency_penalty);
        self
    }

    /// Derives the i-th of an N-way parallel generation's params: distinct
    /// seed and request id, everything else unchanged.
    pub fn for_parallel_index(&self, index: u64) -> Self {
        Self {
            request_id: format!("{}-{index}", self.request_id),
            random_seed: self.random_seed + index * 1000,
            ..self.clone()
        }
    }
}

/// Deadlines from the concurrency model: 60s to collect a single stream,
/// 120s to join an N-way parallel generation, 300s hard cap regardless.
#[derive(Debug, Clone, Copy)]
pub struct Deadlines {
    pub collect: Duration,
    pub parallel_join: Duration,
    pub hard_cap: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            collect: Duration::from_secs(60),
            parallel_join: Duration::from_secs(120),
            hard_cap: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GenerationParams {
        GenerationParams {
            model_name: "llama-3-8b".into(),
            request_id: "req-1".into(),
            prompt: "hello".into(),
            max_tokens: 256,
            stop_words: vec![],
            top_p: 5.0,
            temperature: -1.0,
            presence_penalty: 10.0,
            frequency_penalty: -10.0,
            random_seed: 42,
            stream: true,
        }
    }

    #[test]
    fn clamp_bounds_all_sampling_params() {
        let clamped = sample().clamp();
        assert_eq!(clamped.top_p, 1.0);
        assert_eq!(clamped.temperature, 0.0);
        assert_eq!(clamped.presence_penalty, 2.0);
        assert_eq!(clamped.frequency_penalty, -2.0);
    }

    #[test]
    fn parallel_index_derives_seed_and_request_id() {
        let base = sample();
        let third = base.for_parallel_index(2);
        assert_eq!(third.request_id, "req-1-2");
        assert_eq!(third.random_seed, 42 + 2000);
        assert_eq!(third.prompt, base.prompt);
    }
}
