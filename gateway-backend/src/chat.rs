use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tracing::warn;

use crate::error::BackendError;
use crate::params::{Deadlines, GenerationParams};
use crate::proto::detokenize_service_client::DetokenizeServiceClient;
use crate::proto::generation_service_client::GenerationServiceClient;
use crate::proto::ModelInferRequest;
use crate::reassembly::Reassembler;
use crate::tensor::{bool_tensor, bytes_tensor, fp32_tensor, int_tensor, text_tensor, uint64_tensor};

const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    StopSequence,
    MaxTokensReached,
    BackendSentinel,
    DeadlineElapsed,
}

impl StopReason {
    /// `finish_reason="length"` vs `"stop"` at the HTTP boundary; the
    /// caller still overrides to `"tool_calls"` after scanning the
    /// accumulated text.
    pub fn is_length_truncated(&self) -> bool {
        matches!(self, StopReason::MaxTokensReached | StopReason::DeadlineElapsed)
    }
}

#[derive(Debug)]
pub enum ChatEvent {
    Chunk(String),
    Done {
        reason: StopReason,
        prompt_tokens: Option<i64>,
    },
}

/// One streaming generation. Not `Clone`/reusable: one instance per
/// logical request, matching the contract that streams are never shared
/// across requests.
pub struct ChatClient {
    generation: GenerationServiceClient<Channel>,
    detokenizer: DetokenizeServiceClient<Channel>,
}

impl ChatClient {
    /// Connects once and derives both service stubs from the same
    /// channel — the detokenizer model lives on the same host/port.
    pub async fn connect(endpoint: &str) -> Result<Self, BackendError> {
        let channel = Endpoint::from_shared(format!("http://{endpoint}"))
            .map_err(|e| BackendError::Unreachable(e.to_string()))?
            .connect()
            .await?;
        Ok(Self {
            generation: GenerationServiceClient::new(channel.clone()),
            detokenizer: DetokenizeServiceClient::new(channel),
        })
    }

    fn build_request(params: &GenerationParams) -> ModelInferRequest {
        let mut inputs = vec![
            text_tensor("text_input", &params.prompt),
            int_tensor("max_tokens", params.max_tokens),
            fp32_tensor("top_p", params.top_p),
            fp32_tensor("temperature", params.temperature),
            fp32_tensor("presence_penalty", params.presence_penalty),
            fp32_tensor("frequency_penalty", params.frequency_penalty),
            uint64_tensor("random_seed", params.random_seed),
            bool_tensor("stream", params.stream),
        ];
        if !params.stop_words.is_empty() {
            let words: Vec<Vec<u8>> = params
                .stop_words
                .iter()
                .map(|w| w.as_bytes().to_vec())
                .collect();
            inputs.push(bytes_tensor("stop_words", words));
        }
        ModelInferRequest {
            model_name: params.model_name.clone(),
            request_id: params.request_id.clone(),
            inputs,
        }
    }

    /// Drives the stream on a background task and returns an async
    /// iterator of [`ChatEvent`]s to the handler. The task owns both the
    /// gRPC stream handle and the detokenizer stub; whichever way the
    /// loop exits, both are dropped when the task ends, which tonic
    /// treats as cancellation of any still-open call.
    pub fn generate(
        mut self,
        params: GenerationParams,
        deadlines: Deadlines,
        cancel: CancellationToken,
    ) -> ReceiverStream<Result<ChatEvent, BackendError>> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let params = params.clamp();

        tokio::spawn(async move {
            let outcome = tokio::time::timeout(
                deadlines.hard_cap.min(deadlines.collect),
                self.drive(&params, &cancel, &tx),
            )
            .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let _ = tx.send(Err(e)).await;
                }
                Err(_elapsed) => {
                    let _ = tx
                        .send(Ok(ChatEvent::Done {
                            reason: StopReason::DeadlineElapsed,
                            prompt_tokens: None,
                        }))
                        .await;
                }
            }
        });

        ReceiverStream::new(rx)
    }

    async fn drive(
        &mut self,
        params: &GenerationParams,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<Result<ChatEvent, BackendError>>,
    ) -> Result<(), BackendError> {
        let request = Self::build_request(params);
        let mut stream = self.generation.model_stream_infer(request).await?.into_inner();

        let mut reassembler = Reassembler::new();
        let mut accumulated = String::new();
        let mut emitted_chunks: i32 = 0;
        let mut saw_real_chunk = false;
        let mut prompt_tokens: Option<i64> = None;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    return Ok(());
                }
                next = stream.message() => {
                    let Some(response) = next? else {
                        break;
                    };

                    let Some(text_output) = response
                        .outputs
                        .iter()
                        .find(|t| t.name == "text_output")
                    else {
                        continue;
                    };
                    if let Some(pt) = response.outputs.iter().find(|t| t.name == "prompt_tokens") {
                        prompt_tokens = pt.int_contents.first().map(|&n| n as i64);
                    }

                    let raw_bytes = text_output.bytes_contents.first().cloned().unwrap_or_default();
                    if raw_bytes.is_empty() && saw_real_chunk {
                        break;
                    }

                    let raw = String::from_utf8_lossy(&raw_bytes).into_owned();
                    let (literal, saw_marker) = reassembler.parse_chunk(&raw);

                    let text = if saw_marker {
                        literal
                    } else if reassembler.has_pending() {
                        let tokens = reassembler.take_pending();
                        let resolved = self.resolve_pending(tokens).await;
                        format!("{resolved}{literal}")
                    } else {
                        literal
                    };

                    if !text.is_empty() {
                        saw_real_chunk = true;
                        emitted_chunks += 1;
                        accumulated.push_str(&text);
                        if tx.send(Ok(ChatEvent::Chunk(text))).await.is_err() {
                            return Ok(());
                        }
                    }

                    if let Some(stop) = params
                        .stop_words
                        .iter()
                        .find(|w| !w.is_empty() && accumulated.contains(w.as_str()))
                    {
                        warn!(stop_word = %stop, "stop sequence matched, ending stream");
                        self.flush_trailing(&mut reassembler, tx, &mut accumulated).await;
                        let _ = tx
                            .send(Ok(ChatEvent::Done { reason: StopReason::StopSequence, prompt_tokens }))
                            .await;
                        return Ok(());
                    }
                    if emitted_chunks >= params.max_tokens {
                        self.flush_trailing(&mut reassembler, tx, &mut accumulated).await;
                        let _ = tx
                            .send(Ok(ChatEvent::Done { reason: StopReason::MaxTokensReached, prompt_tokens }))
                            .await;
                        return Ok(());
                    }
                }
            }
        }

        self.flush_trailing(&mut reassembler, tx, &mut accumulated).await;
        let _ = tx
            .send(Ok(ChatEvent::Done {
                reason: StopReason::BackendSentinel,
                prompt_tokens,
            }))
            .await;
        Ok(())
    }

    /// Resolves pending placeholder tokens, degrading to their literal
    /// `t'N'` text on detokenizer failure rather than failing the stream.
    async fn resolve_pending(&mut self, tokens: Vec<i32>) -> String {
        let rendered: Vec<String> = tokens.iter().map(|t| format!("t'{t}'")).collect();
        match self
            .detokenizer
            .detokenize(crate::proto::DetokenizeRequest { tokens })
            .await
        {
            Ok(resp) => String::from_utf8(resp.into_inner().output).unwrap_or_else(|_| rendered.join("")),
            Err(e) => {
                warn!(error = %e, "detokenizer call failed, emitting raw placeholders");
                rendered.join("")
            }
        }
    }

    /// Any tokens still buffered when the stream ends must still be
    /// resolved, or reassembly is lossy.
    async fn flush_trailing(
        &mut self,
        reassembler: &mut Reassembler,
        tx: &mpsc::Sender<Result<ChatEvent, BackendError>>,
        accumulated: &mut String,
    ) {
        if !reassembler.has_pending() {
            return;
        }
        let tokens = reassembler.take_pending();
        let resolved = self.resolve_pending(tokens).await;
        if !resolved.is_empty() {
            accumulated.push_str(&resolved);
            let _ = tx.send(Ok(ChatEvent::Chunk(resolved))).await;
        }
    }
}
