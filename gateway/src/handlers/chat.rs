//! `POST /v1/chat/completions` — dispatches on the target model's prompt
//! family, drives N independent generation streams, extracts tool calls
//! from the accumulated output, and either frames the result as one SSE
//! stream or waits for everything and returns a single aggregated body.

use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use futures_util::stream::{select_all, BoxStream};
use futures_util::{Stream, StreamExt};
use gateway_auth::GatewayIdentity;
use gateway_backend::{
    estimate_tokens, generate_parallel, keep_successes, ChatClient, ChatEvent, Deadlines,
    GenerationParams,
};
use gateway_config::{Capability, ConfigRegistry, ModelDescriptor, PromptFamily};
use gateway_core::prelude::*;
use rand::Rng;
use uuid::Uuid;

use crate::openai::{
    ChatChoice, ChatChoiceStream, ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse,
    Delta, Message, Usage,
};
use crate::state::Services;
use crate::{agent_format, llama3, openai_compatible, tool_calls};

/// One generation's outcome, uniform across both dispatch paths.
struct ChoiceResult {
    index: usize,
    text: String,
    length_truncated: bool,
    prompt_tokens: Option<i64>,
}

fn completion_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4())
}

fn joined_message_text(req: &ChatCompletionRequest) -> String {
    req.messages
        .iter()
        .filter_map(|m| m.content.as_ref().map(|c| c.as_text()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn serialize_prompt(family: PromptFamily, req: &ChatCompletionRequest) -> String {
    match family {
        PromptFamily::Llama3 => llama3::serialize(
            &req.messages,
            req.tools.as_deref().unwrap_or(&[]),
            req.parallel_tool_calls,
            req.response_format.as_ref(),
        ),
        PromptFamily::HomeMadeAgent => agent_format::serialize(&req.messages),
        PromptFamily::OpenAiCompatible => String::new(),
    }
}

fn extract_tool_calls(family: PromptFamily, text: &str, parallel_tool_calls: bool) -> Vec<crate::openai::ToolCall> {
    match family {
        PromptFamily::OpenAiCompatible => tool_calls::extract_channel_tagged(text, parallel_tool_calls),
        _ => tool_calls::extract(text, parallel_tool_calls),
    }
}

fn finish_reason(has_tool_calls: bool, length_truncated: bool) -> &'static str {
    if has_tool_calls {
        "tool_calls"
    } else if length_truncated {
        "length"
    } else {
        "stop"
    }
}

fn base_generation_params(
    model_name: &str,
    request_id: &str,
    prompt: String,
    req: &ChatCompletionRequest,
    stream: bool,
) -> GenerationParams {
    GenerationParams {
        model_name: model_name.to_string(),
        request_id: request_id.to_string(),
        prompt,
        max_tokens: req.max_tokens,
        stop_words: req.stop.clone().unwrap_or_default(),
        top_p: req.top_p,
        temperature: req.temperature,
        presence_penalty: req.presence_penalty,
        frequency_penalty: req.frequency_penalty,
        random_seed: req.seed.unwrap_or_else(|| rand::thread_rng().gen()),
        stream,
    }
}

/// Runs the N-way tensor-protocol generation (Llama-3 / home-made-agent
/// families) to completion and returns one result per successful stream.
async fn run_tensor_aggregated(
    endpoint: &str,
    base_params: &GenerationParams,
    deadlines: Deadlines,
    n: usize,
) -> ApiResult<Vec<ChoiceResult>> {
    let results = generate_parallel(endpoint, base_params, deadlines, n).await;
    let outcomes = keep_successes(results).map_err(AppError::from)?;
    Ok(outcomes
        .into_iter()
        .map(|o| ChoiceResult {
            index: o.index,
            text: o.text,
            length_truncated: o.reason.is_length_truncated(),
            prompt_tokens: o.prompt_tokens,
        })
        .collect())
}

/// Runs N independent calls against an OpenAI-compatible HTTP upstream to
/// completion, tolerating partial failure the same way the tensor path does.
async fn run_openai_compatible_aggregated(
    client: &reqwest::Client,
    model: &ModelDescriptor,
    model_name: &str,
    req: &ChatCompletionRequest,
    n: usize,
) -> ApiResult<Vec<ChoiceResult>> {
    let tasks = (0..n).map(|index| async move {
        let response = openai_compatible::send(client, model, model_name, req).await?;
        let (text, prompt_tokens) = openai_compatible::collect_aggregated(response).await?;
        Ok::<_, AppError>(ChoiceResult {
            index,
            text,
            length_truncated: false,
            prompt_tokens,
        })
    });

    let results = futures_util::future::join_all(tasks).await;
    let successes: Vec<ChoiceResult> = results.into_iter().filter_map(Result::ok).collect();
    if successes.is_empty() {
        return Err(AppError::Internal("all upstream generations failed".into()));
    }
    Ok(successes)
}

async fn aggregated_response(
    identity: &GatewayIdentity,
    services: &Services,
    model_name: &str,
    req: &ChatCompletionRequest,
    family: PromptFamily,
    request_id: &str,
    mut results: Vec<ChoiceResult>,
) -> ApiResult<Json<ChatCompletionResponse>> {
    results.sort_by_key(|r| r.index);

    let prompt_fallback_text = joined_message_text(req);
    let mut choices = Vec::with_capacity(results.len());
    let mut total_prompt_tokens = 0i64;
    let mut total_completion_tokens = 0i64;

    for result in results {
        let calls = extract_tool_calls(family, &result.text, req.parallel_tool_calls);
        let has_tool_calls = !calls.is_empty();

        let mut token_input = result.text.clone();
        for call in &calls {
            token_input.push_str(&call.function.name);
            token_input.push_str(&call.function.arguments);
        }
        let completion_tokens = services.token_counter.count(&token_input).await;
        let prompt_tokens = match result.prompt_tokens {
            Some(pt) if pt > 0 => pt,
            _ => services.token_counter.count(&prompt_fallback_text).await,
        };

        total_prompt_tokens += prompt_tokens;
        total_completion_tokens += completion_tokens;

        choices.push(ChatChoice {
            index: result.index,
            message: Message {
                role: "assistant",
                content: if has_tool_calls { None } else { Some(result.text) },
                tool_calls: has_tool_calls.then_some(calls),
            },
            finish_reason: finish_reason(has_tool_calls, result.length_truncated),
        });
    }

    services
        .usage
        .record(crate::usage::build_row(
            "chat",
            identity.user_id,
            model_name,
            request_id,
            total_prompt_tokens,
            Some(total_completion_tokens),
            Some(req.messages.len() as i64),
            serde_json::Value::Null,
        ))
        .await;

    Ok(Json(ChatCompletionResponse {
        id: completion_id(),
        object: "chat.completion",
        created: chrono::Utc::now().timestamp(),
        model: model_name.to_string(),
        choices,
        usage: Usage {
            prompt_tokens: total_prompt_tokens,
            completion_tokens: total_completion_tokens,
            total_tokens: total_prompt_tokens + total_completion_tokens,
        },
    }))
}

enum StreamItem {
    Chunk {
        index: usize,
        text: String,
    },
    Done {
        index: usize,
        length_truncated: bool,
        prompt_tokens: Option<i64>,
        text: String,
    },
    Failed {
        index: usize,
    },
}

fn tensor_stream_for_index(
    endpoint: String,
    params: GenerationParams,
    deadlines: Deadlines,
    index: usize,
) -> BoxStream<'static, StreamItem> {
    Box::pin(async_stream::stream! {
        let client = match ChatClient::connect(&endpoint).await {
            Ok(client) => client,
            Err(_) => {
                yield StreamItem::Failed { index };
                return;
            }
        };

        let cancel = tokio_util::sync::CancellationToken::new();
        let mut stream = client.generate(params, deadlines, cancel);
        let mut acc = String::new();

        while let Some(event) = stream.next().await {
            match event {
                Ok(ChatEvent::Chunk(text)) => {
                    acc.push_str(&text);
                    yield StreamItem::Chunk { index, text };
                }
                Ok(ChatEvent::Done { reason, prompt_tokens }) => {
                    yield StreamItem::Done {
                        index,
                        length_truncated: reason.is_length_truncated(),
                        prompt_tokens,
                        text: acc,
                    };
                    return;
                }
                Err(_) => {
                    yield StreamItem::Failed { index };
                    return;
                }
            }
        }
    })
}

fn tensor_streams(
    endpoint: String,
    base_params: GenerationParams,
    deadlines: Deadlines,
    n: usize,
) -> Vec<BoxStream<'static, StreamItem>> {
    (0..n)
        .map(|i| tensor_stream_for_index(endpoint.clone(), base_params.for_parallel_index(i as u64), deadlines, i))
        .collect()
}

fn openai_stream_for_index(
    client: reqwest::Client,
    model: ModelDescriptor,
    model_name: String,
    req: Arc<ChatCompletionRequest>,
    index: usize,
) -> BoxStream<'static, StreamItem> {
    Box::pin(async_stream::stream! {
        let response = match openai_compatible::send(&client, &model, &model_name, &req).await {
            Ok(response) => response,
            Err(_) => {
                yield StreamItem::Failed { index };
                return;
            }
        };

        let mut deltas = Box::pin(openai_compatible::stream_deltas(response));
        let mut acc = String::new();

        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(text) => {
                    acc.push_str(&text);
                    yield StreamItem::Chunk { index, text };
                }
                Err(_) => {
                    yield StreamItem::Failed { index };
                    return;
                }
            }
        }

        yield StreamItem::Done {
            index,
            length_truncated: false,
            prompt_tokens: None,
            text: acc,
        };
    })
}

fn openai_streams(
    client: reqwest::Client,
    model: ModelDescriptor,
    model_name: String,
    req: Arc<ChatCompletionRequest>,
    n: usize,
) -> Vec<BoxStream<'static, StreamItem>> {
    (0..n)
        .map(|i| openai_stream_for_index(client.clone(), model.clone(), model_name.clone(), req.clone(), i))
        .collect()
}

#[derive(Default)]
struct IndexState {
    text: String,
    length_truncated: bool,
    prompt_tokens: Option<i64>,
    failed: bool,
}

fn sse_chunk_event(chunk: &ChatCompletionChunk) -> Result<Event, axum::Error> {
    Ok(Event::default().data(serde_json::to_string(chunk).unwrap_or_default()))
}

/// Drives the merged multi-stream generation into an SSE body following
/// the wire sequence: header, per-chunk deltas, one final event carrying
/// tool calls/finish_reason/usage, then the literal `[DONE]` terminator.
fn sse_stream(
    identity: GatewayIdentity,
    services: Services,
    model_name: String,
    family: PromptFamily,
    req: Arc<ChatCompletionRequest>,
    request_id: String,
    n: usize,
    streams: Vec<BoxStream<'static, StreamItem>>,
) -> impl Stream<Item = Result<Event, axum::Error>> {
    async_stream::stream! {
        let completion_id = completion_id();
        let created = chrono::Utc::now().timestamp();

        yield sse_chunk_event(&ChatCompletionChunk {
            id: completion_id.clone(),
            object: "chat.completion.chunk",
            created,
            model: model_name.clone(),
            choices: vec![],
            usage: None,
        });

        let mut merged = select_all(streams);
        let mut states: Vec<IndexState> = (0..n).map(|_| IndexState::default()).collect();
        let mut remaining = n;

        while remaining > 0 {
            let Some(item) = merged.next().await else { break };
            match item {
                StreamItem::Chunk { index, text } => {
                    yield sse_chunk_event(&ChatCompletionChunk {
                        id: completion_id.clone(),
                        object: "chat.completion.chunk",
                        created,
                        model: model_name.clone(),
                        choices: vec![ChatChoiceStream {
                            index,
                            delta: Delta {
                                role: Some("assistant"),
                                content: Some(text),
                                tool_calls: None,
                            },
                            finish_reason: None,
                        }],
                        usage: None,
                    });
                }
                StreamItem::Done { index, length_truncated, prompt_tokens, text } => {
                    states[index].text = text;
                    states[index].length_truncated = length_truncated;
                    states[index].prompt_tokens = prompt_tokens;
                    remaining -= 1;
                }
                StreamItem::Failed { index } => {
                    states[index].failed = true;
                    remaining -= 1;
                }
            }
        }

        let prompt_fallback_text = joined_message_text(&req);
        let mut choices = Vec::new();
        let mut total_prompt_tokens = 0i64;
        let mut total_completion_tokens = 0i64;
        let any_success = states.iter().any(|s| !s.failed);

        for (index, state) in states.into_iter().enumerate() {
            if state.failed {
                continue;
            }
            let calls = extract_tool_calls(family, &state.text, req.parallel_tool_calls);
            let has_tool_calls = !calls.is_empty();
            let completion_tokens = estimate_tokens(&state.text)
                + calls.iter().map(|c| estimate_tokens(&c.function.arguments)).sum::<i64>();
            let prompt_tokens = state
                .prompt_tokens
                .unwrap_or_else(|| estimate_tokens(&prompt_fallback_text));

            total_prompt_tokens += prompt_tokens;
            total_completion_tokens += completion_tokens;

            choices.push(ChatChoiceStream {
                index,
                delta: Delta {
                    role: None,
                    content: None,
                    tool_calls: has_tool_calls.then_some(calls),
                },
                finish_reason: Some(finish_reason(has_tool_calls, state.length_truncated)),
            });
        }

        // Always yield exactly one usage-bearing event before [DONE], even when
        // every parallel stream failed — the SSE response already committed to
        // 200 OK by the time streaming started, so there's no status code left
        // to carry the failure; an empty-choices, zero-usage event is the only
        // way to close the stream without breaking the framing invariant.
        yield sse_chunk_event(&ChatCompletionChunk {
            id: completion_id,
            object: "chat.completion.chunk",
            created,
            model: model_name.clone(),
            choices,
            usage: Some(Usage {
                prompt_tokens: total_prompt_tokens,
                completion_tokens: total_completion_tokens,
                total_tokens: total_prompt_tokens + total_completion_tokens,
            }),
        });

        if any_success {
            services
                .usage
                .record(crate::usage::build_row(
                    "chat",
                    identity.user_id,
                    &model_name,
                    &request_id,
                    total_prompt_tokens,
                    Some(total_completion_tokens),
                    Some(req.messages.len() as i64),
                    serde_json::Value::Null,
                ))
                .await;
        }

        yield Ok(gateway_core::sse::done_event());
    }
}

pub async fn chat_completions(
    identity: GatewayIdentity,
    State(config): State<Arc<ConfigRegistry>>,
    State(services): State<Services>,
    Json(req): Json<ChatCompletionRequest>,
) -> ApiResult<axum::response::Response> {
    identity.require_scope("chat:base")?;

    if req.messages.is_empty() {
        return Err(AppError::BadRequest("messages must not be empty".into()));
    }

    let snapshot = config.snapshot();
    let model_name = req.model.rsplit('/').next().unwrap_or(&req.model).to_string();
    let model = snapshot
        .get_model(&model_name)
        .map_err(|_| AppError::BadRequest(format!("unknown model `{model_name}`")))?;
    if !model.has_capability(Capability::ChatBase) {
        return Err(AppError::BadRequest(format!(
            "model `{model_name}` does not support chat completions"
        )));
    }

    let n = req.n.max(1) as usize;
    let request_id = format!("chat-{}", Uuid::new_v4());
    let deadlines = Deadlines::default();
    let family = model.family;
    let endpoint = model.endpoint();

    if req.stream {
        let req = Arc::new(req);
        let streams = match family {
            PromptFamily::OpenAiCompatible => {
                openai_streams(services.http.clone(), model.clone(), model_name.clone(), req.clone(), n)
            }
            _ => {
                let prompt = serialize_prompt(family, &req);
                let base_params = base_generation_params(&model_name, &request_id, prompt, &req, true);
                tensor_streams(endpoint, base_params, deadlines, n)
            }
        };

        let body = sse_stream(identity, services, model_name, family, req, request_id, n, streams);
        return Ok(Sse::new(body).into_response());
    }

    let results = match family {
        PromptFamily::OpenAiCompatible => {
            run_openai_compatible_aggregated(&services.http, model, &model_name, &req, n).await?
        }
        _ => {
            let prompt = serialize_prompt(family, &req);
            let base_params = base_generation_params(&model_name, &request_id, prompt, &req, false);
            run_tensor_aggregated(&endpoint, &base_params, deadlines, n).await?
        }
    };

    let response = aggregated_response(&identity, &services, &model_name, &req, family, &request_id, results).await?;

    Ok(response.into_response())
}
