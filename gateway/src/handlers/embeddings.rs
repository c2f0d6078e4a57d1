//! `POST /v1/embeddings` — unary embedding generation. Encodes output as
//! either raw floats or little-endian float32 bytes, base64-wrapped.

use std::sync::Arc;

use axum::extract::State;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gateway_auth::GatewayIdentity;
use gateway_backend::EmbeddingClient;
use gateway_config::{Capability, ConfigRegistry};
use gateway_core::prelude::*;
use uuid::Uuid;

use crate::openai::{EmbeddingObject, EmbeddingValue, EmbeddingsRequest, EmbeddingsResponse, Usage};
use crate::usage::TokenCounter;
use crate::state::Services;

fn encode_row(row: Vec<f32>, base64_encoding: bool) -> EmbeddingValue {
    if !base64_encoding {
        return EmbeddingValue::Float(row);
    }
    let mut bytes = Vec::with_capacity(row.len() * 4);
    for value in &row {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    EmbeddingValue::Base64(BASE64.encode(bytes))
}

pub async fn create_embeddings(
    identity: GatewayIdentity,
    State(config): State<Arc<ConfigRegistry>>,
    State(token_counter): State<TokenCounter>,
    State(services): State<Services>,
    Json(req): Json<EmbeddingsRequest>,
) -> ApiResult<Json<EmbeddingsResponse>> {
    identity.require_scope("embeddings:base")?;

    let inputs = req.input.into_vec();
    if inputs.is_empty() {
        return Err(AppError::BadRequest("input must not be empty".into()));
    }

    let snapshot = config.snapshot();
    let model_name = req.model.rsplit('/').next().unwrap_or(&req.model);
    let model = snapshot
        .get_model(model_name)
        .map_err(|_| AppError::BadRequest(format!("unknown model `{model_name}`")))?;
    if !model.has_capability(Capability::EmbeddingsBase) {
        return Err(AppError::BadRequest(format!(
            "model `{model_name}` does not support embeddings"
        )));
    }

    let request_id = format!("embed-{}", Uuid::new_v4());
    let mut client = EmbeddingClient::connect(&model.endpoint())
        .await
        .map_err(AppError::from)?;
    let result = client
        .embed(model_name, &request_id, &inputs)
        .await
        .map_err(AppError::from)?;

    let base64_encoding = req.encoding_format.as_deref() == Some("base64");
    let data = result
        .embeddings
        .into_iter()
        .enumerate()
        .map(|(index, row)| EmbeddingObject {
            object: "embedding",
            index,
            embedding: encode_row(row, base64_encoding),
        })
        .collect();

    let prompt_tokens = if result.prompt_tokens > 0 {
        result.prompt_tokens
    } else {
        let joined = inputs.join(" ");
        token_counter.count(&joined).await
    };

    services
        .usage
        .record(crate::usage::build_row(
            "embeddings",
            identity.user_id,
            model_name,
            &request_id,
            prompt_tokens,
            None,
            Some(inputs.len() as i64),
            serde_json::Value::Null,
        ))
        .await;

    Ok(Json(EmbeddingsResponse {
        object: "list",
        data,
        model: model_name.to_string(),
        usage: Usage {
            prompt_tokens,
            completion_tokens: 0,
            total_tokens: prompt_tokens,
        },
    }))
}
