//! `POST /v1/audio/transcriptions` — multipart upload, single-shot gRPC
//! infer against the audio model.

use std::sync::Arc;

use axum::extract::State;
use gateway_auth::GatewayIdentity;
use gateway_backend::AudioClient;
use gateway_config::{Capability, ConfigRegistry};
use gateway_core::multipart::TypedMultipart;
use gateway_core::prelude::*;
use uuid::Uuid;

use crate::openai::TranscriptionResponse;
use crate::state::Services;

pub async fn transcribe(
    identity: GatewayIdentity,
    State(config): State<Arc<ConfigRegistry>>,
    State(services): State<Services>,
    TypedMultipart(mut fields): TypedMultipart,
) -> ApiResult<Json<TranscriptionResponse>> {
    identity.require_scope("audio:transcribe")?;

    let model_field = fields.take_text("model").map_err(|e| AppError::BadRequest(e.to_string()))?;
    let file = fields.take_file("file").map_err(|e| AppError::BadRequest(e.to_string()))?;
    if file.is_empty() {
        return Err(AppError::BadRequest("uploaded audio file is empty".into()));
    }

    let snapshot = config.snapshot();
    let model_name = model_field.rsplit('/').next().unwrap_or(&model_field);
    let model = snapshot
        .get_model(model_name)
        .map_err(|_| AppError::BadRequest(format!("unknown model `{model_name}`")))?;
    if !model.has_capability(Capability::AudioTranscription) {
        return Err(AppError::BadRequest(format!(
            "model `{model_name}` does not support audio transcription"
        )));
    }

    let request_id = format!("audio-{}", Uuid::new_v4());
    let mut client = AudioClient::connect(&model.endpoint()).await.map_err(AppError::from)?;
    let text = client
        .transcribe(model_name, &request_id, file.data.to_vec())
        .await
        .map_err(AppError::from)?;

    let completion_tokens = services.token_counter.count(&text).await;
    services
        .usage
        .record(crate::usage::build_row(
            "audio",
            identity.user_id,
            model_name,
            &request_id,
            0,
            Some(completion_tokens),
            Some(1),
            serde_json::Value::Null,
        ))
        .await;

    Ok(Json(TranscriptionResponse { text }))
}
