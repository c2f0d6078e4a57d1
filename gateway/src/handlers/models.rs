//! `GET /v1/models` — lists configured models whose capability set
//! intersects the caller's scopes (admin sees all).

use std::sync::Arc;

use axum::extract::State;
use gateway_auth::GatewayIdentity;
use gateway_config::{Capability, ConfigRegistry};
use gateway_core::prelude::*;

use crate::openai::{ModelObject, ModelsResponse};

fn capability_scope(cap: Capability) -> &'static str {
    match cap {
        Capability::ChatBase => "chat:base",
        Capability::EmbeddingsBase => "embeddings:base",
        Capability::AudioTranscription => "audio:transcribe",
        Capability::Vision => "chat:base",
    }
}

pub async fn list_models(
    identity: GatewayIdentity,
    State(config): State<Arc<ConfigRegistry>>,
) -> ApiResult<Json<ModelsResponse>> {
    identity.require_scope("models:read")?;

    let snapshot = config.snapshot();
    let now = chrono::Utc::now().timestamp();

    let data = snapshot
        .models
        .iter()
        .filter(|(_, model)| {
            identity.is_admin()
                || model
                    .capabilities
                    .iter()
                    .any(|cap| identity.has_scope(capability_scope(*cap)))
        })
        .map(|(name, _)| ModelObject {
            id: name.clone(),
            object: "model",
            created: now,
            owned_by: "inference-gateway",
        })
        .collect();

    Ok(Json(ModelsResponse {
        object: "list",
        data,
    }))
}
