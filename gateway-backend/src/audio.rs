use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tonic::transport::{Channel, Endpoint};

use crate::error::BackendError;
use crate::proto::generation_service_client::GenerationServiceClient;
use crate::proto::ModelInferRequest;
use crate::tensor::bytes_tensor;

/// Client for the unary audio transcription model: `input.audio (bytes[1])`
/// in (the raw audio bytes, base64-encoded before tensoring), `output.text
/// (bytes[1])` out.
pub struct AudioClient {
    inner: GenerationServiceClient<Channel>,
}

impl AudioClient {
    pub async fn connect(endpoint: &str) -> Result<Self, BackendError> {
        let channel = Endpoint::from_shared(format!("http://{endpoint}"))
            .map_err(|e| BackendError::Unreachable(e.to_string()))?
            .connect()
            .await?;
        Ok(Self {
            inner: GenerationServiceClient::new(channel),
        })
    }

    pub async fn transcribe(
        &mut self,
        model_name: &str,
        request_id: &str,
        audio_bytes: Vec<u8>,
    ) -> Result<String, BackendError> {
        let encoded = BASE64.encode(audio_bytes).into_bytes();
        let input = bytes_tensor("input.audio", vec![encoded]);

        let response = self
            .inner
            .model_infer(ModelInferRequest {
                model_name: model_name.to_string(),
                request_id: request_id.to_string(),
                inputs: vec![input],
            })
            .await?
            .into_inner();

        let output = response
            .outputs
            .iter()
            .find(|t| t.name == "output.text")
            .ok_or_else(|| BackendError::DecoderFailure("missing output.text tensor".into()))?;

        let bytes = output
            .bytes_contents
            .first()
            .ok_or_else(|| BackendError::DecoderFailure("empty output.text tensor".into()))?;

        String::from_utf8(bytes.clone()).map_err(|e| BackendError::DecoderFailure(e.to_string()))
    }
}
