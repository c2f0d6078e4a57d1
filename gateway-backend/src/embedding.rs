use tonic::transport::{Channel, Endpoint};

use crate::error::BackendError;
use crate::proto::generation_service_client::GenerationServiceClient;
use crate::proto::{InferTensor, ModelInferRequest};
use crate::tensor::bytes_tensor;

fn find_tensor<'a>(outputs: &'a [InferTensor], name: &str) -> Result<&'a InferTensor, BackendError> {
    outputs
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| BackendError::DecoderFailure(format!("missing output tensor `{name}`")))
}

pub struct EmbeddingResult {
    pub embeddings: Vec<Vec<f32>>,
    pub prompt_tokens: i64,
}

/// Client for unary embedding models: `input_text (bytes[1,K])` in,
/// `embeddings (float32[1,K,D])` and `prompt_tokens (int)` out.
pub struct EmbeddingClient {
    inner: GenerationServiceClient<Channel>,
}

impl EmbeddingClient {
    pub async fn connect(endpoint: &str) -> Result<Self, BackendError> {
        let channel = Endpoint::from_shared(format!("http://{endpoint}"))
            .map_err(|e| BackendError::Unreachable(e.to_string()))?
            .connect()
            .await?;
        Ok(Self {
            inner: GenerationServiceClient::new(channel),
        })
    }

    pub async fn embed(
        &mut self,
        model_name: &str,
        request_id: &str,
        inputs: &[String],
    ) -> Result<EmbeddingResult, BackendError> {
        let input_text = bytes_tensor(
            "input_text",
            inputs.iter().map(|s| s.as_bytes().to_vec()).collect(),
        );

        let response = self
            .inner
            .model_infer(ModelInferRequest {
                model_name: model_name.to_string(),
                request_id: request_id.to_string(),
                inputs: vec![input_text],
            })
            .await?
            .into_inner();

        let embeddings_tensor = find_tensor(&response.outputs, "embeddings")?;
        let prompt_tokens_tensor = find_tensor(&response.outputs, "prompt_tokens")?;

        let dims = match embeddings_tensor.shape.as_slice() {
            // [1, K, D]
            [_, k, d] => (*k as usize, *d as usize),
            _ => (inputs.len(), embeddings_tensor.fp32_contents.len() / inputs.len().max(1)),
        };
        let embeddings = embeddings_tensor
            .fp32_contents
            .chunks(dims.1.max(1))
            .take(dims.0)
            .map(|row| row.to_vec())
            .collect();

        let prompt_tokens = prompt_tokens_tensor
            .int_contents
            .first()
            .copied()
            .unwrap_or(0) as i64;

        Ok(EmbeddingResult {
            embeddings,
            prompt_tokens,
        })
    }
}
