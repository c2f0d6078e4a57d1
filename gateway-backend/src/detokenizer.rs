use tonic::transport::{Channel, Endpoint};

use crate::error::BackendError;
use crate::proto::detokenize_service_client::DetokenizeServiceClient;
use crate::proto::DetokenizeRequest;

/// Client for the `tokenizer` model: turns placeholder token ids back
/// into UTF-8 bytes for the [`Reassembler`](crate::reassembly::Reassembler).
/// One instance per request, torn down alongside the chat stream.
pub struct DetokenizerClient {
    inner: DetokenizeServiceClient<Channel>,
}

impl DetokenizerClient {
    pub async fn connect(endpoint: &str) -> Result<Self, BackendError> {
        let channel = Endpoint::from_shared(format!("http://{endpoint}"))
            .map_err(|e| BackendError::Unreachable(e.to_string()))?
            .connect()
            .await?;
        Ok(Self {
            inner: DetokenizeServiceClient::new(channel),
        })
    }

    pub async fn detokenize(&mut self, tokens: Vec<i32>) -> Result<String, BackendError> {
        let response = self
            .inner
            .detokenize(DetokenizeRequest { tokens })
            .await?
            .into_inner();
        String::from_utf8(response.output)
            .map_err(|e| BackendError::DecoderFailure(e.to_string()))
    }
}
