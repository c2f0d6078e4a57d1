//! gRPC client for the inference backend's tensor streaming protocol:
//! chat/embedding/audio generation, the `tokenizer` detokenizer model,
//! and the `counter` token-counting model. One client instance per
//! logical request; streams are never shared across requests.

mod audio;
mod chat;
mod counter;
mod detokenizer;
mod embedding;
mod error;
mod params;
mod parallel;
mod reassembly;
mod tensor;

pub mod proto {
    include!(concat!(env!("OUT_DIR"), "/gateway.backend.v1.rs"));
}

pub use audio::AudioClient;
pub use chat::{ChatClient, ChatEvent, StopReason};
pub use counter::{estimate_tokens, CounterClient};
pub use detokenizer::DetokenizerClient;
pub use embedding::{EmbeddingClient, EmbeddingResult};
pub use error::BackendError;
pub use params::{Deadlines, GenerationParams};
pub use parallel::{collect, generate_parallel, keep_successes, GenerationOutcome};
pub use reassembly::Reassembler;

pub mod prelude {
    pub use crate::{
        AudioClient, BackendError, ChatClient, ChatEvent, CounterClient, Deadlines,
        DetokenizerClient, EmbeddingClient, GenerationOutcome, GenerationParams, StopReason,
    };
}
