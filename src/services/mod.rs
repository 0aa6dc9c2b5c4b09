pub mod ai_assistant;
pub mod artifact_writer;
pub mod cache_gateway;
pub mod extractor;
pub mod url_normalizer;

pub use ai_assistant::{AiAssistant, OpenAiAssistant};
pub use cache_gateway::CacheGateway;
pub use url_normalizer::{normalize, NormalizedUrl};
