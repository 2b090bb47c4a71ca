pub mod contract;
pub mod idea;
pub mod openai;
pub mod providers;

pub use contract::{ContractError, MemeIdea, parse_meme_idea};
pub use idea::{FixedIdeaGenerator, IdeaError, IdeaGenerator, LlmIdeaGenerator};
pub use openai::OpenAiProvider;
pub use providers::{ChatMessage, ChatRole, LlmProvider, LlmRequest, LlmResponse, Usage};
