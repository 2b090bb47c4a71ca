pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{
    AppConfig, CacheConfig, DatabaseConfig, FaceSwapConfig, HistoryConfig, LlmConfig,
    MediaConfig, MetricsConfig, ReactionTrigger, SearchConfig, TelegramConfig, TriggerConfig,
};
