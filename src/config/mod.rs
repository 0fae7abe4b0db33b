pub mod schema;

#[allow(unused_imports)]
pub use schema::{AgentConfig, CheckpointConfig, Config, ConversationConfig, ToolsConfig};
