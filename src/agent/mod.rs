pub mod classifier;
pub mod domain;
pub mod loop_;
pub mod prompt;
pub mod roster;
pub mod traits;

#[allow(unused_imports)]
pub use classifier::LlmClassifier;
#[allow(unused_imports)]
pub use domain::DomainAgent;
#[allow(unused_imports)]
pub use loop_::{run_tool_loop, LoopLimits};
pub use roster::AgentRoster;
pub use traits::{Agent, Category, QueryClassifier};
