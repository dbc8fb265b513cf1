//! 预言机层：推理组件抽象与实现（OpenAI 兼容 / Mock）及决策解析

pub mod adapter;
pub mod mock;
pub mod openai;
pub mod traits;

pub use adapter::{parse_decision, Decision, OracleAdapter, ToolCall};
pub use mock::MockOracleClient;
pub use openai::OpenAiOracle;
pub use traits::{OracleClient, OracleError};
