//! 核心层：引擎错误与解析结果

pub mod error;

pub use error::{EngineError, APOLOGY_REPLY};
