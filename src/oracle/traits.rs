//! 预言机客户端抽象
//!
//! 推理组件（外部语言理解能力）对本 crate 只是一个黑盒：给定消息序列，
//! 返回一段文本。客户端在两次调用之间无状态，全部上下文每次显式传入。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Turn;

/// 预言机调用错误
#[derive(Error, Debug)]
pub enum OracleError {
    /// 推理服务不可达或超时；适配器不重试，直接上抛给解析引擎
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    /// 输出声明为工具调用但无法解析
    #[error("Malformed oracle output: {0}")]
    Malformed(String),
}

/// 预言机客户端 trait：非流式完成
#[async_trait]
pub trait OracleClient: Send + Sync {
    async fn complete(&self, turns: &[Turn]) -> Result<String, OracleError>;
}
