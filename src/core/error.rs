//! 引擎错误类型
//!
//! NotFound / 多义匹配由引擎就地恢复为澄清回复，不会出现在这里；
//! 此处只保留让当次解析终止的致命错误，用户侧统一收到固定致歉语。

use thiserror::Error;

/// 解析失败时返回给用户的固定致歉语（原始语句仍会记入历史）
pub const APOLOGY_REPLY: &str =
    "Sorry, I ran into a problem. Please check the server connection and try again.";

/// 让当次解析进入 FAILED 的错误
#[derive(Error, Debug)]
pub enum EngineError {
    /// 预言机产出的工具调用不合法（未知工具、参数不符 schema 或违反硬约束），
    /// 纠正一次后再次违规则升级为此错误
    #[error("Invalid tool call: {0}")]
    InvalidToolCall(String),

    /// 工具调用轮数超过配置上限
    #[error("Iteration cap exceeded ({0})")]
    IterationCapExceeded(usize),

    /// 推理服务不可达或超时
    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// 控制面传输层故障（含超时），对当次解析致命
    #[error("Transport error: {0}")]
    Transport(String),

    /// 调用方取消了当次解析
    #[error("Cancelled")]
    Cancelled,
}
