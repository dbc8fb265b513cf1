//! 预言机适配器：上下文拼装与决策解析
//!
//! decide 将固定策略文本（含工具 schema）作为 system、历史与观察作为消息
//! 调用客户端，在超时内取回文本并解析为 Decision：JSON 工具调用或最终回复。
//! 解析规则沿用 `{"tool": "...", "args": {...}}` 简化格式。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::memory::Turn;
use crate::oracle::{OracleClient, OracleError};

/// 预言机请求的工具调用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// 一次决策：要么请求一个工具调用，要么给出最终回复
#[derive(Debug, Clone)]
pub enum Decision {
    ToolCall(ToolCall),
    Final(String),
}

/// 解析预言机输出
///
/// ```json 围栏内必须是合法工具调用；裸文本中的 `{...}` 尝试按工具调用解析，
/// 失败或缺少 tool 字段时整体视作最终回复（普通行文可以含花括号）。
pub fn parse_decision(output: &str) -> Result<Decision, OracleError> {
    let trimmed = output.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let inner = rest
            .find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim());
        let call: ToolCall = serde_json::from_str(inner)
            .map_err(|e| OracleError::Malformed(format!("{e}: {inner}")))?;
        if call.tool.is_empty() {
            return Err(OracleError::Malformed("empty tool name".to_string()));
        }
        return Ok(Decision::ToolCall(call));
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(call) = serde_json::from_str::<ToolCall>(&trimmed[start..=end]) {
                if !call.tool.is_empty() {
                    return Ok(Decision::ToolCall(call));
                }
            }
        }
    }

    Ok(Decision::Final(trimmed.to_string()))
}

/// 预言机适配器：持有客户端与单次调用超时
pub struct OracleAdapter {
    client: Arc<dyn OracleClient>,
    request_timeout: Duration,
}

impl OracleAdapter {
    pub fn new(client: Arc<dyn OracleClient>, request_timeout_secs: u64) -> Self {
        Self {
            client,
            request_timeout: Duration::from_secs(request_timeout_secs),
        }
    }

    /// 单次决策：system = 策略文本，turns = 历史 + 当前语句 + 待消化的观察
    pub async fn decide(&self, policy: &str, turns: &[Turn]) -> Result<Decision, OracleError> {
        let mut full = vec![Turn::system(policy)];
        full.extend_from_slice(turns);

        let output = timeout(self.request_timeout, self.client.complete(&full))
            .await
            .map_err(|_| OracleError::Unavailable("request timed out".to_string()))??;

        parse_decision(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_parses_as_tool_call() {
        let out = "Let me check.\n```json\n{\"tool\": \"search\", \"args\": {\"kind\": \"track\", \"query\": \"x radio\"}}\n```";
        match parse_decision(out).unwrap() {
            Decision::ToolCall(call) => {
                assert_eq!(call.tool, "search");
                assert_eq!(call.args["kind"], "track");
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn bare_json_parses_as_tool_call() {
        let out = r#"{"tool": "pause", "args": {}}"#;
        assert!(matches!(
            parse_decision(out).unwrap(),
            Decision::ToolCall(call) if call.tool == "pause"
        ));
    }

    #[test]
    fn prose_with_braces_is_final() {
        let out = "Your playlist {Workout} has 12 songs.";
        assert!(matches!(parse_decision(out).unwrap(), Decision::Final(_)));
    }

    #[test]
    fn plain_text_is_final() {
        assert!(matches!(
            parse_decision("Paused the music for you.").unwrap(),
            Decision::Final(text) if text.contains("Paused")
        ));
    }

    #[test]
    fn malformed_fenced_json_is_error() {
        let out = "```json\n{\"tool\": \"search\",\n```";
        assert!(parse_decision(out).is_err());
    }
}
