//! 解析状态机主循环
//!
//! START -> REASONING -> (TOOL_EXEC -> REASONING)* -> DONE | FAILED。
//! 每轮把策略文本 + 历史 + 观察交给预言机，取回工具调用则先过 schema
//! 校验与策略审查（违规调用不执行，纠正一次后再犯即 FAILED），再派发到
//! 控制面并把结果写回上下文。迭代上限与致命错误统一落到固定致歉回复，
//! 原始语句仍由控制器记入历史。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::EngineSection;
use crate::core::{EngineError, APOLOGY_REPLY};
use crate::memory::Turn;
use crate::oracle::{Decision, OracleAdapter, OracleError, ToolCall};
use crate::surface::{ControlSurface, SurfaceError};

use super::context::ResolutionContext;
use super::dispatch::dispatch;
use super::policy::{self, EngineAction, Verdict};
use super::schema::{self, SurfaceOp};
use super::shape::RequestShape;

/// 固定策略文本：工具清单与用户事实在 build_policy 里追加。
/// 硬约束同时由引擎校验兜底，这里的措辞只是让预言机少走弯路。
const POLICY_TEXT: &str = "\
You are a music assistant that controls playback and playlists through a fixed set of tools.

To call a tool, reply with EXACTLY one JSON object: {\"tool\": \"<name>\", \"args\": {...}}.
To answer the user, reply with plain text instead. Never mix the two in one reply.

Rules:
- Users speak natural language and never provide URIs. Resolve every name through search or \
list tools and only ever use uris taken from those results ({domain}:track:<id> and similar).
- To play a song when no playlist was named, search tracks for \"<song name> radio\" and play \
the first result.
- When the user says \"my playlist\", look for playlists owned by '{owner}' first; if none \
match, list the user's own playlists; only if still none, search playlists globally.
- To play a song from a specific playlist, first fetch that playlist's contents. If the song is \
in it, start the playlist, queue that song again, then skip to it. If it is not in it, never \
search globally or play a substitute; tell the user and offer songs that are actually there.
- For questions about a track, album, artist or playlist, search it by name, then call get_info \
with the uri from the result.
- If several results match a name, list at most 3 and ask the user to choose; do not pick one \
on your own.
- Be polite and concise; confirm important actions.";

/// 拼装当次解析的 system 文本：策略 + 工具清单 + 用户长期事实
fn build_policy(cfg: &EngineSection, facts: &[String]) -> String {
    let mut text = POLICY_TEXT
        .replace("{owner}", &cfg.default_owner_name)
        .replace("{domain}", &cfg.uri_domain);
    text.push_str("\n\nAvailable tools:\n");
    text.push_str(&schema::schema_json());
    if !facts.is_empty() {
        text.push_str("\n\nKnown facts about this user:\n");
        for fact in facts {
            text.push_str("- ");
            text.push_str(fact);
            text.push('\n');
        }
    }
    text
}

/// 工具调用及其观察写回上下文（供下一轮推理使用）
fn push_tool_turns(turns: &mut Vec<Turn>, call: &ToolCall, observation: &str) {
    turns.push(Turn::assistant(format!(
        "Tool call: {} | Args: {}",
        call.tool, call.args
    )));
    turns.push(Turn::user(format!(
        "Observation from {}: {}",
        call.tool, observation
    )));
}

/// 引擎自行驱动的调用（严格序列、强制暂停）写回上下文
fn push_engine_turns(turns: &mut Vec<Turn>, name: &str, observation: &str) {
    turns.push(Turn::assistant(format!("Tool call: {name} | Args: {{}}")));
    turns.push(Turn::user(format!("Observation from {name}: {observation}")));
}

/// 一次解析的结果：总有用户可见回复；失败时附带原因供日志与调用方判断
pub struct ResolutionOutcome {
    pub reply: String,
    pub failure: Option<EngineError>,
}

impl ResolutionOutcome {
    fn done(reply: String) -> Self {
        Self {
            reply,
            failure: None,
        }
    }

    fn failed(err: EngineError) -> Self {
        tracing::error!(error = %err, "resolution failed");
        Self {
            reply: APOLOGY_REPLY.to_string(),
            failure: Some(err),
        }
    }
}

/// 解析引擎：预言机适配器 + 控制面 + 策略配置
pub struct ResolutionEngine {
    surface: Arc<dyn ControlSurface>,
    adapter: OracleAdapter,
    cfg: EngineSection,
}

impl ResolutionEngine {
    pub fn new(surface: Arc<dyn ControlSurface>, adapter: OracleAdapter, cfg: EngineSection) -> Self {
        Self {
            surface,
            adapter,
            cfg,
        }
    }

    /// 解析一条语句：facts 为长期事实前言，history 为最近 N 轮。
    /// 取消在当前在途远端调用结束后生效；已发出的工具调用不回滚。
    pub async fn resolve(
        &self,
        facts: &[String],
        history: &[Turn],
        utterance: &str,
        cancel: CancellationToken,
    ) -> ResolutionOutcome {
        let mut ctx = ResolutionContext::new(RequestShape::classify(utterance));
        let policy_text = build_policy(&self.cfg, facts);
        let deadline = Duration::from_secs(self.cfg.tool_timeout_secs);

        let mut turns: Vec<Turn> = history.to_vec();
        turns.push(Turn::user(utterance));

        tracing::debug!(resolution = %ctx.id, shape = ?ctx.shape, "resolution started");

        loop {
            if cancel.is_cancelled() {
                return ResolutionOutcome::failed(EngineError::Cancelled);
            }
            if ctx.iterations >= self.cfg.max_tool_iterations {
                return ResolutionOutcome::failed(EngineError::IterationCapExceeded(
                    self.cfg.max_tool_iterations,
                ));
            }
            ctx.iterations += 1;

            let decision = match self.adapter.decide(&policy_text, &turns).await {
                Ok(decision) => decision,
                Err(OracleError::Malformed(reason)) => {
                    tracing::warn!(resolution = %ctx.id, %reason, "malformed oracle output");
                    if !ctx.note_rejection() {
                        return ResolutionOutcome::failed(EngineError::InvalidToolCall(reason));
                    }
                    turns.push(Turn::user(format!(
                        "Your last reply could not be parsed ({reason}). Reply with exactly one \
                         JSON object {{\"tool\": ..., \"args\": ...}} or a plain-text answer."
                    )));
                    continue;
                }
                Err(OracleError::Unavailable(reason)) => {
                    return ResolutionOutcome::failed(EngineError::OracleUnavailable(reason));
                }
            };

            let call = match decision {
                Decision::Final(text) => {
                    tracing::debug!(resolution = %ctx.id, iterations = ctx.iterations, "resolution done");
                    return ResolutionOutcome::done(text);
                }
                Decision::ToolCall(call) => call,
            };

            let op = match schema::parse_call(&call) {
                Ok(op) => op,
                Err(reason) => {
                    tracing::warn!(resolution = %ctx.id, tool = %call.tool, %reason, "invalid tool call");
                    if !ctx.note_rejection() {
                        return ResolutionOutcome::failed(EngineError::InvalidToolCall(reason));
                    }
                    turns.push(Turn::user(format!(
                        "Tool call rejected: {reason}. Use only the declared tools with their \
                         declared arguments."
                    )));
                    continue;
                }
            };

            if let Verdict::Reject { rule, correction } = policy::review(&ctx, &op, &self.cfg) {
                tracing::warn!(resolution = %ctx.id, tool = op.name(), rule, "tool call rejected by policy");
                if !ctx.note_rejection() {
                    return ResolutionOutcome::failed(EngineError::InvalidToolCall(format!(
                        "{rule}: repeated violation"
                    )));
                }
                turns.push(Turn::user(format!("Tool call rejected ({rule}): {correction}")));
                continue;
            }

            let outcome = match dispatch(self.surface.as_ref(), &op, deadline).await {
                Ok(outcome) => outcome,
                Err(SurfaceError::Transport(reason)) => {
                    return ResolutionOutcome::failed(EngineError::Transport(reason));
                }
                Err(err) => {
                    // NotFound 等非致命错误作为合成观察写回，由预言机向用户解释
                    push_tool_turns(&mut turns, &call, &format!("Error: {err}"));
                    continue;
                }
            };

            match policy::after(&mut ctx, &op, &outcome) {
                EngineAction::Continue => {
                    push_tool_turns(&mut turns, &call, &outcome.observation());
                }
                EngineAction::StopWith(reply) => {
                    tracing::debug!(resolution = %ctx.id, "resolution stopped by engine");
                    return ResolutionOutcome::done(reply);
                }
                EngineAction::PauseAndStop(reply) => {
                    if ctx.playback_started {
                        match dispatch(self.surface.as_ref(), &SurfaceOp::Pause, deadline).await {
                            Err(SurfaceError::Transport(reason)) => {
                                return ResolutionOutcome::failed(EngineError::Transport(reason));
                            }
                            _ => {}
                        }
                    }
                    return ResolutionOutcome::done(reply);
                }
                EngineAction::StrictSequence { playlist, track } => {
                    push_tool_turns(&mut turns, &call, &outcome.observation());
                    // 原始语义保持原样：整单开播，再把目标曲目排进队列，然后跳过一首，
                    // 让目标曲目成为当前播放（目标曲目在队列中出现两次）
                    let steps = [
                        SurfaceOp::Play { uri: playlist },
                        SurfaceOp::QueueAdd { uri: track },
                        SurfaceOp::SkipNext,
                    ];
                    for step in &steps {
                        match dispatch(self.surface.as_ref(), step, deadline).await {
                            Ok(step_outcome) => {
                                if matches!(step, SurfaceOp::Play { .. }) {
                                    ctx.playback_started = true;
                                }
                                push_engine_turns(
                                    &mut turns,
                                    step.name(),
                                    &step_outcome.observation(),
                                );
                            }
                            Err(SurfaceError::Transport(reason)) => {
                                return ResolutionOutcome::failed(EngineError::Transport(reason));
                            }
                            Err(err) => {
                                push_engine_turns(&mut turns, step.name(), &format!("Error: {err}"));
                            }
                        }
                    }
                    ctx.reply_only = true;
                    turns.push(Turn::user(
                        "The requested song was found in the playlist; the playlist was started, \
                         the song queued again and playback skipped to it. Confirm this to the \
                         user in one short sentence."
                            .to_string(),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MockOracleClient;
    use crate::surface::MockSurface;

    fn engine_with(
        oracle: Arc<MockOracleClient>,
        surface: Arc<MockSurface>,
        cfg: EngineSection,
    ) -> ResolutionEngine {
        ResolutionEngine::new(surface, OracleAdapter::new(oracle, 5), cfg)
    }

    #[tokio::test]
    async fn iteration_cap_fails_with_apology() {
        let oracle = Arc::new(MockOracleClient::new());
        for _ in 0..5 {
            oracle.push(r#"{"tool": "pause", "args": {}}"#);
        }
        let surface = Arc::new(MockSurface::new("spotify", "user"));
        let cfg = EngineSection {
            max_tool_iterations: 3,
            ..EngineSection::default()
        };
        let engine = engine_with(oracle, surface, cfg);
        let outcome = engine
            .resolve(&[], &[], "keep pausing", CancellationToken::new())
            .await;
        assert!(matches!(
            outcome.failure,
            Some(EngineError::IterationCapExceeded(3))
        ));
        assert_eq!(outcome.reply, APOLOGY_REPLY);
    }

    #[tokio::test]
    async fn unknown_tool_twice_escalates() {
        let oracle = Arc::new(MockOracleClient::new());
        oracle.push(r#"{"tool": "teleport", "args": {}}"#);
        oracle.push(r#"{"tool": "teleport", "args": {}}"#);
        let surface = Arc::new(MockSurface::new("spotify", "user"));
        let engine = engine_with(oracle, surface, EngineSection::default());
        let outcome = engine
            .resolve(&[], &[], "do something", CancellationToken::new())
            .await;
        assert!(matches!(
            outcome.failure,
            Some(EngineError::InvalidToolCall(_))
        ));
    }

    #[tokio::test]
    async fn oracle_failure_is_fatal_with_apology() {
        let oracle = Arc::new(MockOracleClient::new());
        oracle.push_failure("connection refused");
        let surface = Arc::new(MockSurface::new("spotify", "user"));
        let engine = engine_with(oracle, surface, EngineSection::default());
        let outcome = engine
            .resolve(&[], &[], "hello", CancellationToken::new())
            .await;
        assert!(matches!(
            outcome.failure,
            Some(EngineError::OracleUnavailable(_))
        ));
        assert_eq!(outcome.reply, APOLOGY_REPLY);
    }

    #[tokio::test]
    async fn final_answer_passes_through() {
        let oracle = Arc::new(MockOracleClient::new());
        oracle.push("Paused the music for you.");
        let surface = Arc::new(MockSurface::new("spotify", "user"));
        let engine = engine_with(oracle, surface, EngineSection::default());
        let outcome = engine
            .resolve(&[], &[], "thanks", CancellationToken::new())
            .await;
        assert!(outcome.failure.is_none());
        assert_eq!(outcome.reply, "Paused the music for you.");
    }
}
