//! 会话控制器
//!
//! handle(user_id, session_id, utterance) -> reply：取会话锁（同一会话的
//! 第二条语句阻塞到第一次解析收尾，避免工具调用交错破坏严格匹配不变量），
//! 读事实与最近历史，先记入用户轮次再跑解析引擎，最后记入助手轮次。
//! 失败路径同样产出固定致歉回复且语句已落历史。reset 清会话轮次并连带
//! 清除该会话出现过的用户的事实；两者也可经 clear_history / forget_user
//! 单独清除。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::core::EngineError;
use crate::engine::ResolutionEngine;
use crate::memory::{MemoryStore, Turn};

/// 从语句中提取「remember: xxx」/「记住：xxx」类内容，写入用户事实
fn extract_remember_content(input: &str) -> Option<String> {
    let input = input.trim();
    let lower = input.to_lowercase();
    let (idx, key_len) = if let Some(i) = lower.find("remember") {
        (i, "remember".len())
    } else if let Some(i) = input.find("记住") {
        (i, "记住".len())
    } else {
        return None;
    };
    let after = input.get(idx + key_len..)?;
    let sep = after.find('：').or_else(|| after.find(':'))?;
    let content = after.get(sep + 1..)?.trim();
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

/// 会话控制器：记忆 + 引擎 + 按会话串行锁
pub struct SessionController {
    store: Arc<MemoryStore>,
    engine: ResolutionEngine,
    history_window: usize,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionController {
    pub fn new(store: Arc<MemoryStore>, engine: ResolutionEngine, history_window: usize) -> Self {
        Self {
            store,
            engine,
            history_window,
            locks: RwLock::new(HashMap::new()),
        }
    }

    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(session_id) {
                return Arc::clone(lock);
            }
        }
        let mut locks = self.locks.write().await;
        Arc::clone(
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// 处理一条语句并返回回复
    ///
    /// 同一会话内严格串行；不同会话并发互不阻塞。取消或失败时已发出的
    /// 工具调用（如已开播的歌单）不回滚。
    pub async fn handle(
        &self,
        user_id: &str,
        session_id: &str,
        utterance: &str,
    ) -> Result<String, EngineError> {
        self.handle_with_cancel(user_id, session_id, utterance, CancellationToken::new())
            .await
    }

    /// 同 handle，但允许调用方持有取消令牌
    pub async fn handle_with_cancel(
        &self,
        user_id: &str,
        session_id: &str,
        utterance: &str,
        cancel: CancellationToken,
    ) -> Result<String, EngineError> {
        let lock = self.session_lock(session_id).await;
        let _serialized = lock.lock().await;

        self.store.note_user(session_id, user_id).await;

        // 上下文取在本条语句入库之前，避免语句在历史中出现两次
        let facts = self.store.facts(user_id).await;
        let history = self.store.history(session_id, self.history_window).await;

        self.store.append(session_id, Turn::user(utterance)).await;

        // 显式用户事实：「remember: xxx」随语句立即入库
        if let Some(fact) = extract_remember_content(utterance) {
            self.store.remember(user_id, fact).await;
        }

        let outcome = self.engine.resolve(&facts, &history, utterance, cancel).await;

        self.store
            .append(session_id, Turn::assistant(outcome.reply.clone()))
            .await;

        Ok(outcome.reply)
    }

    /// 清空会话轮次，并连带清除该会话出现过的用户的全部事实；幂等
    pub async fn reset(&self, session_id: &str) {
        for user_id in self.store.users_of(session_id).await {
            self.store.forget_all(&user_id).await;
        }
        self.store.clear(session_id).await;
    }

    /// 只清会话轮次，不动用户事实
    pub async fn clear_history(&self, session_id: &str) {
        self.store.clear(session_id).await;
    }

    /// 只清某用户的事实，不动会话轮次
    pub async fn forget_user(&self, user_id: &str) {
        self.store.forget_all(user_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_extraction() {
        assert_eq!(
            extract_remember_content("Remember: I prefer lo-fi in the evening"),
            Some("I prefer lo-fi in the evening".to_string())
        );
        assert_eq!(
            extract_remember_content("记住：健身时放快歌"),
            Some("健身时放快歌".to_string())
        );
        assert_eq!(extract_remember_content("play my chill playlist"), None);
        assert_eq!(extract_remember_content("remember:"), None);
    }
}
