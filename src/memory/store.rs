//! 会话 / 用户记忆存储
//!
//! 两张独立可清空的表：session_id -> 有序轮次日志，user_id -> 去重事实集合。
//! 外层 RwLock<HashMap> 定位键，值为 Arc<Mutex<..>>：同键写串行，
//! 异键并发互不阻塞。另记 session -> 出现过的 user，供 reset 连带清除事实。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::turns::Turn;

/// 记忆存储：轮次日志 + 用户事实
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Vec<Turn>>>>>,
    facts: RwLock<HashMap<String, Arc<Mutex<Vec<String>>>>>,
    session_users: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn session_log(&self, session_id: &str) -> Arc<Mutex<Vec<Turn>>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(log) = sessions.get(session_id) {
                return Arc::clone(log);
            }
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Vec::new()))),
        )
    }

    async fn fact_set(&self, user_id: &str) -> Arc<Mutex<Vec<String>>> {
        {
            let facts = self.facts.read().await;
            if let Some(set) = facts.get(user_id) {
                return Arc::clone(set);
            }
        }
        let mut facts = self.facts.write().await;
        Arc::clone(
            facts
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Vec::new()))),
        )
    }

    /// 追加一条轮次（追加序即会话序，从不重排或删除单条）
    pub async fn append(&self, session_id: &str, turn: Turn) {
        let log = self.session_log(session_id).await;
        log.lock().await.push(turn);
    }

    /// 最近 limit 条轮次，按旧到新排列
    pub async fn history(&self, session_id: &str, limit: usize) -> Vec<Turn> {
        let log = self.session_log(session_id).await;
        let log = log.lock().await;
        let skip = log.len().saturating_sub(limit);
        log[skip..].to_vec()
    }

    /// 清空会话全部轮次；对空会话是 no-op
    pub async fn clear(&self, session_id: &str) {
        if let Some(log) = self.sessions.read().await.get(session_id) {
            log.lock().await.clear();
        }
    }

    /// 记录一条用户事实；按内容去重，后到的事实并存不做矛盾消解
    pub async fn remember(&self, user_id: &str, fact: impl Into<String>) {
        let fact = fact.into();
        let set = self.fact_set(user_id).await;
        let mut set = set.lock().await;
        if !set.iter().any(|f| f == &fact) {
            set.push(fact);
        }
    }

    /// 用户全部事实（记录顺序）
    pub async fn facts(&self, user_id: &str) -> Vec<String> {
        let set = self.fact_set(user_id).await;
        let set = set.lock().await;
        set.clone()
    }

    /// 清空用户全部事实；重复调用是 no-op
    pub async fn forget_all(&self, user_id: &str) {
        if let Some(set) = self.facts.read().await.get(user_id) {
            set.lock().await.clear();
        }
    }

    /// 记录 user 在 session 中出现过（reset 连带清除事实用）
    pub async fn note_user(&self, session_id: &str, user_id: &str) {
        self.session_users
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    /// 该会话关联过的全部 user id
    pub async fn users_of(&self, session_id: &str) -> Vec<String> {
        self.session_users
            .read()
            .await
            .get(session_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 全量导出（快照持久化用）
    pub async fn export(&self) -> (HashMap<String, Vec<Turn>>, HashMap<String, Vec<String>>) {
        let mut sessions = HashMap::new();
        for (id, log) in self.sessions.read().await.iter() {
            sessions.insert(id.clone(), log.lock().await.clone());
        }
        let mut facts = HashMap::new();
        for (id, set) in self.facts.read().await.iter() {
            facts.insert(id.clone(), set.lock().await.clone());
        }
        (sessions, facts)
    }

    /// 从快照整体恢复（覆盖现有内容）
    pub async fn import(
        &self,
        sessions: HashMap<String, Vec<Turn>>,
        facts: HashMap<String, Vec<String>>,
    ) {
        let mut s = self.sessions.write().await;
        s.clear();
        for (id, turns) in sessions {
            s.insert(id, Arc::new(Mutex::new(turns)));
        }
        drop(s);
        let mut f = self.facts.write().await;
        f.clear();
        for (id, set) in facts {
            f.insert(id, Arc::new(Mutex::new(set)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_preserves_append_order_and_limit() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.append("s1", Turn::user(format!("u{i}"))).await;
        }
        let hist = store.history("s1", 3).await;
        assert_eq!(hist.len(), 3);
        let contents: Vec<_> = hist.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["u2", "u3", "u4"]);
    }

    #[tokio::test]
    async fn history_never_exceeds_limit() {
        let store = MemoryStore::new();
        store.append("s1", Turn::user("only")).await;
        assert_eq!(store.history("s1", 10).await.len(), 1);
    }

    #[tokio::test]
    async fn clear_then_history_is_empty() {
        let store = MemoryStore::new();
        store.append("s1", Turn::user("hello")).await;
        store.clear("s1").await;
        assert!(store.history("s1", 10).await.is_empty());
        // 再次 clear 是 no-op
        store.clear("s1").await;
        store.clear("never-seen").await;
    }

    #[tokio::test]
    async fn facts_dedup_by_content() {
        let store = MemoryStore::new();
        store.remember("u1", "likes jazz").await;
        store.remember("u1", "likes jazz").await;
        store.remember("u1", "hates ads").await;
        assert_eq!(store.facts("u1").await, vec!["likes jazz", "hates ads"]);
    }

    #[tokio::test]
    async fn forget_all_twice_is_noop() {
        let store = MemoryStore::new();
        store.remember("u1", "likes jazz").await;
        store.forget_all("u1").await;
        assert!(store.facts("u1").await.is_empty());
        store.forget_all("u1").await;
        assert!(store.facts("u1").await.is_empty());
    }

    #[tokio::test]
    async fn session_user_association() {
        let store = MemoryStore::new();
        store.note_user("s1", "u1").await;
        store.note_user("s1", "u2").await;
        store.note_user("s1", "u1").await;
        let mut users = store.users_of("s1").await;
        users.sort();
        assert_eq!(users, vec!["u1", "u2"]);
    }
}
