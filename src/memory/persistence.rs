//! 记忆快照持久化
//!
//! 将两张表整体写入/读出单个 JSON 文件，用于跨进程恢复（可选使用）。
//! 文件不存在时加载为空，父目录不存在时自动创建。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::store::MemoryStore;
use super::turns::Turn;

#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    sessions: HashMap<String, Vec<Turn>>,
    facts: HashMap<String, Vec<String>>,
}

/// 单文件 JSON 快照
#[derive(Debug)]
pub struct MemoryPersistence {
    path: PathBuf,
}

impl MemoryPersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// 从快照文件恢复到 store；文件缺失时保持 store 原样
    pub async fn load_into(&self, store: &MemoryStore) -> anyhow::Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let data = std::fs::read_to_string(&self.path)?;
        let snapshot: Snapshot = serde_json::from_str(&data)?;
        store.import(snapshot.sessions, snapshot.facts).await;
        Ok(())
    }

    /// 将 store 全量写入快照文件
    pub async fn save(&self, store: &MemoryStore) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let (sessions, facts) = store.export().await;
        let snapshot = Snapshot { sessions, facts };
        std::fs::write(&self.path, serde_json::to_string_pretty(&snapshot)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("memory.json");
        let persistence = MemoryPersistence::new(&path);

        let store = MemoryStore::new();
        store.append("s1", Turn::user("hello")).await;
        store.remember("u1", "likes jazz").await;
        persistence.save(&store).await.unwrap();

        let restored = MemoryStore::new();
        persistence.load_into(&restored).await.unwrap();
        assert_eq!(restored.history("s1", 10).await.len(), 1);
        assert_eq!(restored.facts("u1").await, vec!["likes jazz"]);
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = MemoryPersistence::new(dir.path().join("absent.json"));
        let store = MemoryStore::new();
        persistence.load_into(&store).await.unwrap();
        assert!(store.history("any", 10).await.is_empty());
    }
}
