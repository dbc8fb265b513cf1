//! Mock 预言机（用于测试，无需 API）
//!
//! 按脚本顺序吐出预置的原始输出（JSON 工具调用或纯文本回复）；
//! 脚本耗尽后返回固定的兜底回复，便于测试在有限步内收敛。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::memory::Turn;
use crate::oracle::{OracleClient, OracleError};

enum Scripted {
    Output(String),
    Failure(String),
}

/// 脚本化 Mock 客户端
pub struct MockOracleClient {
    script: Mutex<VecDeque<Scripted>>,
    fallback: String,
}

impl Default for MockOracleClient {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: "Okay.".to_string(),
        }
    }
}

impl MockOracleClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条脚本输出（原始文本，可以是 JSON 工具调用）
    pub fn push(&self, raw: impl Into<String>) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Scripted::Output(raw.into()));
    }

    /// 追加一次 Unavailable 失败
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Scripted::Failure(reason.into()));
    }

    /// 尚未消费的脚本条数
    pub fn remaining(&self) -> usize {
        self.script.lock().expect("script lock").len()
    }
}

#[async_trait]
impl OracleClient for MockOracleClient {
    async fn complete(&self, _turns: &[Turn]) -> Result<String, OracleError> {
        match self.script.lock().expect("script lock").pop_front() {
            Some(Scripted::Output(raw)) => Ok(raw),
            Some(Scripted::Failure(reason)) => Err(OracleError::Unavailable(reason)),
            None => Ok(self.fallback.clone()),
        }
    }
}
