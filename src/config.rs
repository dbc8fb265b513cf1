//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MUSE__*` 覆盖（双下划线表示嵌套，如 `MUSE__LLM__MODEL=gpt-4o-mini`）。

use serde::Deserialize;
use std::path::PathBuf;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub memory: MemorySection,
}

/// [app] 段：应用名、会话历史窗口
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 构建预言机上下文时保留的最近轮次数
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            history_window: default_history_window(),
        }
    }
}

fn default_history_window() -> usize {
    10
}

/// [engine] 段：迭代上限、默认歌单所有者、控制面调用超时、URI 域
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// 单条语句允许的最大工具调用轮数，超过则判定失败
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    /// "my playlist" 解析第一步查找的所有者名
    #[serde(default = "default_owner_name")]
    pub default_owner_name: String,
    /// 单次控制面调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// 规范 URI 的域前缀（<domain>:<kind>:<id>）
    #[serde(default = "default_uri_domain")]
    pub uri_domain: String,
}

fn default_max_tool_iterations() -> usize {
    12
}

fn default_owner_name() -> String {
    "jawahar".to_string()
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_uri_domain() -> String {
    "spotify".to_string()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            default_owner_name: default_owner_name(),
            tool_timeout_secs: default_tool_timeout_secs(),
            uri_domain: default_uri_domain(),
        }
    }
}

/// [llm] 段：预言机后端与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [memory] 段：可选的 JSON 快照路径（未设置时纯内存）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MemorySection {
    pub snapshot_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            engine: EngineSection::default(),
            llm: LlmSection::default(),
            memory: MemorySection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 MUSE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MUSE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MUSE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
