//! Muse - Rust 音乐对话智能体
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 引擎错误类型与解析结果
//! - **surface**: 远端音乐控制面的类型化接口（搜索 / 播放 / 歌单 / 元数据）
//! - **memory**: 会话轮次日志与用户长期事实，JSON 快照持久化
//! - **oracle**: 推理预言机抽象与实现（OpenAI 兼容 / Mock）及决策解析
//! - **engine**: 解析策略核心（状态机、工具 schema、请求形状、硬约束守卫）
//! - **session**: 会话控制器（handle / reset，按会话串行化）

pub mod config;
pub mod core;
pub mod engine;
pub mod memory;
pub mod observability;
pub mod oracle;
pub mod session;
pub mod surface;
