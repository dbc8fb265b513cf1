//! 记忆层：会话轮次日志（追加写）、用户长期事实（去重集合）、JSON 快照持久化

pub mod persistence;
pub mod store;
pub mod turns;

pub use persistence::MemoryPersistence;
pub use store::MemoryStore;
pub use turns::{Role, Turn};
