//! 会话层：把记忆存储与解析引擎接到单条语句的处理入口上

pub mod controller;

pub use controller::SessionController;
