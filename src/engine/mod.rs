//! 解析策略核心
//!
//! - **schema**: 声明的工具集与调用校验（未知工具 / 参数不符立即拒绝，不执行）
//! - **shape**: 语句的请求形状识别，决定装配哪些硬约束守卫
//! - **context**: 单条语句的瞬态解析状态（迭代数、已确认 URI、守卫状态）
//! - **policy**: 引擎级硬约束（radio 限定、my playlist 次序、严格歌单匹配、
//!   URI 来源、消歧上限），以可执行校验而非提示词约束预言机
//! - **dispatch**: 校验后的调用派发到控制面（超时 + 审计日志）
//! - **resolution**: 状态机主循环 START -> REASONING -> (TOOL_EXEC -> REASONING)* -> DONE | FAILED

pub mod context;
pub mod dispatch;
pub mod policy;
pub mod resolution;
pub mod schema;
pub mod shape;

pub use context::ResolutionContext;
pub use dispatch::{dispatch, SurfaceOutcome};
pub use resolution::{ResolutionEngine, ResolutionOutcome};
pub use schema::{parse_call, schema_json, SurfaceOp};
pub use shape::RequestShape;
