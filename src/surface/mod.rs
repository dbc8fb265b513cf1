//! 控制面层：远端音乐控制面的类型化接口与实现
//!
//! 真实绑定（本地工具服务进程或远端 API）由外部协作方提供，
//! 本 crate 只约定 ControlSurface 合同；MockSurface 供测试与演示使用。

pub mod client;
pub mod mock;
pub mod types;

pub use client::{ControlSurface, SurfaceError};
pub use mock::MockSurface;
pub use types::{
    EntityInfo, EntityKind, PlaybackState, Playlist, PlaylistOp, PlaylistSummary, SearchHit,
    Track, Uri,
};
