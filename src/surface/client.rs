//! 控制面客户端合同
//!
//! 每个操作语义上同步：要么返回类型化结果，要么以 SurfaceError 失败。
//! 客户端不做重试、不缓存播放状态；超时由调用方（引擎调度器）施加，
//! 超时同样以 Transport 上报。

use async_trait::async_trait;
use thiserror::Error;

use super::types::{
    EntityInfo, EntityKind, PlaybackState, Playlist, PlaylistOp, PlaylistSummary, SearchHit, Uri,
};

/// 控制面操作错误
#[derive(Error, Debug, Clone)]
pub enum SurfaceError {
    /// 实体不存在：由引擎就地恢复为澄清回复
    #[error("Not found: {0}")]
    NotFound(String),

    /// 无所有者限定且无法唯一定位
    #[error("Ambiguous owner-less reference: {0}")]
    AmbiguousOwnerless(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 传输层故障（含超时），对当次解析致命
    #[error("Transport error: {0}")]
    Transport(String),
}

/// 远端音乐控制面的类型化接口
#[async_trait]
pub trait ControlSurface: Send + Sync {
    /// 按类别搜索，最多返回 limit 条
    async fn search(
        &self,
        kind: EntityKind,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SurfaceError>;

    /// 拉取歌单全量内容
    async fn get_playlist(&self, uri: &Uri) -> Result<Playlist, SurfaceError>;

    /// 列出歌单：owner 为 None 时列当前用户自己的
    async fn list_playlists(&self, owner: Option<&str>)
        -> Result<Vec<PlaylistSummary>, SurfaceError>;

    /// 当前播放状态
    async fn current_playback(&self) -> Result<PlaybackState, SurfaceError>;

    /// 开始播放指定实体（单曲或歌单）
    async fn play(&self, uri: &Uri) -> Result<(), SurfaceError>;

    async fn pause(&self) -> Result<(), SurfaceError>;

    async fn skip_next(&self) -> Result<(), SurfaceError>;

    /// 追加到播放队列
    async fn queue_add(&self, uri: &Uri) -> Result<(), SurfaceError>;

    async fn create_playlist(&self, name: &str) -> Result<PlaylistSummary, SurfaceError>;

    async fn update_playlist(&self, uri: &Uri, ops: &[PlaylistOp]) -> Result<(), SurfaceError>;

    /// 按已确认 URI 查询元数据
    async fn get_info(&self, uri: &Uri) -> Result<EntityInfo, SurfaceError>;
}
