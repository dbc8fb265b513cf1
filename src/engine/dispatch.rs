//! 调用派发：校验后的操作送往控制面
//!
//! 对每次调用施加超时并输出结构化审计日志（JSON）；超时统一折算为
//! Transport。结果打包成 SurfaceOutcome 供策略守卫消化，并序列化为
//! 观察文本写回预言机上下文。

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::timeout;

use crate::surface::{
    ControlSurface, EntityInfo, PlaybackState, Playlist, PlaylistSummary, SearchHit, SurfaceError,
};

use super::schema::SurfaceOp;

/// 搜索 / 列表统一截断条数
pub const SEARCH_LIMIT: usize = 5;

/// 控制面调用的类型化结果
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SurfaceOutcome {
    Hits(Vec<SearchHit>),
    Playlist(Playlist),
    Playlists(Vec<PlaylistSummary>),
    Playback(PlaybackState),
    Created(PlaylistSummary),
    Info(EntityInfo),
    Done,
}

impl SurfaceOutcome {
    /// 写回预言机上下文的观察文本（紧凑 JSON）
    pub fn observation(&self) -> String {
        match self {
            SurfaceOutcome::Done => "ok".to_string(),
            other => serde_json::to_string(other).unwrap_or_else(|_| "ok".to_string()),
        }
    }
}

/// 执行一次类型化调用；超时返回 Transport，成功与否都记审计日志
pub async fn dispatch(
    surface: &dyn ControlSurface,
    op: &SurfaceOp,
    deadline: Duration,
) -> Result<SurfaceOutcome, SurfaceError> {
    let start = Instant::now();

    let fut = async {
        match op {
            SurfaceOp::Search { kind, query } => surface
                .search(*kind, query, SEARCH_LIMIT)
                .await
                .map(SurfaceOutcome::Hits),
            SurfaceOp::GetPlaylist { uri } => {
                surface.get_playlist(uri).await.map(SurfaceOutcome::Playlist)
            }
            SurfaceOp::ListPlaylists { owner } => surface
                .list_playlists(owner.as_deref())
                .await
                .map(SurfaceOutcome::Playlists),
            SurfaceOp::CurrentPlayback => surface
                .current_playback()
                .await
                .map(SurfaceOutcome::Playback),
            SurfaceOp::Play { uri } => surface.play(uri).await.map(|_| SurfaceOutcome::Done),
            SurfaceOp::Pause => surface.pause().await.map(|_| SurfaceOutcome::Done),
            SurfaceOp::SkipNext => surface.skip_next().await.map(|_| SurfaceOutcome::Done),
            SurfaceOp::QueueAdd { uri } => {
                surface.queue_add(uri).await.map(|_| SurfaceOutcome::Done)
            }
            SurfaceOp::CreatePlaylist { name } => surface
                .create_playlist(name)
                .await
                .map(SurfaceOutcome::Created),
            SurfaceOp::UpdatePlaylist { uri, ops } => surface
                .update_playlist(uri, ops)
                .await
                .map(|_| SurfaceOutcome::Done),
            SurfaceOp::GetInfo { uri } => surface.get_info(uri).await.map(SurfaceOutcome::Info),
        }
    };

    let result = timeout(deadline, fut).await;

    let (ok, outcome) = match &result {
        Ok(Ok(_)) => (true, "ok"),
        Ok(Err(_)) => (false, "error"),
        Err(_) => (false, "timeout"),
    };
    let audit = serde_json::json!({
        "event": "tool_audit",
        "tool": op.name(),
        "ok": ok,
        "outcome": outcome,
        "duration_ms": start.elapsed().as_millis() as u64,
    });
    tracing::info!(audit = %audit.to_string(), "tool");

    match result {
        Ok(inner) => inner,
        Err(_) => Err(SurfaceError::Transport(format!("{} timed out", op.name()))),
    }
}
