//! 内存 Mock 控制面（用于测试与演示，无需远端服务）
//!
//! 歌单与搜索命中由调用方种入；play/pause/skip/queue 在内存里模拟一个
//! 简化的播放队列。所有调用按顺序记入调用日志，测试据此断言
//! 「同一会话的两次解析不会交错发出工具调用」等性质。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::client::{ControlSurface, SurfaceError};
use super::types::{
    EntityInfo, EntityKind, PlaybackState, Playlist, PlaylistOp, PlaylistSummary, SearchHit,
    Track, Uri,
};

struct MockState {
    playlists: Vec<Playlist>,
    /// (kind, 小写查询) -> 预置命中
    seeded_hits: HashMap<(EntityKind, String), Vec<SearchHit>>,
    playing: bool,
    current: Option<Track>,
    queue: VecDeque<Track>,
    /// 注入的单次失败：操作名 -> 错误
    failures: HashMap<String, SurfaceError>,
    calls: Vec<String>,
}

/// 内存 Mock 控制面
pub struct MockSurface {
    domain: String,
    /// list_playlists(None) 视作此所有者的歌单
    user_owner: String,
    state: Mutex<MockState>,
}

impl MockSurface {
    pub fn new(domain: impl Into<String>, user_owner: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            user_owner: user_owner.into(),
            state: Mutex::new(MockState {
                playlists: Vec::new(),
                seeded_hits: HashMap::new(),
                playing: false,
                current: None,
                queue: VecDeque::new(),
                failures: HashMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// 种入一个歌单，返回其 URI
    pub fn add_playlist(&self, name: &str, owner: &str, tracks: &[(&str, &str)]) -> Uri {
        let uri = Uri::new(&self.domain, EntityKind::Playlist, Uuid::new_v4().simple().to_string());
        let tracks = tracks
            .iter()
            .map(|(n, a)| Track {
                name: n.to_string(),
                artist: a.to_string(),
                uri: Uri::new(&self.domain, EntityKind::Track, Uuid::new_v4().simple().to_string()),
            })
            .collect();
        let playlist = Playlist {
            name: name.to_string(),
            owner: owner.to_string(),
            uri: uri.clone(),
            tracks,
        };
        self.state.lock().expect("mock lock").playlists.push(playlist);
        uri
    }

    /// 为 (kind, query) 预置搜索命中（查询按小写精确匹配）
    pub fn seed_search(&self, kind: EntityKind, query: &str, hits: Vec<SearchHit>) {
        self.state
            .lock()
            .expect("mock lock")
            .seeded_hits
            .insert((kind, query.to_lowercase()), hits);
    }

    /// 便捷构造：以名字与艺人生成一个 track 命中
    pub fn track_hit(&self, name: &str, artist: &str) -> SearchHit {
        SearchHit {
            name: name.to_string(),
            by: Some(artist.to_string()),
            uri: Uri::new(&self.domain, EntityKind::Track, Uuid::new_v4().simple().to_string()),
        }
    }

    /// 注入下一次指定操作的失败
    pub fn fail_next(&self, op: &str, err: SurfaceError) {
        self.state
            .lock()
            .expect("mock lock")
            .failures
            .insert(op.to_string(), err);
    }

    /// 按顺序返回所有已记录的调用（"op 参数摘要"）
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().expect("mock lock").calls.clone()
    }

    /// 当前播放状态快照
    pub fn playback(&self) -> (bool, Option<String>) {
        let st = self.state.lock().expect("mock lock");
        (st.playing, st.current.as_ref().map(|t| t.name.clone()))
    }

    fn record(state: &mut MockState, op: &str, arg: &str) -> Result<(), SurfaceError> {
        state.calls.push(if arg.is_empty() {
            op.to_string()
        } else {
            format!("{op} {arg}")
        });
        if let Some(err) = state.failures.remove(op) {
            return Err(err);
        }
        Ok(())
    }

    fn find_track(state: &MockState, uri: &Uri) -> Option<Track> {
        state
            .playlists
            .iter()
            .flat_map(|p| p.tracks.iter())
            .find(|t| &t.uri == uri)
            .cloned()
            .or_else(|| {
                state
                    .seeded_hits
                    .values()
                    .flatten()
                    .find(|h| &h.uri == uri)
                    .map(|h| Track {
                        name: h.name.clone(),
                        artist: h.by.clone().unwrap_or_default(),
                        uri: h.uri.clone(),
                    })
            })
    }
}

#[async_trait]
impl ControlSurface for MockSurface {
    async fn search(
        &self,
        kind: EntityKind,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SurfaceError> {
        let mut st = self.state.lock().expect("mock lock");
        Self::record(&mut st, "search", &format!("{kind} {query}"))?;
        if let Some(hits) = st.seeded_hits.get(&(kind, query.to_lowercase())) {
            return Ok(hits.iter().take(limit).cloned().collect());
        }
        // 未预置时退化为按名称子串扫描已种入的歌单与曲目
        let q = query.to_lowercase();
        let hits: Vec<SearchHit> = match kind {
            EntityKind::Playlist => st
                .playlists
                .iter()
                .filter(|p| p.name.to_lowercase().contains(&q))
                .map(|p| SearchHit {
                    name: p.name.clone(),
                    by: Some(p.owner.clone()),
                    uri: p.uri.clone(),
                })
                .collect(),
            EntityKind::Track => st
                .playlists
                .iter()
                .flat_map(|p| p.tracks.iter())
                .filter(|t| t.name.to_lowercase().contains(&q))
                .map(|t| SearchHit {
                    name: t.name.clone(),
                    by: Some(t.artist.clone()),
                    uri: t.uri.clone(),
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(hits.into_iter().take(limit).collect())
    }

    async fn get_playlist(&self, uri: &Uri) -> Result<Playlist, SurfaceError> {
        let mut st = self.state.lock().expect("mock lock");
        Self::record(&mut st, "get_playlist", &uri.to_string())?;
        st.playlists
            .iter()
            .find(|p| &p.uri == uri)
            .cloned()
            .ok_or_else(|| SurfaceError::NotFound(uri.to_string()))
    }

    async fn list_playlists(
        &self,
        owner: Option<&str>,
    ) -> Result<Vec<PlaylistSummary>, SurfaceError> {
        let mut st = self.state.lock().expect("mock lock");
        Self::record(&mut st, "list_playlists", owner.unwrap_or(""))?;
        let owner = owner.unwrap_or(&self.user_owner);
        Ok(st
            .playlists
            .iter()
            .filter(|p| p.owner == owner)
            .map(|p| PlaylistSummary {
                name: p.name.clone(),
                owner: p.owner.clone(),
                uri: p.uri.clone(),
            })
            .collect())
    }

    async fn current_playback(&self) -> Result<PlaybackState, SurfaceError> {
        let mut st = self.state.lock().expect("mock lock");
        Self::record(&mut st, "current_playback", "")?;
        Ok(PlaybackState {
            playing: st.playing,
            current: st.current.clone(),
        })
    }

    async fn play(&self, uri: &Uri) -> Result<(), SurfaceError> {
        let mut st = self.state.lock().expect("mock lock");
        Self::record(&mut st, "play", &uri.to_string())?;
        match uri.kind {
            EntityKind::Playlist => {
                let playlist = st
                    .playlists
                    .iter()
                    .find(|p| &p.uri == uri)
                    .cloned()
                    .ok_or_else(|| SurfaceError::NotFound(uri.to_string()))?;
                let mut tracks = playlist.tracks.into_iter();
                st.current = tracks.next();
                st.queue = tracks.collect();
                st.playing = st.current.is_some();
            }
            _ => {
                let track = Self::find_track(&st, uri)
                    .ok_or_else(|| SurfaceError::NotFound(uri.to_string()))?;
                st.current = Some(track);
                st.queue.clear();
                st.playing = true;
            }
        }
        Ok(())
    }

    async fn pause(&self) -> Result<(), SurfaceError> {
        let mut st = self.state.lock().expect("mock lock");
        Self::record(&mut st, "pause", "")?;
        st.playing = false;
        Ok(())
    }

    async fn skip_next(&self) -> Result<(), SurfaceError> {
        let mut st = self.state.lock().expect("mock lock");
        Self::record(&mut st, "skip_next", "")?;
        st.current = st.queue.pop_front();
        st.playing = st.current.is_some();
        Ok(())
    }

    async fn queue_add(&self, uri: &Uri) -> Result<(), SurfaceError> {
        let mut st = self.state.lock().expect("mock lock");
        Self::record(&mut st, "queue_add", &uri.to_string())?;
        let track =
            Self::find_track(&st, uri).ok_or_else(|| SurfaceError::NotFound(uri.to_string()))?;
        // 规约「将指定曲目插到下一首」：strict 流程靠 queue_add + skip_next 让目标曲目立即播放
        st.queue.push_front(track);
        Ok(())
    }

    async fn create_playlist(&self, name: &str) -> Result<PlaylistSummary, SurfaceError> {
        let uri = {
            let mut st = self.state.lock().expect("mock lock");
            Self::record(&mut st, "create_playlist", name)?;
            let uri = Uri::new(
                &self.domain,
                EntityKind::Playlist,
                Uuid::new_v4().simple().to_string(),
            );
            st.playlists.push(Playlist {
                name: name.to_string(),
                owner: self.user_owner.clone(),
                uri: uri.clone(),
                tracks: Vec::new(),
            });
            uri
        };
        Ok(PlaylistSummary {
            name: name.to_string(),
            owner: self.user_owner.clone(),
            uri,
        })
    }

    async fn update_playlist(&self, uri: &Uri, ops: &[PlaylistOp]) -> Result<(), SurfaceError> {
        let mut st = self.state.lock().expect("mock lock");
        Self::record(&mut st, "update_playlist", &uri.to_string())?;
        for op in ops {
            match op {
                PlaylistOp::AddTrack { uri: track_uri } => {
                    let track = Self::find_track(&st, track_uri)
                        .ok_or_else(|| SurfaceError::NotFound(track_uri.to_string()))?;
                    let playlist = st
                        .playlists
                        .iter_mut()
                        .find(|p| &p.uri == uri)
                        .ok_or_else(|| SurfaceError::NotFound(uri.to_string()))?;
                    playlist.tracks.push(track);
                }
                PlaylistOp::RemoveTrack { uri: track_uri } => {
                    let playlist = st
                        .playlists
                        .iter_mut()
                        .find(|p| &p.uri == uri)
                        .ok_or_else(|| SurfaceError::NotFound(uri.to_string()))?;
                    playlist.tracks.retain(|t| &t.uri != track_uri);
                }
                PlaylistOp::Rename { name } => {
                    let playlist = st
                        .playlists
                        .iter_mut()
                        .find(|p| &p.uri == uri)
                        .ok_or_else(|| SurfaceError::NotFound(uri.to_string()))?;
                    playlist.name = name.clone();
                }
            }
        }
        Ok(())
    }

    async fn get_info(&self, uri: &Uri) -> Result<EntityInfo, SurfaceError> {
        let mut st = self.state.lock().expect("mock lock");
        Self::record(&mut st, "get_info", &uri.to_string())?;
        if let Some(playlist) = st.playlists.iter().find(|p| &p.uri == uri) {
            return Ok(EntityInfo {
                uri: uri.clone(),
                name: playlist.name.clone(),
                detail: serde_json::json!({
                    "type": "playlist",
                    "owner": playlist.owner,
                    "tracks": playlist.tracks.len(),
                }),
            });
        }
        if let Some(track) = Self::find_track(&st, uri) {
            return Ok(EntityInfo {
                uri: uri.clone(),
                name: track.name.clone(),
                detail: serde_json::json!({
                    "type": "track",
                    "artist": track.artist,
                }),
            });
        }
        Err(SurfaceError::NotFound(uri.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn play_playlist_then_queue_and_skip() {
        let surface = MockSurface::new("spotify", "user");
        let uri = surface.add_playlist("Workout", "user", &[("A", "x"), ("B", "y")]);
        let playlist = surface.get_playlist(&uri).await.unwrap();
        let b = playlist.tracks[1].clone();

        surface.play(&uri).await.unwrap();
        surface.queue_add(&b.uri).await.unwrap();
        surface.skip_next().await.unwrap();

        let (playing, current) = surface.playback();
        assert!(playing);
        assert_eq!(current.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn fallback_search_scans_seeded_playlists() {
        let surface = MockSurface::new("spotify", "user");
        surface.add_playlist("Chill Mix", "user", &[("Calm Song", "z")]);
        let hits = surface
            .search(EntityKind::Playlist, "chill", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Chill Mix");
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let surface = MockSurface::new("spotify", "user");
        surface.fail_next("pause", SurfaceError::Transport("boom".into()));
        assert!(matches!(
            surface.pause().await,
            Err(SurfaceError::Transport(_))
        ));
        assert!(surface.pause().await.is_ok());
    }
}
