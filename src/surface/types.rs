//! 控制面数据类型
//!
//! 规范 URI 形如 `<domain>:<kind>:<id>`，只能由先前搜索 / 列表结果中的 id 构造，
//! 引擎据此维护「已确认 URI」集合，拒绝凭空猜测的 id。

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 实体类别（与搜索 kind、URI 中段一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Track,
    Album,
    Artist,
    Playlist,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Track => "track",
            EntityKind::Album => "album",
            EntityKind::Artist => "artist",
            EntityKind::Playlist => "playlist",
        }
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(EntityKind::Track),
            "album" => Ok(EntityKind::Album),
            "artist" => Ok(EntityKind::Artist),
            "playlist" => Ok(EntityKind::Playlist),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 规范 URI：`<domain>:<kind>:<id>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    pub domain: String,
    pub kind: EntityKind,
    pub id: String,
}

impl Uri {
    pub fn new(domain: impl Into<String>, kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            kind,
            id: id.into(),
        }
    }

    /// 从 `<domain>:<kind>:<id>` 解析；段数或 kind 不合法时报错
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut parts = s.splitn(3, ':');
        let (domain, kind, id) = match (parts.next(), parts.next(), parts.next()) {
            (Some(d), Some(k), Some(i)) if !d.is_empty() && !i.is_empty() => (d, k, i),
            _ => return Err(format!("malformed uri: {s}")),
        };
        Ok(Self {
            domain: domain.to_string(),
            kind: kind.parse()?,
            id: id.to_string(),
        })
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.domain, self.kind, self.id)
    }
}

// URI 在观察结果与快照里一律序列化为字符串形式
impl Serialize for Uri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Uri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Uri::parse(&s).map_err(de::Error::custom)
    }
}

/// 单曲
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub artist: String,
    pub uri: Uri,
}

/// 歌单概要（列表 / 搜索返回，不含曲目）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub name: String,
    pub owner: String,
    pub uri: Uri,
}

/// 歌单全量内容（get_playlist 返回）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    pub owner: String,
    pub uri: Uri,
    pub tracks: Vec<Track>,
}

/// 搜索命中项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub name: String,
    /// 艺人或歌单所有者
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,
    pub uri: Uri,
}

/// 当前播放状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackState {
    pub playing: bool,
    pub current: Option<Track>,
}

/// 歌单修改操作（update_playlist）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlaylistOp {
    AddTrack { uri: Uri },
    RemoveTrack { uri: Uri },
    Rename { name: String },
}

/// 元数据查询结果（get_info）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityInfo {
    pub uri: Uri,
    pub name: String,
    pub detail: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_roundtrip() {
        let uri = Uri::parse("spotify:track:abc123").unwrap();
        assert_eq!(uri.kind, EntityKind::Track);
        assert_eq!(uri.to_string(), "spotify:track:abc123");
    }

    #[test]
    fn uri_rejects_malformed() {
        assert!(Uri::parse("spotify:track").is_err());
        assert!(Uri::parse("spotify:banana:x").is_err());
        assert!(Uri::parse(":track:x").is_err());
    }

    #[test]
    fn uri_serializes_as_string() {
        let uri = Uri::new("spotify", EntityKind::Playlist, "p1");
        let json = serde_json::to_string(&uri).unwrap();
        assert_eq!(json, "\"spotify:playlist:p1\"");
        let back: Uri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uri);
    }
}
