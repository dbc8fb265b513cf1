//! 声明的工具集与调用校验
//!
//! 预言机只被允许调用这里声明的操作；parse_call 把 `{"tool","args"}` 原始
//! 调用解析成类型化 SurfaceOp，未知工具名或参数不符声明形状的调用在执行前
//! 即被拒绝。schema_json 生成注入策略文本的工具清单。

use serde_json::Value;

use crate::oracle::ToolCall;
use crate::surface::{EntityKind, PlaylistOp, Uri};

/// 校验通过的类型化调用
#[derive(Debug, Clone)]
pub enum SurfaceOp {
    Search { kind: EntityKind, query: String },
    GetPlaylist { uri: Uri },
    ListPlaylists { owner: Option<String> },
    CurrentPlayback,
    Play { uri: Uri },
    Pause,
    SkipNext,
    QueueAdd { uri: Uri },
    CreatePlaylist { name: String },
    UpdatePlaylist { uri: Uri, ops: Vec<PlaylistOp> },
    GetInfo { uri: Uri },
}

impl SurfaceOp {
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceOp::Search { .. } => "search",
            SurfaceOp::GetPlaylist { .. } => "get_playlist",
            SurfaceOp::ListPlaylists { .. } => "list_playlists",
            SurfaceOp::CurrentPlayback => "current_playback",
            SurfaceOp::Play { .. } => "play",
            SurfaceOp::Pause => "pause",
            SurfaceOp::SkipNext => "skip_next",
            SurfaceOp::QueueAdd { .. } => "queue_add",
            SurfaceOp::CreatePlaylist { .. } => "create_playlist",
            SurfaceOp::UpdatePlaylist { .. } => "update_playlist",
            SurfaceOp::GetInfo { .. } => "get_info",
        }
    }

    /// 调用携带的 URI（update_playlist 返回歌单自身）
    pub fn uris(&self) -> Vec<&Uri> {
        match self {
            SurfaceOp::GetPlaylist { uri }
            | SurfaceOp::Play { uri }
            | SurfaceOp::QueueAdd { uri }
            | SurfaceOp::GetInfo { uri } => vec![uri],
            SurfaceOp::UpdatePlaylist { uri, ops } => {
                let mut uris = vec![uri];
                for op in ops {
                    match op {
                        PlaylistOp::AddTrack { uri } | PlaylistOp::RemoveTrack { uri } => {
                            uris.push(uri)
                        }
                        PlaylistOp::Rename { .. } => {}
                    }
                }
                uris
            }
            _ => Vec::new(),
        }
    }
}

fn required_str(args: &Value, key: &str) -> Result<String, String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("missing required string argument \"{key}\""))
}

fn optional_str(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required_uri(args: &Value, key: &str) -> Result<Uri, String> {
    Uri::parse(&required_str(args, key)?)
}

/// 把原始工具调用解析成类型化操作；任何不符之处返回拒绝原因
pub fn parse_call(call: &ToolCall) -> Result<SurfaceOp, String> {
    let empty = Value::Object(serde_json::Map::new());
    let args = if call.args.is_null() {
        &empty
    } else {
        &call.args
    };
    if !args.is_object() {
        return Err("arguments must be a JSON object".to_string());
    }

    match call.tool.as_str() {
        "search" => {
            let kind: EntityKind = required_str(args, "kind")?.parse()?;
            let query = required_str(args, "query")?;
            if query.trim().is_empty() {
                return Err("search query must not be empty".to_string());
            }
            Ok(SurfaceOp::Search { kind, query })
        }
        "get_playlist" => Ok(SurfaceOp::GetPlaylist {
            uri: required_uri(args, "uri")?,
        }),
        "list_playlists" => Ok(SurfaceOp::ListPlaylists {
            owner: optional_str(args, "owner"),
        }),
        "current_playback" => Ok(SurfaceOp::CurrentPlayback),
        "play" => Ok(SurfaceOp::Play {
            uri: required_uri(args, "uri")?,
        }),
        "pause" => Ok(SurfaceOp::Pause),
        "skip_next" => Ok(SurfaceOp::SkipNext),
        "queue_add" => Ok(SurfaceOp::QueueAdd {
            uri: required_uri(args, "uri")?,
        }),
        "create_playlist" => {
            let name = required_str(args, "name")?;
            if name.trim().is_empty() {
                return Err("playlist name must not be empty".to_string());
            }
            Ok(SurfaceOp::CreatePlaylist { name })
        }
        "update_playlist" => {
            let uri = required_uri(args, "uri")?;
            let ops_value = args
                .get("ops")
                .ok_or_else(|| "missing required array argument \"ops\"".to_string())?;
            let ops: Vec<PlaylistOp> = serde_json::from_value(ops_value.clone())
                .map_err(|e| format!("malformed ops array: {e}"))?;
            if ops.is_empty() {
                return Err("ops array must not be empty".to_string());
            }
            Ok(SurfaceOp::UpdatePlaylist { uri, ops })
        }
        "get_info" => Ok(SurfaceOp::GetInfo {
            uri: required_uri(args, "uri")?,
        }),
        unknown => Err(format!("unknown tool: {unknown}")),
    }
}

/// 工具清单 JSON（注入策略文本，供预言机生成正确的调用格式）
pub fn schema_json() -> String {
    let tools = serde_json::json!([
        {
            "name": "search",
            "description": "Search the catalog. kind is one of track|album|artist|playlist.",
            "args": {"kind": "string", "query": "string"}
        },
        {
            "name": "get_playlist",
            "description": "Fetch the full contents of a playlist by its uri.",
            "args": {"uri": "string"}
        },
        {
            "name": "list_playlists",
            "description": "List playlists. With owner, list that owner's playlists; without, list the current user's.",
            "args": {"owner": "string (optional)"}
        },
        {
            "name": "current_playback",
            "description": "Get the currently playing track and playback state.",
            "args": {}
        },
        {
            "name": "play",
            "description": "Start playing a track or playlist by uri.",
            "args": {"uri": "string"}
        },
        {"name": "pause", "description": "Pause playback.", "args": {}},
        {"name": "skip_next", "description": "Skip to the next track.", "args": {}},
        {
            "name": "queue_add",
            "description": "Add a track to the play queue by uri.",
            "args": {"uri": "string"}
        },
        {
            "name": "create_playlist",
            "description": "Create a new empty playlist.",
            "args": {"name": "string"}
        },
        {
            "name": "update_playlist",
            "description": "Modify a playlist. ops items: {\"op\":\"add_track\",\"uri\":..}, {\"op\":\"remove_track\",\"uri\":..}, {\"op\":\"rename\",\"name\":..}.",
            "args": {"uri": "string", "ops": "array"}
        },
        {
            "name": "get_info",
            "description": "Fetch metadata for a confirmed uri (track, album, artist or playlist).",
            "args": {"uri": "string"}
        }
    ]);
    serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(tool: &str, args: Value) -> ToolCall {
        ToolCall {
            tool: tool.to_string(),
            args,
        }
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let err = parse_call(&call("fly_to_the_moon", json!({}))).unwrap_err();
        assert!(err.contains("unknown tool"));
    }

    #[test]
    fn search_requires_kind_and_query() {
        assert!(parse_call(&call("search", json!({"query": "x"}))).is_err());
        assert!(parse_call(&call("search", json!({"kind": "track"}))).is_err());
        assert!(parse_call(&call("search", json!({"kind": "banana", "query": "x"}))).is_err());
        assert!(matches!(
            parse_call(&call("search", json!({"kind": "track", "query": "x radio"}))).unwrap(),
            SurfaceOp::Search { kind: EntityKind::Track, .. }
        ));
    }

    #[test]
    fn uri_arguments_must_be_wellformed() {
        assert!(parse_call(&call("play", json!({"uri": "not-a-uri"}))).is_err());
        assert!(parse_call(&call("play", json!({"uri": "spotify:track:abc"}))).is_ok());
    }

    #[test]
    fn null_args_allowed_for_nullary_tools() {
        let c = ToolCall {
            tool: "pause".to_string(),
            args: Value::Null,
        };
        assert!(matches!(parse_call(&c).unwrap(), SurfaceOp::Pause));
    }

    #[test]
    fn update_playlist_parses_ops() {
        let op = parse_call(&call(
            "update_playlist",
            json!({
                "uri": "spotify:playlist:p1",
                "ops": [{"op": "add_track", "uri": "spotify:track:t1"}]
            }),
        ))
        .unwrap();
        match op {
            SurfaceOp::UpdatePlaylist { ops, .. } => assert_eq!(ops.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn collects_all_uris_for_provenance_check() {
        let op = parse_call(&call(
            "update_playlist",
            json!({
                "uri": "spotify:playlist:p1",
                "ops": [{"op": "add_track", "uri": "spotify:track:t1"}]
            }),
        ))
        .unwrap();
        assert_eq!(op.uris().len(), 2);
    }
}
