//! 请求形状识别
//!
//! 引擎级硬约束需要知道当前语句落在哪种受约束的形状里：
//! 「从指定歌单播放指定歌」装配严格匹配守卫，「play 裸歌名」装配 radio
//! 限定守卫，「my playlist」引用装配三段式所有权解析链。其余语句交由
//! 预言机在声明的工具集内自由组合，只受 URI 来源与消歧守卫约束。

use std::sync::OnceLock;

use regex::Regex;

/// 一条语句识别出的请求形状
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestShape {
    /// "play <song> from [my] <playlist>"：严格歌单匹配
    PlayFromPlaylist {
        song: String,
        playlist: String,
        /// 歌单引用带 "my"，需走所有权解析链
        my_ref: bool,
    },
    /// "play my <name> [playlist]"：所有权解析链
    PlayMyPlaylist { name: String },
    /// "play <song>"（未提歌单）：radio 限定搜索，播放第一条结果
    PlaySong { song: String },
    /// 其余语句：暂停 / 跳过 / 查询 / 建歌单等
    Other,
}

fn from_playlist_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)^\s*play\s+(?:the\s+song\s+)?["']?(.+?)["']?\s+from\s+(my\s+)?["']?(.+?)["']?(?:\s+playlist)?\s*[.!]?\s*$"#,
        )
        .expect("static regex")
    })
}

fn my_playlist_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^\s*play\s+my\s+["']?(.+?)["']?(?:\s+playlist)?\s*[.!]?\s*$"#)
            .expect("static regex")
    })
}

fn bare_play_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^\s*play\s+(?:the\s+song\s+)?["']?(.+?)["']?\s*[.!]?\s*$"#)
            .expect("static regex")
    })
}

impl RequestShape {
    /// 识别语句形状；识别顺序 from > my > bare，未命中即 Other
    pub fn classify(utterance: &str) -> Self {
        if let Some(caps) = from_playlist_re().captures(utterance) {
            return RequestShape::PlayFromPlaylist {
                song: caps[1].trim().to_string(),
                playlist: caps[3].trim().to_string(),
                my_ref: caps.get(2).is_some(),
            };
        }
        if let Some(caps) = my_playlist_re().captures(utterance) {
            return RequestShape::PlayMyPlaylist {
                name: caps[1].trim().to_string(),
            };
        }
        if let Some(caps) = bare_play_re().captures(utterance) {
            return RequestShape::PlaySong {
                song: caps[1].trim().to_string(),
            };
        }
        RequestShape::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_from_playlist() {
        let shape = RequestShape::classify("Play Blinding Lights from my Workout playlist");
        assert_eq!(
            shape,
            RequestShape::PlayFromPlaylist {
                song: "Blinding Lights".to_string(),
                playlist: "Workout".to_string(),
                my_ref: true,
            }
        );
    }

    #[test]
    fn play_from_named_playlist_without_my() {
        let shape = RequestShape::classify("play Hotel California from Road Trip");
        assert_eq!(
            shape,
            RequestShape::PlayFromPlaylist {
                song: "Hotel California".to_string(),
                playlist: "Road Trip".to_string(),
                my_ref: false,
            }
        );
    }

    #[test]
    fn play_my_playlist() {
        assert_eq!(
            RequestShape::classify("Play my chill playlist"),
            RequestShape::PlayMyPlaylist {
                name: "chill".to_string()
            }
        );
        assert_eq!(
            RequestShape::classify("play my Gym Mix"),
            RequestShape::PlayMyPlaylist {
                name: "Gym Mix".to_string()
            }
        );
    }

    #[test]
    fn bare_play() {
        assert_eq!(
            RequestShape::classify("Play Blinding Lights"),
            RequestShape::PlaySong {
                song: "Blinding Lights".to_string()
            }
        );
        assert_eq!(
            RequestShape::classify("play the song Yesterday."),
            RequestShape::PlaySong {
                song: "Yesterday".to_string()
            }
        );
    }

    #[test]
    fn non_play_requests_are_other() {
        assert_eq!(RequestShape::classify("Pause the music"), RequestShape::Other);
        assert_eq!(
            RequestShape::classify("What's playing right now?"),
            RequestShape::Other
        );
        assert_eq!(
            RequestShape::classify("Create a playlist called Vibes"),
            RequestShape::Other
        );
    }
}
