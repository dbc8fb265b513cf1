//! 单条语句的瞬态解析状态
//!
//! ResolutionContext 由一次 Resolution 独占，结束即丢弃：已确认 URI、
//! 守卫状态、迭代与纠正计数都不跨语句存活。「曲目确认在歌单 P 中」
//! 只认本上下文内 get_playlist(P) 的返回，从不跨会话、从不长期缓存。

use std::collections::HashSet;

use uuid::Uuid;

use crate::surface::Uri;

use super::shape::RequestShape;

/// 严格歌单匹配守卫的终局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrictOutcome {
    Matched,
    Missing,
}

/// 「从指定歌单播放指定歌」守卫：get_playlist 是强制上下文，
/// 匹配由引擎执行，未命中时禁止一切全局搜索与替代播放
#[derive(Debug, Clone)]
pub struct StrictGuard {
    pub song: String,
    pub playlist_name: String,
    pub outcome: Option<StrictOutcome>,
}

/// 「my playlist」三段式所有权解析链的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStage {
    /// (a) 查固定所有者名下的歌单
    OwnerLookup,
    /// (b) 查请求用户自己的歌单
    OwnLookup,
    /// (c) 全局搜索兜底
    GlobalSearch,
    Resolved,
}

/// 所有权解析链守卫：上一步零命中才允许进入下一步，第一条命中即胜出
#[derive(Debug, Clone)]
pub struct ChainGuard {
    pub name: String,
    pub stage: ChainStage,
    pub resolved: Option<Uri>,
}

/// 裸歌名播放守卫：搜索必须带字面限定词 "radio"，且只允许播放第一条结果
#[derive(Debug, Clone)]
pub struct RadioGuard {
    pub song: String,
    pub first_hit: Option<Uri>,
}

/// 每条语句一个：解析引擎状态机的全部瞬态
pub struct ResolutionContext {
    pub id: Uuid,
    pub shape: RequestShape,
    /// 已完成的推理轮数（预言机调用次数）
    pub iterations: usize,
    /// 已拒绝的非法 / 违规工具调用次数；纠正一次，再犯升级为 FAILED
    pub rejections: usize,
    /// 本上下文内由搜索 / 列表 / 取回结果确认过的 URI
    confirmed: HashSet<String>,
    /// 本次解析中是否成功发出过 play
    pub playback_started: bool,
    /// 置位后仅接受最终回复，一切工具调用被拒
    pub reply_only: bool,
    pub strict: Option<StrictGuard>,
    pub chain: Option<ChainGuard>,
    pub radio: Option<RadioGuard>,
}

impl ResolutionContext {
    /// 按请求形状装配守卫
    pub fn new(shape: RequestShape) -> Self {
        let (strict, chain, radio) = match &shape {
            RequestShape::PlayFromPlaylist {
                song,
                playlist,
                my_ref,
            } => (
                Some(StrictGuard {
                    song: song.clone(),
                    playlist_name: playlist.clone(),
                    outcome: None,
                }),
                my_ref.then(|| ChainGuard {
                    name: playlist.clone(),
                    stage: ChainStage::OwnerLookup,
                    resolved: None,
                }),
                None,
            ),
            RequestShape::PlayMyPlaylist { name } => (
                None,
                Some(ChainGuard {
                    name: name.clone(),
                    stage: ChainStage::OwnerLookup,
                    resolved: None,
                }),
                None,
            ),
            RequestShape::PlaySong { song } => (
                None,
                None,
                Some(RadioGuard {
                    song: song.clone(),
                    first_hit: None,
                }),
            ),
            RequestShape::Other => (None, None, None),
        };
        Self {
            id: Uuid::new_v4(),
            shape,
            iterations: 0,
            rejections: 0,
            confirmed: HashSet::new(),
            playback_started: false,
            reply_only: false,
            strict,
            chain,
            radio,
        }
    }

    pub fn confirm(&mut self, uri: &Uri) {
        self.confirmed.insert(uri.to_string());
    }

    pub fn is_confirmed(&self, uri: &Uri) -> bool {
        self.confirmed.contains(&uri.to_string())
    }

    /// 记一次拒绝；返回 false 表示纠正额度用尽，应升级为 FAILED
    pub fn note_rejection(&mut self) -> bool {
        self.rejections += 1;
        self.rejections < 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_follow_shape() {
        let ctx = ResolutionContext::new(RequestShape::classify(
            "play Blinding Lights from my Workout playlist",
        ));
        assert!(ctx.strict.is_some());
        assert!(ctx.chain.is_some());
        assert!(ctx.radio.is_none());

        let ctx = ResolutionContext::new(RequestShape::classify("play Blinding Lights"));
        assert!(ctx.strict.is_none());
        assert!(ctx.radio.is_some());

        let ctx = ResolutionContext::new(RequestShape::classify("pause"));
        assert!(ctx.strict.is_none() && ctx.chain.is_none() && ctx.radio.is_none());
    }

    #[test]
    fn rejection_allowance_is_one_correction() {
        let mut ctx = ResolutionContext::new(RequestShape::Other);
        assert!(ctx.note_rejection());
        assert!(!ctx.note_rejection());
    }
}
