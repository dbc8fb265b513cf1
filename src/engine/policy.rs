//! 引擎级硬约束
//!
//! 原始策略以自由提示词约束推理组件；这里把其中的「严格」条款提升为
//! 可执行校验：review 在执行前审查每个工具调用（违规即拒绝并给出纠正
//! 指示），after 在结果返回后推进守卫状态，必要时直接由引擎终结本次
//! 解析（消歧、严格未命中的澄清回复）或驱动固定调用序列（严格命中）。
//! 预言机的裁量被压缩到措辞与搜索词的选择。

use crate::config::EngineSection;
use crate::surface::{EntityKind, SearchHit, Uri};

use super::context::{ChainStage, ResolutionContext, StrictOutcome};
use super::dispatch::SurfaceOutcome;
use super::schema::SurfaceOp;

/// 执行前审查结论
#[derive(Debug)]
pub enum Verdict {
    Allow,
    /// 拒绝执行：rule 记入日志，correction 作为纠正指示写回上下文
    Reject {
        rule: &'static str,
        correction: String,
    },
}

/// 结果消化后引擎采取的动作
#[derive(Debug)]
pub enum EngineAction {
    /// 观察写回上下文，继续推理
    Continue,
    /// 引擎直接给出最终回复（消歧）
    StopWith(String),
    /// 先暂停（若本次解析已开始播放），再给出最终回复（严格未命中）
    PauseAndStop(String),
    /// 严格命中：引擎自行执行 play(歌单) -> queue_add(曲目) -> skip_next
    StrictSequence { playlist: Uri, track: Uri },
}

fn reject(rule: &'static str, correction: String) -> Verdict {
    Verdict::Reject { rule, correction }
}

/// 执行前审查：按守卫从严到宽依次核对
pub fn review(ctx: &ResolutionContext, op: &SurfaceOp, cfg: &EngineSection) -> Verdict {
    if ctx.reply_only {
        return reject(
            "finalize",
            "All required operations are already done. Answer the user directly in plain text; \
             do not call any more tools."
                .to_string(),
        );
    }

    // URI 来源：一切携带 URI 的调用都必须使用本轮查询结果返回的 URI
    for uri in op.uris() {
        if !ctx.is_confirmed(uri) {
            return reject(
                "unconfirmed-uri",
                format!(
                    "URI {uri} was not returned by any search or list in this turn. Never guess \
                     ids: look the entity up first, then use the uri from the result."
                ),
            );
        }
    }

    if let Some(strict) = &ctx.strict {
        if strict.outcome.is_none() {
            let resolving = matches!(
                op,
                SurfaceOp::GetPlaylist { .. }
                    | SurfaceOp::ListPlaylists { .. }
                    | SurfaceOp::CurrentPlayback
            ) || matches!(
                op,
                SurfaceOp::Search {
                    kind: EntityKind::Playlist,
                    ..
                }
            );
            if !resolving {
                return reject(
                    "strict-fetch-first",
                    format!(
                        "The user asked for \"{}\" from the playlist \"{}\". Retrieve that \
                         playlist's contents first (resolve its uri, then call get_playlist); do \
                         not play, queue or search for tracks yet.",
                        strict.song, strict.playlist_name
                    ),
                );
            }
        }
    }

    if let Some(chain) = &ctx.chain {
        match chain.stage {
            ChainStage::Resolved => {
                // 第一条命中即胜出：歌单级操作必须落在解析出的那一个上
                if let (SurfaceOp::Play { uri } | SurfaceOp::GetPlaylist { uri }, Some(resolved)) =
                    (op, &chain.resolved)
                {
                    if uri.kind == EntityKind::Playlist && uri != resolved {
                        return reject(
                            "my-playlist-first-match",
                            format!(
                                "\"my {}\" already resolved to {resolved}; operate on that \
                                 playlist, not another one.",
                                chain.name
                            ),
                        );
                    }
                }
            }
            stage => {
                let order_hint = format!(
                    "Resolve \"my {}\" strictly in order: (a) list playlists owned by \"{}\"; \
                     (b) if none match, list the user's own playlists; (c) only if still none, \
                     search playlists globally. The current step is ({}).",
                    chain.name,
                    cfg.default_owner_name,
                    match stage {
                        ChainStage::OwnerLookup => "a",
                        ChainStage::OwnLookup => "b",
                        _ => "c",
                    }
                );
                match op {
                    SurfaceOp::ListPlaylists { owner: Some(o) } => {
                        if *o != cfg.default_owner_name {
                            return reject("my-playlist-order", order_hint);
                        }
                        if stage != ChainStage::OwnerLookup {
                            return reject("my-playlist-order", order_hint);
                        }
                    }
                    SurfaceOp::ListPlaylists { owner: None } => {
                        if stage != ChainStage::OwnLookup {
                            return reject("my-playlist-order", order_hint);
                        }
                    }
                    SurfaceOp::Search {
                        kind: EntityKind::Playlist,
                        ..
                    } => {
                        if stage != ChainStage::GlobalSearch {
                            return reject("my-playlist-order", order_hint);
                        }
                    }
                    // 其余调用要么不涉及歌单解析，要么因 URI 未确认已被拒
                    _ => {}
                }
            }
        }
    }

    if let Some(radio) = &ctx.radio {
        match op {
            SurfaceOp::Search { kind, query } => {
                let qualified =
                    *kind == EntityKind::Track && query.to_lowercase().ends_with(" radio");
                if !qualified {
                    return reject(
                        "radio-qualifier",
                        format!(
                            "No playlist was named, so search tracks with the literal qualifier: \
                             use query \"{} radio\", then play the first result.",
                            radio.song
                        ),
                    );
                }
            }
            SurfaceOp::Play { uri } => match &radio.first_hit {
                Some(first) if first == uri => {}
                Some(first) => {
                    return reject(
                        "radio-first-result",
                        format!("Play the first result of the radio search ({first}), not another hit."),
                    );
                }
                None => {
                    return reject(
                        "radio-first-result",
                        format!(
                            "Search \"{} radio\" first, then play the first result.",
                            radio.song
                        ),
                    );
                }
            },
            _ => {}
        }
    }

    Verdict::Allow
}

fn name_eq(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// 名称匹配：精确（忽略大小写）优先，否则取包含关系的第一条
fn first_playlist_match<'a>(
    names: impl Iterator<Item = (&'a str, &'a Uri)> + Clone,
    wanted: &str,
) -> Option<&'a Uri> {
    let wanted_lower = wanted.trim().to_lowercase();
    names
        .clone()
        .find(|(name, _)| name_eq(name, wanted))
        .or_else(|| {
            names
                .clone()
                .find(|(name, _)| name.to_lowercase().contains(&wanted_lower))
        })
        .map(|(_, uri)| uri)
}

/// 结果消化：确认 URI、推进守卫、产出引擎动作
pub fn after(
    ctx: &mut ResolutionContext,
    op: &SurfaceOp,
    outcome: &SurfaceOutcome,
) -> EngineAction {
    match outcome {
        SurfaceOutcome::Hits(hits) => {
            for hit in hits {
                ctx.confirm(&hit.uri);
            }
        }
        SurfaceOutcome::Playlist(playlist) => {
            ctx.confirm(&playlist.uri);
            for track in &playlist.tracks {
                ctx.confirm(&track.uri);
            }
        }
        SurfaceOutcome::Playlists(playlists) => {
            for playlist in playlists {
                ctx.confirm(&playlist.uri);
            }
        }
        SurfaceOutcome::Playback(state) => {
            if let Some(track) = &state.current {
                ctx.confirm(&track.uri);
            }
        }
        SurfaceOutcome::Created(playlist) => ctx.confirm(&playlist.uri),
        SurfaceOutcome::Info(_) | SurfaceOutcome::Done => {}
    }

    if matches!(op, SurfaceOp::Play { .. }) {
        ctx.playback_started = true;
    }

    // 所有权解析链推进：零命中才进入下一段，第一条命中即胜出
    if let Some(chain) = &mut ctx.chain {
        match (chain.stage, op, outcome) {
            (
                ChainStage::OwnerLookup,
                SurfaceOp::ListPlaylists { owner: Some(_) },
                SurfaceOutcome::Playlists(playlists),
            ) => {
                let found = first_playlist_match(
                    playlists.iter().map(|p| (p.name.as_str(), &p.uri)),
                    &chain.name,
                )
                .cloned();
                match found {
                    Some(uri) => {
                        chain.resolved = Some(uri);
                        chain.stage = ChainStage::Resolved;
                    }
                    None => chain.stage = ChainStage::OwnLookup,
                }
            }
            (
                ChainStage::OwnLookup,
                SurfaceOp::ListPlaylists { owner: None },
                SurfaceOutcome::Playlists(playlists),
            ) => {
                let found = first_playlist_match(
                    playlists.iter().map(|p| (p.name.as_str(), &p.uri)),
                    &chain.name,
                )
                .cloned();
                match found {
                    Some(uri) => {
                        chain.resolved = Some(uri);
                        chain.stage = ChainStage::Resolved;
                    }
                    None => chain.stage = ChainStage::GlobalSearch,
                }
            }
            (ChainStage::GlobalSearch, SurfaceOp::Search { .. }, SurfaceOutcome::Hits(hits)) => {
                if let Some(uri) = first_playlist_match(
                    hits.iter().map(|h| (h.name.as_str(), &h.uri)),
                    &chain.name,
                )
                .cloned()
                {
                    chain.resolved = Some(uri);
                    chain.stage = ChainStage::Resolved;
                }
                // 全局也零命中：留给预言机向用户解释「没找到」
            }
            _ => {}
        }
    }

    // 严格歌单匹配：内容一到，引擎立即做精确（忽略大小写）名称匹配
    if let Some(strict) = &mut ctx.strict {
        if strict.outcome.is_none() {
            if let (SurfaceOp::GetPlaylist { .. }, SurfaceOutcome::Playlist(playlist)) =
                (op, outcome)
            {
                let matched = playlist
                    .tracks
                    .iter()
                    .find(|t| name_eq(&t.name, &strict.song));
                return match matched {
                    Some(track) => {
                        strict.outcome = Some(StrictOutcome::Matched);
                        EngineAction::StrictSequence {
                            playlist: playlist.uri.clone(),
                            track: track.uri.clone(),
                        }
                    }
                    None => {
                        strict.outcome = Some(StrictOutcome::Missing);
                        let valid: Vec<&str> = playlist
                            .tracks
                            .iter()
                            .take(3)
                            .map(|t| t.name.as_str())
                            .collect();
                        EngineAction::PauseAndStop(strict_miss_reply(
                            &strict.song,
                            &playlist.name,
                            &valid,
                        ))
                    }
                };
            }
        }
    }

    // 消歧：普通搜索多条命中即停；radio 限定搜索与所有权链豁免（首条/首中即胜）
    if let (SurfaceOp::Search { query, .. }, SurfaceOutcome::Hits(hits)) = (op, outcome) {
        if let Some(radio) = &mut ctx.radio {
            if let Some(first) = hits.first() {
                radio.first_hit = Some(first.uri.clone());
            }
            return EngineAction::Continue;
        }
        if ctx.chain.is_none() && hits.len() > 1 {
            return EngineAction::StopWith(disambiguation_reply(query, hits));
        }
    }

    EngineAction::Continue
}

/// 严格未命中的澄清回复：列出歌单内最多 3 首有效曲目
fn strict_miss_reply(song: &str, playlist_name: &str, valid: &[&str]) -> String {
    let mut reply = format!(
        "I couldn't find \"{song}\" in the playlist \"{playlist_name}\", so I didn't play a \
         substitute."
    );
    if valid.is_empty() {
        reply.push_str(" That playlist is currently empty.");
    } else {
        reply.push_str(" Songs in that playlist include: ");
        reply.push_str(&valid.join(", "));
        reply.push_str(". Which of these should I play?");
    }
    reply
}

/// 消歧回复：最多列 3 个候选请用户选择
fn disambiguation_reply(query: &str, hits: &[SearchHit]) -> String {
    let mut reply = format!("I found several matches for \"{query}\":\n");
    for (i, hit) in hits.iter().take(3).enumerate() {
        match &hit.by {
            Some(by) => reply.push_str(&format!("{}. {} ({})\n", i + 1, hit.name, by)),
            None => reply.push_str(&format!("{}. {}\n", i + 1, hit.name)),
        }
    }
    reply.push_str("Which one did you mean?");
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::shape::RequestShape;
    use crate::surface::{Playlist, PlaylistSummary, Track};

    fn uri(kind: EntityKind, id: &str) -> Uri {
        Uri::new("spotify", kind, id)
    }

    fn cfg() -> EngineSection {
        EngineSection::default()
    }

    fn track(name: &str, id: &str) -> Track {
        Track {
            name: name.to_string(),
            artist: "artist".to_string(),
            uri: uri(EntityKind::Track, id),
        }
    }

    #[test]
    fn unconfirmed_uri_is_rejected() {
        let ctx = ResolutionContext::new(RequestShape::Other);
        let op = SurfaceOp::Play {
            uri: uri(EntityKind::Track, "guessed"),
        };
        assert!(matches!(
            review(&ctx, &op, &cfg()),
            Verdict::Reject { rule: "unconfirmed-uri", .. }
        ));
    }

    #[test]
    fn strict_blocks_track_search_before_fetch() {
        let ctx = ResolutionContext::new(RequestShape::PlayFromPlaylist {
            song: "C".to_string(),
            playlist: "Workout".to_string(),
            my_ref: false,
        });
        let op = SurfaceOp::Search {
            kind: EntityKind::Track,
            query: "C".to_string(),
        };
        assert!(matches!(
            review(&ctx, &op, &cfg()),
            Verdict::Reject { rule: "strict-fetch-first", .. }
        ));
        // 歌单解析类调用放行
        let op = SurfaceOp::Search {
            kind: EntityKind::Playlist,
            query: "Workout".to_string(),
        };
        assert!(matches!(review(&ctx, &op, &cfg()), Verdict::Allow));
    }

    #[test]
    fn strict_match_produces_exact_sequence_action() {
        let mut ctx = ResolutionContext::new(RequestShape::PlayFromPlaylist {
            song: "b".to_string(),
            playlist: "Workout".to_string(),
            my_ref: false,
        });
        let p_uri = uri(EntityKind::Playlist, "p1");
        let playlist = Playlist {
            name: "Workout".to_string(),
            owner: "user".to_string(),
            uri: p_uri.clone(),
            tracks: vec![track("A", "t1"), track("B", "t2")],
        };
        let op = SurfaceOp::GetPlaylist { uri: p_uri };
        let action = after(&mut ctx, &op, &SurfaceOutcome::Playlist(playlist));
        match action {
            EngineAction::StrictSequence { track, .. } => {
                assert_eq!(track.to_string(), "spotify:track:t2")
            }
            other => panic!("expected strict sequence, got {other:?}"),
        }
    }

    #[test]
    fn strict_miss_lists_valid_songs_and_stops() {
        let mut ctx = ResolutionContext::new(RequestShape::PlayFromPlaylist {
            song: "C".to_string(),
            playlist: "Workout".to_string(),
            my_ref: false,
        });
        let p_uri = uri(EntityKind::Playlist, "p1");
        let playlist = Playlist {
            name: "Workout".to_string(),
            owner: "user".to_string(),
            uri: p_uri.clone(),
            tracks: vec![track("A", "t1"), track("B", "t2")],
        };
        let op = SurfaceOp::GetPlaylist { uri: p_uri };
        match after(&mut ctx, &op, &SurfaceOutcome::Playlist(playlist)) {
            EngineAction::PauseAndStop(reply) => {
                assert!(reply.contains("A"));
                assert!(reply.contains("B"));
                assert!(reply.contains("Workout"));
            }
            other => panic!("expected pause-and-stop, got {other:?}"),
        }
    }

    #[test]
    fn chain_advances_only_on_empty_stage() {
        let mut ctx = ResolutionContext::new(RequestShape::PlayMyPlaylist {
            name: "chill".to_string(),
        });
        // (a) 所有者名下无匹配 -> 进入 (b)
        let op = SurfaceOp::ListPlaylists {
            owner: Some("jawahar".to_string()),
        };
        after(&mut ctx, &op, &SurfaceOutcome::Playlists(vec![]));
        assert_eq!(ctx.chain.as_ref().unwrap().stage, ChainStage::OwnLookup);

        // (b) 用户自己的列表命中 -> Resolved
        let own = vec![PlaylistSummary {
            name: "chill".to_string(),
            owner: "user".to_string(),
            uri: uri(EntityKind::Playlist, "mine"),
        }];
        let op = SurfaceOp::ListPlaylists { owner: None };
        after(&mut ctx, &op, &SurfaceOutcome::Playlists(own));
        let chain = ctx.chain.as_ref().unwrap();
        assert_eq!(chain.stage, ChainStage::Resolved);
        assert_eq!(chain.resolved.as_ref().unwrap().to_string(), "spotify:playlist:mine");
    }

    #[test]
    fn chain_rejects_out_of_order_global_search() {
        let ctx = ResolutionContext::new(RequestShape::PlayMyPlaylist {
            name: "chill".to_string(),
        });
        let op = SurfaceOp::Search {
            kind: EntityKind::Playlist,
            query: "chill".to_string(),
        };
        assert!(matches!(
            review(&ctx, &op, &cfg()),
            Verdict::Reject { rule: "my-playlist-order", .. }
        ));
    }

    #[test]
    fn radio_guard_requires_qualifier_and_first_hit() {
        let mut ctx = ResolutionContext::new(RequestShape::PlaySong {
            song: "Blinding Lights".to_string(),
        });
        let bare = SurfaceOp::Search {
            kind: EntityKind::Track,
            query: "Blinding Lights".to_string(),
        };
        assert!(matches!(
            review(&ctx, &bare, &cfg()),
            Verdict::Reject { rule: "radio-qualifier", .. }
        ));

        let qualified = SurfaceOp::Search {
            kind: EntityKind::Track,
            query: "Blinding Lights radio".to_string(),
        };
        assert!(matches!(review(&ctx, &qualified, &cfg()), Verdict::Allow));

        let hits = vec![
            SearchHit {
                name: "Blinding Lights radio".to_string(),
                by: None,
                uri: uri(EntityKind::Track, "first"),
            },
            SearchHit {
                name: "other".to_string(),
                by: None,
                uri: uri(EntityKind::Track, "second"),
            },
        ];
        // radio 搜索豁免消歧，多条命中也继续
        assert!(matches!(
            after(&mut ctx, &qualified, &SurfaceOutcome::Hits(hits)),
            EngineAction::Continue
        ));

        let second = SurfaceOp::Play {
            uri: uri(EntityKind::Track, "second"),
        };
        assert!(matches!(
            review(&ctx, &second, &cfg()),
            Verdict::Reject { rule: "radio-first-result", .. }
        ));
        let first = SurfaceOp::Play {
            uri: uri(EntityKind::Track, "first"),
        };
        assert!(matches!(review(&ctx, &first, &cfg()), Verdict::Allow));
    }

    #[test]
    fn plain_search_with_many_hits_stops_for_disambiguation() {
        let mut ctx = ResolutionContext::new(RequestShape::Other);
        let op = SurfaceOp::Search {
            kind: EntityKind::Track,
            query: "love".to_string(),
        };
        let hits: Vec<SearchHit> = (0..5)
            .map(|i| SearchHit {
                name: format!("Love {i}"),
                by: Some("artist".to_string()),
                uri: uri(EntityKind::Track, &format!("t{i}")),
            })
            .collect();
        match after(&mut ctx, &op, &SurfaceOutcome::Hits(hits)) {
            EngineAction::StopWith(reply) => {
                // 最多列 3 个候选
                assert!(reply.contains("1. "));
                assert!(reply.contains("3. "));
                assert!(!reply.contains("4. "));
            }
            other => panic!("expected stop, got {other:?}"),
        }
    }

    #[test]
    fn reply_only_rejects_everything() {
        let mut ctx = ResolutionContext::new(RequestShape::Other);
        ctx.reply_only = true;
        assert!(matches!(
            review(&ctx, &SurfaceOp::Pause, &cfg()),
            Verdict::Reject { rule: "finalize", .. }
        ));
    }
}
