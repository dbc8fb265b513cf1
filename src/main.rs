//! Muse - 音乐对话智能体
//!
//! 入口：初始化日志与配置，装配 Mock 控制面（真实绑定由外部协作方提供）、
//! 预言机与会话控制器，运行行式 REPL；/reset 清空会话与用户记忆。

use std::io::Write;
use std::sync::Arc;

use muse::config::load_config;
use muse::engine::ResolutionEngine;
use muse::memory::{MemoryPersistence, MemoryStore};
use muse::oracle::{OpenAiOracle, OracleAdapter};
use muse::session::SessionController;
use muse::surface::MockSurface;

/// 演示用固定身份（与会话持久化键一致）
const USER_ID: &str = "user_1@muse.local";
const SESSION_ID: &str = "muse_session_1";

/// 演示控制面种子数据
fn seed_surface(surface: &MockSurface, owner: &str) {
    surface.add_playlist(
        "Workout",
        owner,
        &[
            ("Blinding Lights", "The Weeknd"),
            ("Stronger", "Kanye West"),
            ("Eye of the Tiger", "Survivor"),
        ],
    );
    surface.add_playlist(
        "chill",
        "user",
        &[("Weightless", "Marconi Union"), ("Holocene", "Bon Iver")],
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    muse::observability::init();

    let cfg = load_config(None)?;

    let surface = Arc::new(MockSurface::new(&cfg.engine.uri_domain, "user"));
    seed_surface(&surface, &cfg.engine.default_owner_name);

    let oracle = Arc::new(OpenAiOracle::new(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.model,
        None,
    ));
    let adapter = OracleAdapter::new(oracle, cfg.llm.timeouts.request);
    let engine = ResolutionEngine::new(surface, adapter, cfg.engine.clone());

    let store = Arc::new(MemoryStore::new());
    let persistence = cfg.memory.snapshot_path.as_ref().map(MemoryPersistence::new);
    if let Some(p) = &persistence {
        p.load_into(&store).await?;
    }

    let controller = SessionController::new(Arc::clone(&store), engine, cfg.app.history_window);

    println!("muse - music chat agent. /reset clears the conversation, exit quits.");
    let stdin = std::io::stdin();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        if line == "/reset" {
            controller.reset(SESSION_ID).await;
            println!("muse> conversation cleared.");
            continue;
        }

        let reply = controller.handle(USER_ID, SESSION_ID, line).await?;
        println!("muse> {reply}");

        if let Some(p) = &persistence {
            if let Err(err) = p.save(&store).await {
                tracing::warn!(error = %err, "memory snapshot failed");
            }
        }
    }

    Ok(())
}
