//! 可观测性：tracing 初始化

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化日志：默认 muse=info，可通过 RUST_LOG 覆盖
pub fn init() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive("muse=info".parse().expect("static directive")),
        )
        .with(fmt::layer())
        .init();
}
