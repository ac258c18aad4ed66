//! 日志引导：`fmt + EnvFilter` 的全局 Subscriber。
use std::sync::OnceLock;

use tracing::dispatcher;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// 安装全局日志 Subscriber。
///
/// # 教案式说明
/// - **意图（Why）**：CLI 与手工调试都需要同一套日志格式，而 `cargo test` 多个用例会重复调用入口；
/// - **逻辑（How）**：
///   1. 已由本函数安装，或外部已设置 Subscriber 时直接返回；
///   2. `RUST_LOG` 优先，缺失或非法时回退到 `default_directive`，仍非法则回退到 `info`；
///   3. 组装 `registry + EnvFilter + fmt::layer` 并设为全局默认；
/// - **契约（What）**：幂等；返回值表示本次调用是否真正完成了安装。
pub fn init_tracing(default_directive: &str) -> bool {
    if INSTALLED.get().is_some() || dispatcher::has_been_set() {
        return false;
    }

    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter(default_directive))
        .with(tracing_subscriber::fmt::layer().with_target(true));
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    INSTALLED.set(()).is_ok()
}

fn build_env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_default_directive_falls_back() {
        // 非法指令不应导致 panic。
        let _ = build_env_filter("cartotest_core=[");
    }

    #[test]
    fn repeated_installation_is_a_no_op() {
        let _ = init_tracing("cartotest_core=debug");
        assert!(!init_tracing("cartotest_core=debug"));
    }
}
