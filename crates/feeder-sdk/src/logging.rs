//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt 订阅者，并通过 `tracing-log` 把 `log` crate 的记录桥接过来。

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// 未设置 `RUST_LOG` 时的默认过滤规则
pub const DEFAULT_FILTER: &str = "info";

static INIT: Once = Once::new();

/// 初始化全局日志（幂等）
///
/// 过滤规则取自 `RUST_LOG`，未设置时为 `info`。
/// 进程中已有全局订阅者时静默跳过。
pub fn init_logger() {
    init_logger_with(DEFAULT_FILTER);
}

/// 使用给定的默认过滤规则初始化全局日志（幂等）
///
/// # 参数
/// - `default_filter`: `RUST_LOG` 未设置时使用的过滤规则，如 `"feeder_client=debug,info"`
pub fn init_logger_with(default_filter: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_filter))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok();

        // 订阅者可能已经桥接了 log；重复安装返回错误，忽略即可
        let _ = tracing_log::LogTracer::init();

        if !installed {
            log::debug!("global tracing subscriber already installed");
        }
    });
}
