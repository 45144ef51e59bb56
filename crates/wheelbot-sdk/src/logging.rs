//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt 输出，过滤规则取自 `RUST_LOG`（未设置时使用默认级别），
//! 并通过 `tracing-log` 把 `log` 记录转发到 tracing。
//!
//! ```rust
//! wheelbot_sdk::logging::init_logger();
//! // 第二次调用是空操作
//! wheelbot_sdk::logging::init_logger();
//! ```

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 默认过滤级别
pub const DEFAULT_FILTER: &str = "info";

/// 初始化日志（默认级别 `info`）
pub fn init_logger() {
    init_logger_with_filter(DEFAULT_FILTER);
}

/// 初始化日志
///
/// `RUST_LOG` 已设置时优先使用，否则使用 `default_filter`。
/// 只有第一次调用生效；其他代码已安装全局 subscriber 时保持原状。
pub fn init_logger_with_filter(default_filter: &str) {
    INIT.call_once(|| {
        // 可能已被其他代码安装，忽略错误
        let _ = tracing_log::LogTracer::init();

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            tracing::debug!("Logger initialized");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_is_idempotent() {
        init_logger();
        init_logger_with_filter("trace");
        tracing::info!("after init");
        // log 记录经 LogTracer 转发
        log::info!("bridged log record");
        assert!(INIT.is_completed());
    }
}
