//! 调度层错误类型定义

use thiserror::Error;

/// 调度层错误类型
///
/// 仅在构造阶段（配置校验）返回；运行时路径不产生错误。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedError {
    /// 周期无效（必须大于 0）
    #[error("Invalid loop period: {0:?} (must be > 0)")]
    InvalidPeriod(std::time::Duration),

    /// 超时告警倍数无效
    #[error("Invalid late warning multiplier: {0} (must be >= 1.0)")]
    InvalidLateMultiplier(f64),
}
