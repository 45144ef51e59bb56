//! 驱动层错误类型定义

use thiserror::Error;
use wheelbot_control::ControlError;

use crate::drive_base::{DriveKind, WheelPosition};

/// 驱动层错误类型
///
/// 只在构造阶段返回。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriveError {
    /// 轮子数量不符合底盘类型
    #[error("{kind:?} drive base needs {expected} wheels, got {count}")]
    InvalidWheelCount {
        kind: DriveKind,
        expected: &'static str,
        count: usize,
    },

    /// 同一位置重复安装轮子
    #[error("Duplicate wheel at {0:?}")]
    DuplicateWheel(WheelPosition),

    /// 差速底盘缺少一侧的轮子
    #[error("Differential drive base needs at least one left and one right wheel")]
    MissingSide,

    /// 位移换算系数无效
    #[error("Invalid {name}: {value} (must be finite and > 0)")]
    InvalidScale { name: &'static str, value: f64 },

    /// 没有航向源且轮距无效，无法计算航向
    #[error("No heading source and invalid track width {0} (must be > 0)")]
    MissingHeadingSource(f64),

    /// PID 驱动没有配置任何闭环
    #[error("PID drive {0} has no controllers")]
    NoControllers(String),

    /// 控制器配置错误
    #[error("Controller configuration error: {0}")]
    Control(#[from] ControlError),
}
