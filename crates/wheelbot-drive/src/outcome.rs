//! 运动结果

use std::fmt;

/// 闭环运动的结束原因
///
/// 完成通知只通过 [`Event`](wheelbot_sched::Event) 发出；
/// 结果供调用方在事件触发后查询（例如区分"到达"与"超时"）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveOutcome {
    /// 所有闭环到达目标并稳定
    TargetReached,
    /// 超时
    TimedOut,
    /// 被取消（显式取消、触发器、手动驱动或新目标替换）
    Cancelled,
    /// 朝按下的限位开关方向运动
    LimitReached,
}

impl MoveOutcome {
    /// 字符串表示（日志、遥测）
    pub fn as_str(self) -> &'static str {
        match self {
            MoveOutcome::TargetReached => "target_reached",
            MoveOutcome::TimedOut => "timed_out",
            MoveOutcome::Cancelled => "cancelled",
            MoveOutcome::LimitReached => "limit_reached",
        }
    }

    /// 是否正常到达
    pub fn is_success(self) -> bool {
        matches!(self, MoveOutcome::TargetReached)
    }
}

impl fmt::Display for MoveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
