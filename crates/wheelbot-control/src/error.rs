//! 控制层错误类型定义

use thiserror::Error;

/// 控制层错误类型
///
/// 全部为配置错误，只在构造或修改配置时返回，控制循环运行期间不会产生。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// 输出范围非单调（min 必须小于 max）
    #[error("Invalid output range: [{min}, {max}] (min must be < max)")]
    InvalidOutputRange { min: f64, max: f64 },

    /// 增益无效（必须为有限非负数）
    #[error("Invalid gain {name} = {value} (must be finite and >= 0)")]
    InvalidGain { name: &'static str, value: f64 },

    /// 容差无效
    #[error("Invalid tolerance: {0} (must be finite and >= 0)")]
    InvalidTolerance(f64),

    /// 稳定时间无效
    #[error("Invalid settling time: {0}s (must be finite and >= 0)")]
    InvalidSettlingTime(f64),

    /// 触发器阈值表为空
    #[error("Trigger {0} has no thresholds")]
    EmptyThresholds(String),

    /// 触发器阈值表非严格递增
    #[error("Trigger {name} thresholds must be finite and strictly ascending: {thresholds:?}")]
    NonMonotonicThresholds { name: String, thresholds: Vec<f64> },
}

#[cfg(test)]
mod tests {
    use super::ControlError;

    #[test]
    fn test_control_error_display() {
        let msg = format!("{}", ControlError::InvalidOutputRange { min: 1.0, max: -1.0 });
        assert!(msg.contains("[1, -1]"), "message: {}", msg);

        let msg = format!(
            "{}",
            ControlError::InvalidGain {
                name: "kp",
                value: -2.0
            }
        );
        assert!(msg.contains("kp") && msg.contains("-2"));

        let msg = format!(
            "{}",
            ControlError::NonMonotonicThresholds {
                name: "line".into(),
                thresholds: vec![2.0, 1.0]
            }
        );
        assert!(msg.contains("line") && msg.contains("strictly ascending"));
    }
}
