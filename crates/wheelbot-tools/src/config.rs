//! # 机器人配置
//!
//! 控制周期、底盘参数以及按名称索引的 PID / 触发器参数集，TOML 格式。
//!
//! ```toml
//! [control_loop]
//! period_ms = 50
//! init_periods = 1
//! late_warn_multiplier = 1.5
//!
//! [drive]
//! kind = "differential"
//! distance_per_count = 0.001
//! strafe_per_count = 0.001
//! track_width = 0.3
//!
//! [pid.drive]
//! kp = 2.0
//! tolerance = 0.01
//! settling_time = 0.1
//!
//! [trigger.line]
//! thresholds = [0.5]
//! ```
//!
//! 配置只在启动时读取一次，运行期间不回写。

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use wheelbot_control::{ControlError, PidParams, TriggerParams};
use wheelbot_drive::{DriveError, DriveParams};
use wheelbot_sched::{LoopConfig, SchedError};

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 读写文件失败
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML 解析失败
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML 序列化失败
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// 控制周期配置无效
    #[error("Invalid control loop settings: {0}")]
    Loop(#[from] SchedError),

    /// 底盘参数无效
    #[error("Invalid drive settings: {0}")]
    Drive(#[from] DriveError),

    /// 具名 PID / 触发器参数无效
    #[error("Invalid {kind} settings '{name}': {source}")]
    Control {
        kind: &'static str,
        name: String,
        #[source]
        source: ControlError,
    },

    /// 缺少具名参数
    #[error("Missing {kind} settings '{name}'")]
    Missing { kind: &'static str, name: String },
}

/// 控制周期设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    /// 控制周期（毫秒）
    pub period_ms: u64,
    /// 初始化周期数
    pub init_periods: u64,
    /// 超时告警倍数
    pub late_warn_multiplier: f64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        let defaults = LoopConfig::default();
        Self {
            period_ms: defaults.period.as_millis() as u64,
            init_periods: defaults.init_periods,
            late_warn_multiplier: defaults.late_warn_multiplier,
        }
    }
}

impl LoopSettings {
    /// 转换为宿主循环配置
    pub fn to_loop_config(&self, max_periods: Option<u64>) -> LoopConfig {
        LoopConfig {
            period: Duration::from_millis(self.period_ms),
            late_warn_multiplier: self.late_warn_multiplier,
            init_periods: self.init_periods,
            max_periods,
        }
    }
}

/// 机器人配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// 底盘是否安装陀螺仪
    pub has_gyro: bool,
    /// 控制周期
    pub control_loop: LoopSettings,
    /// 底盘参数
    pub drive: DriveParams,
    /// 具名 PID 参数集
    pub pid: BTreeMap<String, PidParams>,
    /// 具名触发器参数集
    pub trigger: BTreeMap<String, TriggerParams>,
}

impl Default for RobotConfig {
    /// 默认配置：差速底盘，满功率约 1 m/s，带前进 / 转向 PID 与一个寻线触发器
    fn default() -> Self {
        let mut pid = BTreeMap::new();
        pid.insert(
            "drive".to_string(),
            PidParams::new()
                .with_gains(2.0, 0.0, 0.0)
                .with_tolerance(0.01)
                .with_settling_time(0.1),
        );
        pid.insert(
            "turn".to_string(),
            PidParams::new()
                .with_gains(0.02, 0.0, 0.0)
                .with_tolerance(1.0)
                .with_settling_time(0.1),
        );

        let mut trigger = BTreeMap::new();
        trigger.insert("line".to_string(), TriggerParams::new(vec![0.5]));

        Self {
            has_gyro: true,
            control_loop: LoopSettings::default(),
            drive: DriveParams::differential(0.001, 0.3),
            pid,
            trigger,
        }
    }
}

impl RobotConfig {
    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RobotConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        debug!("Loaded robot config from {}", path.display());
        Ok(config)
    }

    /// 序列化为 TOML 文本
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 保存到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// 校验所有参数
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.control_loop.to_loop_config(None).validate()?;
        self.drive.validate(self.has_gyro)?;
        for (name, params) in &self.pid {
            params.validate().map_err(|source| ConfigError::Control {
                kind: "pid",
                name: name.clone(),
                source,
            })?;
        }
        for (name, params) in &self.trigger {
            params.validate(name).map_err(|source| ConfigError::Control {
                kind: "trigger",
                name: name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// 按名称获取 PID 参数
    pub fn pid(&self, name: &str) -> Result<&PidParams, ConfigError> {
        self.pid.get(name).ok_or_else(|| ConfigError::Missing {
            kind: "pid",
            name: name.to_string(),
        })
    }

    /// 按名称获取触发器参数
    pub fn trigger(&self, name: &str) -> Result<&TriggerParams, ConfigError> {
        self.trigger.get(name).ok_or_else(|| ConfigError::Missing {
            kind: "trigger",
            name: name.to_string(),
        })
    }
}
