//! # wheelbot-tools - 应用层共享工具
//!
//! ## 包含模块
//!
//! - `config` - 机器人配置（TOML 文件）
//! - `telemetry` - 状态显示接口与底盘状态格式化
//!
//! 只依赖控制栈本身，不依赖任何硬件驱动。

pub mod config;
pub mod telemetry;

pub use config::{ConfigError, LoopSettings, RobotConfig};
pub use telemetry::{DriveStatus, MemorySink, TelemetrySink, TracingSink};
