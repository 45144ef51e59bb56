//! # wheelbot-control - 闭环控制层
//!
//! - `pid` - 带容差与稳定时间判定的 PID 控制器
//! - `trigger` - 模拟量 / 数字量阈值触发器
//!
//! 控制器不持有执行机构，只计算输出；写入由驱动层（`wheelbot-drive`）完成。

mod error;
pub mod pid;
pub mod trigger;

pub use error::ControlError;
pub use pid::{PidController, PidInput, PidParams, TargetMode};
pub use trigger::{AnalogTrigger, DigitalTrigger, TriggerEvent, TriggerHandler, TriggerParams};
