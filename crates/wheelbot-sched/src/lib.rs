//! # wheelbot-sched - 协作式调度层
//!
//! 单线程、固定周期、无抢占的调度原语：
//!
//! - `clock` - 单调时间源（系统时钟 / 手动时钟）
//! - `event` - 一次性完成通知
//! - `timer` - 到期触发事件的定时器
//! - `scheduler` - 按阶段分桶的回调注册表
//! - `state_machine` - 等待事件的通用状态机
//! - `runner` - 固定周期宿主循环（参考实现）
//!
//! "等待"（状态机等待事件、PID 运动趋近目标）都被建模为把控制权交还给调度器、
//! 下一周期再被轮询，任何操作都不会阻塞调用线程。

pub mod clock;
mod error;
pub mod event;
pub mod runner;
pub mod scheduler;
pub mod state_machine;
pub mod timer;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::SchedError;
pub use event::Event;
pub use runner::{LoopConfig, LoopRunner};
pub use scheduler::{Phase, RunMode, Scheduler, Task, Tick};
pub use state_machine::StateMachine;
pub use timer::Timer;
