//! Wheelbot SDK - 轮式机器人协作式运动控制
//!
//! 固定周期、单线程、无阻塞的运动控制核心：多个闭环（距离、航向、寻线）共享同一个底盘，
//! 通过完成事件而不是阻塞调用来串联动作。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **调度层** (`sched`): 时钟、事件、定时器、阶段调度器、状态机、宿主循环
//! - **控制层** (`control`): PID 控制器、阈值触发器
//! - **驱动层** (`drive`): 底盘运动学与位姿、PID 电机、PID 驱动
//! - **工具** (`tools`): 配置文件、遥测显示
//!
//! # 快速开始
//!
//! ```rust
//! use wheelbot_sdk::prelude::*;
//!
//! let clock = ManualClock::new();
//! let scheduler = Scheduler::new(clock.shared());
//! let mut auto: StateMachine<&'static str> = StateMachine::new("auto", clock.shared());
//! auto.start("drive_forward");
//! assert!(auto.is_ready());
//! ```
//!
//! # 每周期顺序
//!
//! ```text
//! PrePeriodic (位姿更新、触发器采样)
//!   -> 宿主周期逻辑 (状态机)
//!   -> PostPeriodic (PID 驱动 / PID 电机)
//!   -> PreContinuous -> 宿主连续逻辑 -> PostContinuous
//! ```

pub mod logging;
pub mod prelude;

pub use wheelbot_control as control;
pub use wheelbot_drive as drive;
pub use wheelbot_sched as sched;
pub use wheelbot_tools as tools;

pub use wheelbot_control::ControlError;
pub use wheelbot_drive::DriveError;
pub use wheelbot_sched::SchedError;
pub use wheelbot_tools::ConfigError;
