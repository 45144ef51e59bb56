//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use wheelbot_sdk::prelude::*;
//! ```

// 调度层
pub use wheelbot_sched::{
    Clock, Event, LoopConfig, LoopRunner, ManualClock, Phase, RunMode, Scheduler, SharedClock,
    StateMachine, SystemClock, Tick, Timer,
};

// 控制层
pub use wheelbot_control::{
    AnalogTrigger, DigitalTrigger, PidController, PidParams, TargetMode, TriggerEvent,
    TriggerParams,
};

// 驱动层
pub use wheelbot_drive::{
    Actuator, DriveAxis, DriveBase, DriveKind, DriveParams, DriveTarget, HeadingSource,
    MoveOutcome, PidDrive, PidMotor, Pose, WheelPosition,
};

// 工具
pub use wheelbot_tools::{DriveStatus, RobotConfig, TelemetrySink};

// 错误类型
pub use wheelbot_control::ControlError;
pub use wheelbot_drive::DriveError;
pub use wheelbot_sched::SchedError;
pub use wheelbot_tools::ConfigError;
