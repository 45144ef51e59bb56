//! # wheelbot-drive - 驱动层
//!
//! 把闭环控制器接到执行机构与底盘上：
//!
//! - `hal` - 执行机构 / 航向源接口
//! - `kinematics` - 坦克、街机、麦克纳姆混合与正运动学
//! - `drive_base` - 驱动底盘（功率输出、位姿、所有权）
//! - `pid_motor` - 单执行机构位置闭环
//! - `pid_drive` - 底盘多轴闭环
//! - `sim` - 仿真执行机构与传感器（feature `sim`）
//!
//! 运动完成通过 [`Event`](wheelbot_sched::Event) 通知，运动本身不阻塞调用线程。

mod error;
pub mod drive_base;
pub mod hal;
pub mod kinematics;
pub mod outcome;
pub mod pid_drive;
pub mod pid_motor;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use drive_base::{DriveBase, DriveBaseBuilder, DriveKind, DriveParams, Pose, WheelPosition};
pub use error::DriveError;
pub use hal::{Actuator, HeadingSource, SharedActuator};
pub use outcome::MoveOutcome;
pub use pid_drive::{DriveAxis, DriveTarget, PidDrive, PidDriveBuilder, PidDriveStatus};
pub use pid_motor::{LimitSwitch, PidMotor};
