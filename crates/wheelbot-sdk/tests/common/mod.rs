//! 仿真机器人
//!
//! 差速底盘 + 跟随轮子的陀螺仪 + 前进 / 转向 PID 驱动，全部由 ManualClock 驱动。

#![allow(dead_code)]

use std::time::Duration;

use wheelbot_sdk::drive::hal::shared_actuator;
use wheelbot_sdk::drive::sim::{SimGyro, SimMotor};
use wheelbot_sdk::prelude::*;

/// 控制周期
pub const PERIOD: Duration = Duration::from_millis(50);

/// 满功率时编码器速度（计数 / 秒）
pub const MAX_COUNTS_PER_SEC: f64 = 1000.0;

pub struct SimRobot {
    pub clock: ManualClock,
    pub scheduler: Scheduler,
    pub base: DriveBase,
    pub drive: PidDrive,
    pub left: SimMotor,
    pub right: SimMotor,
}

impl SimRobot {
    /// 按配置构建仿真机器人（位姿更新在 PrePeriodic，PID 驱动在 PostPeriodic）
    pub fn new(config: &RobotConfig) -> Self {
        let clock = ManualClock::new();
        let scheduler = Scheduler::new(clock.shared());
        let left = SimMotor::new("left", clock.shared(), MAX_COUNTS_PER_SEC);
        let right = SimMotor::new("right", clock.shared(), MAX_COUNTS_PER_SEC);
        let gyro = SimGyro::differential(
            &left,
            &right,
            config.drive.distance_per_count,
            config.drive.track_width,
        );

        let base = DriveBase::builder("base", config.drive.clone())
            .wheel(WheelPosition::LeftFront, shared_actuator(left.clone()))
            .wheel(WheelPosition::RightFront, shared_actuator(right.clone()))
            .heading_source(gyro)
            .build()
            .expect("drive base");

        let drive = PidDrive::builder("drive", base.clone(), clock.shared())
            .y_pid(config.pid("drive").expect("drive pid").clone())
            .turn_pid(config.pid("turn").expect("turn pid").clone())
            .build()
            .expect("pid drive");

        base.attach(&scheduler, Phase::PrePeriodic);
        drive.attach(&scheduler, Phase::PostPeriodic);

        Self {
            clock,
            scheduler,
            base,
            drive,
            left,
            right,
        }
    }

    /// 默认配置的仿真机器人
    pub fn with_defaults() -> Self {
        Self::new(&RobotConfig::default())
    }

    /// 运行一个周期，`periodic` 为宿主周期逻辑
    pub fn period(&self, periodic: impl FnOnce(&Tick)) -> Tick {
        let tick = self.scheduler.run_period(RunMode::Running, periodic, |_| {});
        self.clock.advance(PERIOD);
        tick
    }

    /// 运行 `n` 个空周期
    pub fn idle(&self, n: usize) {
        for _ in 0..n {
            self.period(|_| {});
        }
    }

    /// 左右轮当前功率
    pub fn powers(&self) -> (f64, f64) {
        (self.left.power(), self.right.power())
    }
}
