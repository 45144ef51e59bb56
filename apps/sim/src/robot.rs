//! 仿真机器人与自主程序
//!
//! 差速底盘（两个仿真电机 + 跟随轮子的陀螺仪）、一个仿真寻线传感器，
//! 以及一段由状态机串联的自主程序：前进 → 转向 → 寻线 → 结束。

use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;
use wheelbot_sdk::drive::hal::shared_actuator;
use wheelbot_sdk::drive::sim::{SimGyro, SimMotor, SimSensor};
use wheelbot_sdk::prelude::*;

/// 满功率时编码器速度（计数 / 秒）
const MAX_COUNTS_PER_SEC: f64 = 1000.0;

/// 仿真场地上的线（前进距离，米）
const LINE_AT: f64 = 1.2;

/// 自主程序步骤
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Forward,
    Turn,
    SeekLine,
    Done,
}

/// 仿真机器人
pub struct SimRobot {
    pub scheduler: Scheduler,
    pub drive: PidDrive,
    line_trigger: AnalogTrigger,
    done: Event,
    auto: StateMachine<Step>,
}

impl SimRobot {
    /// 按配置构建并注册到新调度器
    pub fn build(config: &RobotConfig, clock: SharedClock) -> Result<Self> {
        if config.drive.kind != DriveKind::Differential {
            bail!("Simulator supports differential drive only");
        }

        let scheduler = Scheduler::new(clock.clone());
        let left = SimMotor::new("left", clock.clone(), MAX_COUNTS_PER_SEC);
        let right = SimMotor::new("right", clock.clone(), MAX_COUNTS_PER_SEC);

        let mut builder = DriveBase::builder("base", config.drive.clone())
            .wheel(WheelPosition::LeftFront, shared_actuator(left.clone()))
            .wheel(WheelPosition::RightFront, shared_actuator(right.clone()));
        if config.has_gyro {
            builder = builder.heading_source(SimGyro::differential(
                &left,
                &right,
                config.drive.distance_per_count,
                config.drive.track_width,
            ));
        }
        let base = builder.build().context("Failed to build drive base")?;

        let drive = PidDrive::builder("drive", base.clone(), clock.clone())
            .y_pid(config.pid("drive")?.clone())
            .turn_pid(config.pid("turn")?.clone())
            .build()
            .context("Failed to build PID drive")?;

        // 线传感器读数由底盘前进距离决定
        let line = SimSensor::new(0.0);
        {
            let base = base.clone();
            let line = line.clone();
            scheduler.register("line_sim", Phase::PrePeriodic, move |_tick: &Tick| {
                line.set(if base.get_y_position() > LINE_AT { 1.0 } else { 0.0 });
            });
        }
        let line_trigger =
            AnalogTrigger::from_params("line", config.trigger("line")?, line.reader())?;
        {
            let drive = drive.clone();
            line_trigger.set_handler(move |event: &TriggerEvent<'_>| {
                info!(
                    "Line detected (zone {} -> {}, value {:.2})",
                    event.prev_zone, event.zone, event.value
                );
                drive.cancel();
            });
        }

        base.attach(&scheduler, Phase::PrePeriodic);
        line_trigger.attach(&scheduler, Phase::PrePeriodic);
        drive.attach(&scheduler, Phase::PostPeriodic);

        let mut auto = StateMachine::new("auto", clock);
        auto.start(Step::Forward);

        Ok(Self {
            scheduler,
            drive,
            line_trigger,
            done: Event::new("drive_done"),
            auto,
        })
    }

    /// 自主程序是否已结束
    pub fn is_finished(&self) -> bool {
        !self.auto.is_enabled()
    }

    /// 宿主周期逻辑：推进自主程序
    pub fn periodic(&mut self, tick: &Tick) {
        if tick.mode != RunMode::Running || !self.auto.is_ready() {
            return;
        }
        let Some(step) = self.auto.get_state() else {
            return;
        };

        match step {
            Step::Forward => {
                info!("Step {:?}: drive forward 0.5m", step);
                self.drive.set_target(
                    DriveTarget::new().with_y(0.5),
                    TargetMode::Absolute,
                    Some(&self.done),
                    Some(Duration::from_secs(5)),
                );
                self.auto.wait_for_single_event(&self.done, Step::Turn);
            },
            Step::Turn => {
                self.log_outcome();
                info!("Step {:?}: turn to 90 degrees", step);
                self.drive.set_target(
                    DriveTarget::new().with_turn(90.0),
                    TargetMode::Absolute,
                    Some(&self.done),
                    Some(Duration::from_secs(5)),
                );
                self.auto.wait_for_single_event(&self.done, Step::SeekLine);
            },
            Step::SeekLine => {
                self.log_outcome();
                info!("Step {:?}: drive up to 2m until the line", step);
                self.line_trigger.set_enabled(true);
                self.drive.set_target(
                    DriveTarget::new().with_y(2.0),
                    TargetMode::Relative,
                    Some(&self.done),
                    Some(Duration::from_secs(10)),
                );
                self.auto.wait_for_single_event(&self.done, Step::Done);
            },
            Step::Done => {
                self.log_outcome();
                self.line_trigger.set_enabled(false);
                self.auto.stop();
                info!("Autonomous routine finished");
            },
        }
    }

    fn log_outcome(&self) {
        let pose = self.drive.base().pose();
        info!(
            "Previous move: {} (x {:.3}, y {:.3}, heading {:.1})",
            self.drive
                .last_outcome()
                .map_or("none", MoveOutcome::as_str),
            pose.x,
            pose.y,
            pose.heading
        );
    }
}
