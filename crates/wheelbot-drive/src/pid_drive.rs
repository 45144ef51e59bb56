//! PID Drive - 闭环底盘驱动
//!
//! 在共享底盘上同时运行最多三个闭环：横移（x）、前进（y）、转向（turn）。
//! 有横移闭环时输出经麦克纳姆混合，否则经街机混合。
//!
//! # 生命周期
//!
//! ```text
//! IDLE --set_target--> ACTIVE --(全部到达 | 超时 | 取消)--> IDLE
//! ```
//!
//! - 结束时底盘输出清零，完成事件恰好触发一次，记录 [`MoveOutcome`]
//! - 运动进行中再次 `set_target`：当前运动以 `Cancelled` 结束（旧事件被触发），再开始新运动
//! - 同一底盘同一时刻只有一个 PID 驱动处于 ACTIVE：另一个 PID 驱动接管底盘，
//!   或直接对底盘调用手动驱动方法，都会先取消当前的控制者
//!
//! # 取消
//!
//! [`PidDrive::cancel`] 立即生效：输出清零并触发事件，调用返回前完成。
//! 典型用法是在触发器处理函数中取消（例如寻线时越过终止线）。
//! 处理函数中不应在取消后立即发起新运动，新运动应由状态机在下一周期发起。
//!
//! # 示例
//!
//! ```rust
//! use wheelbot_control::{PidParams, TargetMode};
//! use wheelbot_drive::{DriveBase, DriveParams, DriveTarget, PidDrive, WheelPosition};
//! use wheelbot_drive::hal::{Actuator, shared_actuator};
//! use wheelbot_sched::Event;
//! use wheelbot_sched::clock::ManualClock;
//! use std::time::Duration;
//!
//! # #[derive(Default)]
//! # struct Motor { power: f64, count: f64 }
//! # impl Actuator for Motor {
//! #     fn set_power(&mut self, power: f64) { self.power = power; }
//! #     fn power(&self) -> f64 { self.power }
//! #     fn position(&self) -> f64 { self.count }
//! #     fn reset_position(&mut self) { self.count = 0.0; }
//! # }
//! let clock = ManualClock::new();
//! let base = DriveBase::builder("base", DriveParams::differential(0.01, 0.3))
//!     .wheel(WheelPosition::LeftFront, shared_actuator(Motor::default()))
//!     .wheel(WheelPosition::RightFront, shared_actuator(Motor::default()))
//!     .build()?;
//!
//! let drive = PidDrive::builder("drive", base, clock.shared())
//!     .y_pid(PidParams::new().with_gains(0.5, 0.0, 0.0).with_tolerance(0.02))
//!     .turn_pid(PidParams::new().with_gains(0.02, 0.0, 0.0).with_tolerance(2.0))
//!     .build()?;
//!
//! let done = Event::new("drive.done");
//! drive.set_target(
//!     DriveTarget::new().with_y(1.0).with_turn(0.0),
//!     TargetMode::Relative,
//!     Some(&done),
//!     Some(Duration::from_secs(4)),
//! );
//! drive.tick();
//! assert!(drive.is_active());
//! # Ok::<(), wheelbot_drive::DriveError>(())
//! ```

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};
use wheelbot_control::{ControlError, PidController, PidParams, TargetMode};
use wheelbot_sched::clock::SharedClock;
use wheelbot_sched::{Event, Phase, Scheduler, Tick};

use crate::drive_base::{DriveBase, Preemptible};
use crate::error::DriveError;
use crate::outcome::MoveOutcome;

/// 闭环轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveAxis {
    /// 横移
    X,
    /// 前进
    Y,
    /// 转向
    Turn,
}

impl DriveAxis {
    /// 全部轴
    pub const ALL: [DriveAxis; 3] = [DriveAxis::X, DriveAxis::Y, DriveAxis::Turn];

    fn as_str(self) -> &'static str {
        match self {
            DriveAxis::X => "x",
            DriveAxis::Y => "y",
            DriveAxis::Turn => "turn",
        }
    }
}

/// 底盘运动目标
///
/// 未指定的轴保持当前设定值（等价于相对目标 0）。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveTarget {
    /// 横移目标
    pub x: Option<f64>,
    /// 前进目标
    pub y: Option<f64>,
    /// 航向目标（度）
    pub turn: Option<f64>,
}

impl DriveTarget {
    /// 空目标（所有轴保持）
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置横移目标
    pub fn with_x(mut self, x: f64) -> Self {
        self.x = Some(x);
        self
    }

    /// 设置前进目标
    pub fn with_y(mut self, y: f64) -> Self {
        self.y = Some(y);
        self
    }

    /// 设置航向目标
    pub fn with_turn(mut self, turn: f64) -> Self {
        self.turn = Some(turn);
        self
    }

    fn get(&self, axis: DriveAxis) -> Option<f64> {
        match axis {
            DriveAxis::X => self.x,
            DriveAxis::Y => self.y,
            DriveAxis::Turn => self.turn,
        }
    }
}

/// PID 驱动状态快照（遥测使用）
#[derive(Debug, Clone, PartialEq)]
pub struct PidDriveStatus {
    /// 驱动名称
    pub name: String,
    /// 是否有运动在进行
    pub active: bool,
    /// 各轴设定值（未配置的轴为 None）
    pub setpoints: DriveTarget,
    /// 各轴最近一次误差
    pub errors: DriveTarget,
    /// 最近一次运动的结束原因
    pub last_outcome: Option<MoveOutcome>,
}

struct MoveState {
    /// 按 [`DriveAxis::ALL`] 顺序
    loops: [Option<PidController>; 3],
    active: bool,
    event: Option<Event>,
    deadline: Option<Duration>,
    last_outcome: Option<MoveOutcome>,
}

impl MoveState {
    fn controller(&mut self, axis: DriveAxis) -> Option<&mut PidController> {
        self.loops[axis as usize].as_mut()
    }

    fn snapshot(&self, f: impl Fn(&PidController) -> f64) -> DriveTarget {
        let [x, y, turn] = &self.loops;
        DriveTarget {
            x: x.as_ref().map(&f),
            y: y.as_ref().map(&f),
            turn: turn.as_ref().map(&f),
        }
    }
}

struct Shared {
    name: String,
    base: DriveBase,
    clock: SharedClock,
    state: Mutex<MoveState>,
    me: Weak<Shared>,
}

impl Shared {
    fn as_owner(&self) -> Weak<dyn Preemptible> {
        self.me.clone()
    }

    fn finish(&self, state: &mut MoveState, outcome: MoveOutcome) {
        self.base.write_tank(0.0, 0.0);
        state.active = false;
        state.deadline = None;
        state.last_outcome = Some(outcome);
        if let Some(event) = state.event.take() {
            event.signal();
        }
        self.base.release(&self.as_owner());

        let pose = self.base.pose();
        debug!(
            "PID drive {} move finished: {} (x {:.3}, y {:.3}, heading {:.2})",
            self.name, outcome, pose.x, pose.y, pose.heading
        );
    }

    fn cancel(&self) {
        let mut state = self.state.lock();
        if state.active {
            self.finish(&mut state, MoveOutcome::Cancelled);
        }
    }
}

impl Preemptible for Shared {
    fn owner_name(&self) -> &str {
        &self.name
    }

    fn preempt(&self) {
        self.cancel();
    }
}

enum LoopSpec {
    Controller(PidController),
    Params(PidParams),
}

/// PID 驱动构建器
pub struct PidDriveBuilder {
    name: String,
    base: DriveBase,
    clock: SharedClock,
    loops: [Option<LoopSpec>; 3],
}

impl PidDriveBuilder {
    /// 横移闭环（过程变量为底盘横移）
    pub fn x_pid(mut self, params: PidParams) -> Self {
        self.loops[DriveAxis::X as usize] = Some(LoopSpec::Params(params));
        self
    }

    /// 前进闭环（过程变量为底盘前进距离）
    pub fn y_pid(mut self, params: PidParams) -> Self {
        self.loops[DriveAxis::Y as usize] = Some(LoopSpec::Params(params));
        self
    }

    /// 转向闭环（过程变量为底盘航向）
    pub fn turn_pid(mut self, params: PidParams) -> Self {
        self.loops[DriveAxis::Turn as usize] = Some(LoopSpec::Params(params));
        self
    }

    /// 使用自定义过程变量的控制器
    ///
    /// 例如以寻线传感器读数作为转向闭环输入。
    pub fn controller(mut self, axis: DriveAxis, pid: PidController) -> Self {
        self.loops[axis as usize] = Some(LoopSpec::Controller(pid));
        self
    }

    /// 构建 PID 驱动
    ///
    /// # 错误
    ///
    /// - 没有配置任何闭环
    /// - PID 参数无效
    pub fn build(self) -> Result<PidDrive, DriveError> {
        if self.loops.iter().all(Option::is_none) {
            return Err(DriveError::NoControllers(self.name));
        }

        let mut loops: [Option<PidController>; 3] = [None, None, None];
        for (axis, spec) in DriveAxis::ALL.into_iter().zip(self.loops) {
            loops[axis as usize] = match spec {
                None => None,
                Some(LoopSpec::Controller(pid)) => Some(pid),
                Some(LoopSpec::Params(params)) => {
                    let base = self.base.clone();
                    let name = format!("{}.{}", self.name, axis.as_str());
                    let clock = self.clock.clone();
                    let pid = match axis {
                        DriveAxis::X => {
                            PidController::new(name, params, clock, move || base.get_x_position())
                        },
                        DriveAxis::Y => {
                            PidController::new(name, params, clock, move || base.get_y_position())
                        },
                        DriveAxis::Turn => {
                            PidController::new(name, params, clock, move || base.get_heading())
                        },
                    }?;
                    Some(pid)
                },
            };
        }

        debug!(
            "PID drive {} built on {}: loops [{}]",
            self.name,
            self.base.name(),
            DriveAxis::ALL
                .iter()
                .filter(|a| loops[**a as usize].is_some())
                .map(|a| a.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let (name, base, clock) = (self.name, self.base, self.clock);
        let shared = Arc::new_cyclic(|me| Shared {
            name,
            base,
            clock,
            state: Mutex::new(MoveState {
                loops,
                active: false,
                event: None,
                deadline: None,
                last_outcome: None,
            }),
            me: me.clone(),
        });
        Ok(PidDrive { shared })
    }
}

/// 闭环底盘驱动
///
/// 句柄可克隆，所有克隆共享同一状态。
#[derive(Clone)]
pub struct PidDrive {
    shared: Arc<Shared>,
}

impl PidDrive {
    /// 创建构建器
    pub fn builder(name: impl Into<String>, base: DriveBase, clock: SharedClock) -> PidDriveBuilder {
        PidDriveBuilder {
            name: name.into(),
            base,
            clock,
            loops: [None, None, None],
        }
    }

    /// 驱动名称
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// 所驱动的底盘
    pub fn base(&self) -> &DriveBase {
        &self.shared.base
    }

    /// 是否配置了某个轴的闭环
    pub fn has_axis(&self, axis: DriveAxis) -> bool {
        self.shared.state.lock().loops[axis as usize].is_some()
    }

    /// 是否有运动在进行
    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active
    }

    /// 最近一次运动的结束原因
    pub fn last_outcome(&self) -> Option<MoveOutcome> {
        self.shared.state.lock().last_outcome
    }

    /// 状态快照
    pub fn status(&self) -> PidDriveStatus {
        let state = self.shared.state.lock();
        PidDriveStatus {
            name: self.shared.name.clone(),
            active: state.active,
            setpoints: state.snapshot(PidController::setpoint),
            errors: state.snapshot(PidController::error),
            last_outcome: state.last_outcome,
        }
    }

    /// 临时限制某个轴的输出范围（例如寻线时降低速度）
    ///
    /// 未配置的轴忽略。
    pub fn set_output_range(&self, axis: DriveAxis, min: f64, max: f64) -> Result<(), ControlError> {
        match self.shared.state.lock().controller(axis) {
            Some(pid) => pid.set_output_range(min, max),
            None => Ok(()),
        }
    }

    /// 开始闭环运动
    ///
    /// # 参数
    ///
    /// - `target`: 各轴目标；未指定的轴保持当前设定值
    /// - `mode`: 绝对 / 相对
    /// - `event`: 完成事件（会先被清除，结束时触发一次）
    /// - `timeout`: 超时时间（None 表示不限时）
    pub fn set_target(
        &self,
        target: DriveTarget,
        mode: TargetMode,
        event: Option<&Event>,
        timeout: Option<Duration>,
    ) {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if state.active {
            debug!("PID drive {}: new target replaces active move", shared.name);
            shared.finish(&mut state, MoveOutcome::Cancelled);
        }

        // 接管底盘：抢占其他 PID 驱动
        if let Some(previous) = shared.base.claim(shared.as_owner()) {
            debug!(
                "PID drive {} preempts {} on {}",
                shared.name,
                previous.owner_name(),
                shared.base.name()
            );
            previous.preempt();
        }

        shared.base.update_pose();
        for axis in DriveAxis::ALL {
            if let Some(pid) = state.controller(axis) {
                match target.get(axis) {
                    Some(value) => pid.set_target(value, mode),
                    None => pid.set_target(0.0, TargetMode::Relative),
                }
            }
        }

        if let Some(event) = event {
            event.clear();
        }
        state.event = event.cloned();
        state.deadline = timeout.map(|t| shared.clock.now() + t);
        state.active = true;

        debug!(
            "PID drive {} move started: {:?}, timeout {:?}",
            shared.name,
            state.snapshot(PidController::setpoint),
            timeout
        );
    }

    /// 取消进行中的运动
    ///
    /// 输出清零并触发完成事件；没有运动时为空操作。
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// 每周期调用一次
    pub fn tick(&self) {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if !state.active {
            return;
        }

        if let Some(deadline) = state.deadline
            && shared.clock.now() >= deadline
        {
            shared.finish(&mut state, MoveOutcome::TimedOut);
            return;
        }

        shared.base.update_pose();

        let mut outputs = [0.0f64; 3];
        let mut on_target = true;
        for axis in DriveAxis::ALL {
            if let Some(pid) = state.controller(axis) {
                outputs[axis as usize] = pid.compute();
                on_target &= pid.is_on_target();
            }
        }

        if on_target {
            shared.finish(&mut state, MoveOutcome::TargetReached);
            return;
        }

        let [x, y, turn] = outputs;
        trace!(
            "PID drive {} outputs: x {:.4} y {:.4} turn {:.4}",
            shared.name, x, y, turn
        );
        if state.loops[DriveAxis::X as usize].is_some() {
            shared.base.write_mecanum(x, y, turn, None);
        } else {
            shared.base.write_arcade(y, turn);
        }
    }

    /// 注册到调度器（任务名 `pid_drive:<name>`）
    pub fn attach(&self, scheduler: &Scheduler, phase: Phase) -> bool {
        let drive = self.clone();
        scheduler.register(&self.task_name(), phase, move |_tick: &Tick| drive.tick())
    }

    /// 从调度器注销
    pub fn detach(&self, scheduler: &Scheduler, phase: Phase) -> bool {
        scheduler.unregister(&self.task_name(), phase)
    }

    fn task_name(&self) -> String {
        format!("pid_drive:{}", self.shared.name)
    }

    // ==================== 手动驱动 ====================

    /// 坦克驱动（先取消进行中的运动）
    pub fn tank_drive(&self, left: f64, right: f64) {
        self.cancel();
        self.shared.base.tank_drive(left, right);
    }

    /// 街机驱动（先取消进行中的运动）
    pub fn arcade_drive(&self, drive: f64, turn: f64) {
        self.cancel();
        self.shared.base.arcade_drive(drive, turn);
    }

    /// 麦克纳姆驱动（先取消进行中的运动）
    pub fn mecanum_drive(&self, x: f64, y: f64, rotation: f64, heading: Option<f64>) {
        self.cancel();
        self.shared.base.mecanum_drive(x, y, rotation, heading);
    }
}

impl fmt::Debug for PidDrive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PidDrive")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
