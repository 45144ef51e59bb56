//! Drive Base - 驱动底盘
//!
//! 把驾驶指令（坦克 / 街机 / 麦克纳姆）转换为每轮功率，并根据轮子位移维护位姿。
//!
//! # 位姿
//!
//! - `x`: 机器人坐标系下的累计横移（仅麦克纳姆底盘）
//! - `y`: 机器人坐标系下的累计前进距离
//! - `heading`: 航向（度，顺时针为正）；有航向源时直接读取，否则由左右轮位移差推算
//!
//! 位姿由 [`DriveBase::update_pose`] 按每周期的轮子位移增量累计，
//! [`DriveBase::reset_position`] 原子地清零位姿并重新记录编码器快照。
//!
//! # 所有权
//!
//! 同一时刻只有一个闭环驱动（PID 驱动）可以控制底盘。新的闭环驱动接管底盘、
//! 或者直接调用手动驱动方法时，之前的控制者会先被取消。
//!
//! # 示例
//!
//! ```rust
//! use wheelbot_drive::{DriveBase, DriveParams, WheelPosition};
//! use wheelbot_drive::hal::{Actuator, shared_actuator};
//!
//! #[derive(Default)]
//! struct Motor { power: f64, count: f64 }
//!
//! impl Actuator for Motor {
//!     fn set_power(&mut self, power: f64) { self.power = power; }
//!     fn power(&self) -> f64 { self.power }
//!     fn position(&self) -> f64 { self.count }
//!     fn reset_position(&mut self) { self.count = 0.0; }
//! }
//!
//! let left = Motor::default();
//! let right = Motor::default();
//!
//! let base = DriveBase::builder("base", DriveParams::differential(0.01, 0.3))
//!     .wheel(WheelPosition::LeftFront, shared_actuator(left))
//!     .wheel(WheelPosition::RightFront, shared_actuator(right))
//!     .build()?;
//!
//! base.arcade_drive(0.5, 0.1);
//! # Ok::<(), wheelbot_drive::DriveError>(())
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};
use wheelbot_sched::{Phase, Scheduler, Tick};

use crate::error::DriveError;
use crate::hal::{HeadingSource, SharedActuator, sanitize_power};
use crate::kinematics;

/// 底盘类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DriveKind {
    /// 差速（2 轮或 4 轮）
    #[default]
    Differential,
    /// 麦克纳姆（4 轮）
    Mecanum,
}

/// 轮子安装位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WheelPosition {
    LeftFront,
    RightFront,
    LeftBack,
    RightBack,
}

impl WheelPosition {
    fn is_left(self) -> bool {
        matches!(self, WheelPosition::LeftFront | WheelPosition::LeftBack)
    }

    fn mecanum_index(self) -> usize {
        match self {
            WheelPosition::LeftFront => 0,
            WheelPosition::RightFront => 1,
            WheelPosition::LeftBack => 2,
            WheelPosition::RightBack => 3,
        }
    }
}

/// 底盘参数
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriveParams {
    /// 底盘类型
    pub kind: DriveKind,
    /// 前进方向：每个位置单位对应的距离
    pub distance_per_count: f64,
    /// 横移方向：每个位置单位对应的距离（麦克纳姆轮打滑系数不同）
    pub strafe_per_count: f64,
    /// 轮距（没有航向源时用于推算航向）
    pub track_width: f64,
}

impl Default for DriveParams {
    fn default() -> Self {
        Self {
            kind: DriveKind::Differential,
            distance_per_count: 1.0,
            strafe_per_count: 1.0,
            track_width: 0.0,
        }
    }
}

impl DriveParams {
    /// 差速底盘参数
    pub fn differential(distance_per_count: f64, track_width: f64) -> Self {
        Self {
            kind: DriveKind::Differential,
            distance_per_count,
            strafe_per_count: distance_per_count,
            track_width,
        }
    }

    /// 麦克纳姆底盘参数
    pub fn mecanum(distance_per_count: f64, strafe_per_count: f64, track_width: f64) -> Self {
        Self {
            kind: DriveKind::Mecanum,
            distance_per_count,
            strafe_per_count,
            track_width,
        }
    }

    /// 校验参数
    ///
    /// 没有航向源时轮距必须为正。
    pub fn validate(&self, has_heading_source: bool) -> Result<(), DriveError> {
        for (name, value) in [
            ("distance_per_count", self.distance_per_count),
            ("strafe_per_count", self.strafe_per_count),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DriveError::InvalidScale { name, value });
            }
        }
        if !has_heading_source && !(self.track_width.is_finite() && self.track_width > 0.0) {
            return Err(DriveError::MissingHeadingSource(self.track_width));
        }
        Ok(())
    }
}

/// 底盘位姿
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose {
    /// 累计横移
    pub x: f64,
    /// 累计前进
    pub y: f64,
    /// 航向（度）
    pub heading: f64,
}

/// 可被抢占的底盘控制者
pub(crate) trait Preemptible: Send + Sync {
    /// 控制者名称
    fn owner_name(&self) -> &str;
    /// 取消当前运动，不释放底盘所有权以外的任何东西
    fn preempt(&self);
}

struct Wheel {
    position: WheelPosition,
    actuator: SharedActuator,
    /// 上一次位姿更新时的编码器读数
    last_count: f64,
}

struct DriveState {
    wheels: SmallVec<[Wheel; 4]>,
    heading_source: Option<Box<dyn HeadingSource>>,
    heading_offset: f64,
    /// 由轮子推算的累计航向
    wheel_heading: f64,
    pose: Pose,
}

impl DriveState {
    fn write(&mut self, mut power_of: impl FnMut(WheelPosition) -> f64) {
        for wheel in &self.wheels {
            let power = sanitize_power(power_of(wheel.position));
            wheel.actuator.lock().set_power(power);
        }
    }

    fn read_heading(&mut self) -> Option<f64> {
        self.heading_source.as_mut().map(|source| source.heading())
    }
}

/// 底盘构建器
pub struct DriveBaseBuilder {
    name: String,
    params: DriveParams,
    wheels: Vec<(WheelPosition, SharedActuator)>,
    heading_source: Option<Box<dyn HeadingSource>>,
}

impl DriveBaseBuilder {
    /// 安装一个轮子
    pub fn wheel(mut self, position: WheelPosition, actuator: SharedActuator) -> Self {
        self.wheels.push((position, actuator));
        self
    }

    /// 设置航向源
    pub fn heading_source(mut self, source: impl HeadingSource + 'static) -> Self {
        self.heading_source = Some(Box::new(source));
        self
    }

    /// 构建底盘
    ///
    /// # 错误
    ///
    /// - 轮子数量或位置不符合底盘类型
    /// - 位移换算系数无效
    /// - 没有航向源且轮距无效
    pub fn build(self) -> Result<DriveBase, DriveError> {
        let count = self.wheels.len();
        match self.params.kind {
            DriveKind::Differential if count != 2 && count != 4 => {
                return Err(DriveError::InvalidWheelCount {
                    kind: DriveKind::Differential,
                    expected: "2 or 4",
                    count,
                });
            },
            DriveKind::Mecanum if count != 4 => {
                return Err(DriveError::InvalidWheelCount {
                    kind: DriveKind::Mecanum,
                    expected: "4",
                    count,
                });
            },
            _ => {},
        }

        for (i, (position, _)) in self.wheels.iter().enumerate() {
            if self.wheels[..i].iter().any(|(p, _)| p == position) {
                return Err(DriveError::DuplicateWheel(*position));
            }
        }

        let has_left = self.wheels.iter().any(|(p, _)| p.is_left());
        let has_right = self.wheels.iter().any(|(p, _)| !p.is_left());
        if !(has_left && has_right) {
            return Err(DriveError::MissingSide);
        }

        self.params.validate(self.heading_source.is_some())?;

        let wheels = self
            .wheels
            .into_iter()
            .map(|(position, actuator)| {
                let last_count = actuator.lock().position();
                Wheel {
                    position,
                    actuator,
                    last_count,
                }
            })
            .collect();

        let mut state = DriveState {
            wheels,
            heading_source: self.heading_source,
            heading_offset: 0.0,
            wheel_heading: 0.0,
            pose: Pose::default(),
        };
        state.heading_offset = state.read_heading().unwrap_or(0.0);

        debug!(
            "Drive base {} built: {:?}, {} wheels, heading from {}",
            self.name,
            self.params.kind,
            count,
            if state.heading_source.is_some() {
                "sensor"
            } else {
                "wheels"
            }
        );

        Ok(DriveBase {
            name: self.name.into(),
            params: Arc::new(self.params),
            state: Arc::new(Mutex::new(state)),
            owner: Arc::new(Mutex::new(None)),
        })
    }
}

/// 驱动底盘
///
/// 句柄可克隆，所有克隆共享同一底盘。
#[derive(Clone)]
pub struct DriveBase {
    name: Arc<str>,
    params: Arc<DriveParams>,
    state: Arc<Mutex<DriveState>>,
    owner: Arc<Mutex<Option<Weak<dyn Preemptible>>>>,
}

impl DriveBase {
    /// 创建构建器
    pub fn builder(name: impl Into<String>, params: DriveParams) -> DriveBaseBuilder {
        DriveBaseBuilder {
            name: name.into(),
            params,
            wheels: Vec::with_capacity(4),
            heading_source: None,
        }
    }

    /// 底盘名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 底盘参数
    pub fn params(&self) -> &DriveParams {
        &self.params
    }

    /// 底盘类型
    pub fn kind(&self) -> DriveKind {
        self.params.kind
    }

    // ==================== 手动驱动 ====================

    /// 坦克驱动
    ///
    /// 左右功率分别限制在 [-1.0, 1.0]。会先取消当前的闭环控制者。
    pub fn tank_drive(&self, left: f64, right: f64) {
        self.preempt_owner();
        self.write_tank(left, right);
    }

    /// 街机驱动
    ///
    /// 会先取消当前的闭环控制者。
    pub fn arcade_drive(&self, drive: f64, turn: f64) {
        self.preempt_owner();
        self.write_arcade(drive, turn);
    }

    /// 麦克纳姆驱动
    ///
    /// 给定 `heading` 时 `(x, y)` 为场地坐标。差速底盘忽略横移分量。
    /// 会先取消当前的闭环控制者。
    pub fn mecanum_drive(&self, x: f64, y: f64, rotation: f64, heading: Option<f64>) {
        self.preempt_owner();
        self.write_mecanum(x, y, rotation, heading);
    }

    /// 停止所有轮子
    pub fn stop(&self) {
        self.tank_drive(0.0, 0.0);
    }

    pub(crate) fn write_tank(&self, left: f64, right: f64) {
        let [left, right] = kinematics::tank(left, right);
        trace!("Drive base {} tank: {:.3} {:.3}", self.name, left, right);
        self.state
            .lock()
            .write(|p| if p.is_left() { left } else { right });
    }

    pub(crate) fn write_arcade(&self, drive: f64, turn: f64) {
        let [left, right] = kinematics::arcade(drive, turn);
        trace!("Drive base {} arcade: {:.3} {:.3}", self.name, left, right);
        self.state
            .lock()
            .write(|p| if p.is_left() { left } else { right });
    }

    pub(crate) fn write_mecanum(&self, x: f64, y: f64, rotation: f64, heading: Option<f64>) {
        match self.params.kind {
            DriveKind::Mecanum => {
                let powers = kinematics::mecanum(x, y, rotation, heading);
                trace!("Drive base {} mecanum: {:?}", self.name, powers);
                self.state.lock().write(|p| powers[p.mecanum_index()]);
            },
            DriveKind::Differential => {
                let y = match heading {
                    Some(h) if h.is_finite() => kinematics::field_to_robot(x, y, h).1,
                    _ => y,
                };
                self.write_arcade(y, rotation);
            },
        }
    }

    /// 各轮当前功率（按安装顺序）
    pub fn wheel_powers(&self) -> Vec<(WheelPosition, f64)> {
        self.state
            .lock()
            .wheels
            .iter()
            .map(|w| (w.position, w.actuator.lock().power()))
            .collect()
    }

    // ==================== 位姿 ====================

    /// 根据本周期的轮子位移增量更新位姿
    pub fn update_pose(&self) {
        let mut state = self.state.lock();
        let params = &self.params;

        let mut deltas = [0.0f64; 4];
        let mut left = (0.0, 0usize);
        let mut right = (0.0, 0usize);
        for wheel in state.wheels.iter_mut() {
            let count = wheel.actuator.lock().position();
            let delta = count - wheel.last_count;
            wheel.last_count = count;
            deltas[wheel.position.mecanum_index()] = delta;
            if wheel.position.is_left() {
                left = (left.0 + delta, left.1 + 1);
            } else {
                right = (right.0 + delta, right.1 + 1);
            }
        }
        let left = left.0 / left.1.max(1) as f64;
        let right = right.0 / right.1.max(1) as f64;

        let (dx, dy, dheading) = match params.kind {
            DriveKind::Differential => {
                let (forward, heading) = kinematics::differential_forward(
                    left * params.distance_per_count,
                    right * params.distance_per_count,
                    params.track_width,
                );
                (0.0, forward, heading)
            },
            DriveKind::Mecanum => {
                let (x, _, _) = kinematics::mecanum_forward(deltas, params.track_width);
                let (forward, heading) = kinematics::differential_forward(
                    left * params.distance_per_count,
                    right * params.distance_per_count,
                    params.track_width,
                );
                (x * params.strafe_per_count, forward, heading)
            },
        };

        state.pose.x += dx;
        state.pose.y += dy;
        state.wheel_heading += dheading;
        let heading = match state.read_heading() {
            Some(h) => h - state.heading_offset,
            None => state.wheel_heading,
        };
        state.pose.heading = heading;
    }

    /// 位姿清零
    ///
    /// 清零位姿、重新记录编码器快照与航向偏置，三者在同一临界区内完成。
    pub fn reset_position(&self) {
        let mut state = self.state.lock();
        for wheel in state.wheels.iter_mut() {
            wheel.last_count = wheel.actuator.lock().position();
        }
        state.heading_offset = state.read_heading().unwrap_or(0.0);
        state.wheel_heading = 0.0;
        state.pose = Pose::default();
        debug!("Drive base {} position reset", self.name);
    }

    /// 当前位姿
    pub fn pose(&self) -> Pose {
        self.state.lock().pose
    }

    /// 累计横移
    pub fn get_x_position(&self) -> f64 {
        self.state.lock().pose.x
    }

    /// 累计前进
    pub fn get_y_position(&self) -> f64 {
        self.state.lock().pose.y
    }

    /// 航向（度）
    pub fn get_heading(&self) -> f64 {
        self.state.lock().pose.heading
    }

    /// 注册位姿更新任务（每周期在 `phase` 阶段执行一次）
    ///
    /// 任务名为 `drive:<name>`。通常使用 [`Phase::PrePeriodic`]，
    /// 让本周期的所有闭环看到最新位姿。
    pub fn attach(&self, scheduler: &Scheduler, phase: Phase) -> bool {
        let base = self.clone();
        scheduler.register(&self.task_name(), phase, move |_tick: &Tick| {
            base.update_pose();
        })
    }

    /// 注销位姿更新任务
    pub fn detach(&self, scheduler: &Scheduler, phase: Phase) -> bool {
        scheduler.unregister(&self.task_name(), phase)
    }

    fn task_name(&self) -> String {
        format!("drive:{}", self.name)
    }

    // ==================== 所有权 ====================

    /// 当前闭环控制者名称
    pub fn owner(&self) -> Option<String> {
        self.owner
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|owner| owner.owner_name().to_string())
    }

    /// 接管底盘，返回需要被抢占的前一个控制者
    pub(crate) fn claim(&self, owner: Weak<dyn Preemptible>) -> Option<Arc<dyn Preemptible>> {
        let previous = self.owner.lock().replace(owner.clone());
        previous
            .filter(|prev| !Weak::ptr_eq(prev, &owner))
            .and_then(|prev| prev.upgrade())
    }

    /// 释放底盘（仅当 `owner` 仍是当前控制者）
    pub(crate) fn release(&self, owner: &Weak<dyn Preemptible>) {
        let mut slot = self.owner.lock();
        if slot.as_ref().is_some_and(|current| Weak::ptr_eq(current, owner)) {
            *slot = None;
        }
    }

    fn preempt_owner(&self) {
        // 锁外调用，控制者取消时会写底盘
        let owner = self.owner.lock().take().and_then(|weak| weak.upgrade());
        if let Some(owner) = owner {
            debug!(
                "Drive base {}: manual drive preempts {}",
                self.name,
                owner.owner_name()
            );
            owner.preempt();
        }
    }
}

impl fmt::Debug for DriveBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveBase")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("pose", &self.pose())
            .field("owner", &self.owner())
            .finish()
    }
}
