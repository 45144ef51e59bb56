//! PID Motor - 闭环电机
//!
//! 单个执行机构上的位置闭环（例如升降机构、机械臂关节）。
//!
//! # 生命周期
//!
//! ```text
//! IDLE --set_target--> ACTIVE --(到达 | 超时 | 取消 | 限位)--> IDLE
//! ```
//!
//! 进入 IDLE 时输出清零，完成事件恰好触发一次，并记录 [`MoveOutcome`]。
//! 运动进行中再次 `set_target` 会先以 `Cancelled` 结束当前运动（旧事件被触发），再开始新运动。
//!
//! # 限位开关
//!
//! 可选的下限位 / 上限位读取函数。朝已按下的限位方向输出时：
//! - 闭环运动以 [`MoveOutcome::LimitReached`] 结束
//! - 手动功率被置 0，同样记录 `LimitReached`
//!
//! # 示例
//!
//! ```rust
//! use wheelbot_control::{PidParams, TargetMode};
//! use wheelbot_drive::PidMotor;
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
//! let params = PidParams::new().with_gains(0.05, 0.0, 0.0).with_tolerance(2.0);
//! let elevator = PidMotor::with_position_feedback(
//!     "elevator",
//!     shared_actuator(Motor::default()),
//!     params,
//!     clock.shared(),
//! )?;
//!
//! let done = Event::new("elevator.done");
//! elevator.set_target(300.0, TargetMode::Absolute, Some(&done), Some(Duration::from_secs(3)));
//! elevator.tick();
//! assert!(elevator.is_active());
//! # Ok::<(), wheelbot_drive::DriveError>(())
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};
use wheelbot_control::{PidController, PidParams, TargetMode};
use wheelbot_sched::clock::SharedClock;
use wheelbot_sched::{Event, Phase, Scheduler, Tick};

use crate::error::DriveError;
use crate::hal::{SharedActuator, sanitize_power};
use crate::outcome::MoveOutcome;

/// 限位开关读取函数（按下返回 true）
pub type LimitSwitch = Box<dyn FnMut() -> bool + Send>;

struct MotorState {
    pid: PidController,
    active: bool,
    event: Option<Event>,
    deadline: Option<Duration>,
    manual_power: f64,
    last_outcome: Option<MoveOutcome>,
    lower_limit: Option<LimitSwitch>,
    upper_limit: Option<LimitSwitch>,
}

impl MotorState {
    /// 朝已按下的限位方向输出
    fn blocked(&mut self, power: f64) -> bool {
        let pressed = |limit: &mut Option<LimitSwitch>| limit.as_mut().is_some_and(|f| f());
        (power < 0.0 && pressed(&mut self.lower_limit))
            || (power > 0.0 && pressed(&mut self.upper_limit))
    }
}

/// 闭环电机
///
/// 句柄可克隆，所有克隆共享同一状态（例如触发器处理函数持有一份用于取消）。
#[derive(Clone)]
pub struct PidMotor {
    name: Arc<str>,
    actuator: SharedActuator,
    clock: SharedClock,
    state: Arc<Mutex<MotorState>>,
}

impl PidMotor {
    /// 创建闭环电机
    ///
    /// 控制器的过程变量由调用方决定（例如外置编码器或电位器）。
    pub fn new(
        name: impl Into<String>,
        actuator: SharedActuator,
        pid: PidController,
        clock: SharedClock,
    ) -> Self {
        let name: String = name.into();
        Self {
            name: name.into(),
            actuator,
            clock,
            state: Arc::new(Mutex::new(MotorState {
                pid,
                active: false,
                event: None,
                deadline: None,
                manual_power: 0.0,
                last_outcome: None,
                lower_limit: None,
                upper_limit: None,
            })),
        }
    }

    /// 以执行机构自身位置为过程变量创建闭环电机
    ///
    /// # 错误
    ///
    /// PID 参数无效时返回 [`DriveError::Control`]。
    pub fn with_position_feedback(
        name: impl Into<String>,
        actuator: SharedActuator,
        params: PidParams,
        clock: SharedClock,
    ) -> Result<Self, DriveError> {
        let name: String = name.into();
        let feedback = actuator.clone();
        let pid = PidController::new(name.as_str(), params, clock.clone(), move || {
            feedback.lock().position()
        })?;
        Ok(Self::new(name, actuator, pid, clock))
    }

    /// 设置下限位开关
    pub fn with_lower_limit<F>(self, limit: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.state.lock().lower_limit = Some(Box::new(limit));
        self
    }

    /// 设置上限位开关
    pub fn with_upper_limit<F>(self, limit: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.state.lock().upper_limit = Some(Box::new(limit));
        self
    }

    /// 电机名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 执行机构当前位置
    pub fn position(&self) -> f64 {
        self.actuator.lock().position()
    }

    /// 当前设定值
    pub fn target(&self) -> f64 {
        self.state.lock().pid.setpoint()
    }

    /// 是否有闭环运动在进行
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// 最近一次运动的结束原因
    pub fn last_outcome(&self) -> Option<MoveOutcome> {
        self.state.lock().last_outcome
    }

    /// 临时限制闭环输出范围
    pub fn set_output_range(&self, min: f64, max: f64) -> Result<(), DriveError> {
        self.state.lock().pid.set_output_range(min, max)?;
        Ok(())
    }

    /// 开始闭环运动
    ///
    /// # 参数
    ///
    /// - `target`: 目标位置（`mode` 为相对时是增量）
    /// - `event`: 完成事件（会先被清除，结束时触发一次）
    /// - `timeout`: 超时时间（None 表示不限时）
    pub fn set_target(
        &self,
        target: f64,
        mode: TargetMode,
        event: Option<&Event>,
        timeout: Option<Duration>,
    ) {
        let mut state = self.state.lock();
        if state.active {
            debug!("PID motor {}: new target replaces active move", self.name);
            self.finish(&mut state, MoveOutcome::Cancelled);
        }

        state.pid.set_target(target, mode);
        if let Some(event) = event {
            event.clear();
        }
        state.event = event.cloned();
        state.deadline = timeout.map(|t| self.clock.now() + t);
        state.manual_power = 0.0;
        state.active = true;

        debug!(
            "PID motor {} move started: setpoint {:.3}, timeout {:?}",
            self.name,
            state.pid.setpoint(),
            timeout
        );
    }

    /// 手动设置功率
    ///
    /// 先取消进行中的闭环运动。朝已按下的限位方向时输出 0。
    pub fn set_power(&self, power: f64) {
        let mut state = self.state.lock();
        if state.active {
            self.finish(&mut state, MoveOutcome::Cancelled);
        }

        let power = sanitize_power(power);
        if state.blocked(power) {
            debug!("PID motor {}: power {:.3} blocked by limit switch", self.name, power);
            state.manual_power = 0.0;
            state.last_outcome = Some(MoveOutcome::LimitReached);
            self.actuator.lock().set_power(0.0);
            return;
        }
        state.manual_power = power;
        self.actuator.lock().set_power(power);
    }

    /// 取消
    ///
    /// 输出清零；有闭环运动时以 `Cancelled` 结束并触发事件。
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if state.active {
            self.finish(&mut state, MoveOutcome::Cancelled);
        } else {
            state.manual_power = 0.0;
            self.actuator.lock().set_power(0.0);
        }
    }

    /// 每周期调用一次
    pub fn tick(&self) {
        let mut state = self.state.lock();

        if !state.active {
            // 手动功率同样受限位保护
            let power = state.manual_power;
            if power != 0.0 && state.blocked(power) {
                debug!("PID motor {}: manual power stopped at limit switch", self.name);
                state.manual_power = 0.0;
                state.last_outcome = Some(MoveOutcome::LimitReached);
                self.actuator.lock().set_power(0.0);
            }
            return;
        }

        if let Some(deadline) = state.deadline
            && self.clock.now() >= deadline
        {
            self.finish(&mut state, MoveOutcome::TimedOut);
            return;
        }

        let output = state.pid.compute();
        if state.pid.is_on_target() {
            self.finish(&mut state, MoveOutcome::TargetReached);
            return;
        }
        if state.blocked(output) {
            self.finish(&mut state, MoveOutcome::LimitReached);
            return;
        }

        trace!("PID motor {} output {:.4}", self.name, output);
        self.actuator.lock().set_power(output);
    }

    /// 注册到调度器（任务名 `motor:<name>`）
    pub fn attach(&self, scheduler: &Scheduler, phase: Phase) -> bool {
        let motor = self.clone();
        scheduler.register(&self.task_name(), phase, move |_tick: &Tick| motor.tick())
    }

    /// 从调度器注销
    pub fn detach(&self, scheduler: &Scheduler, phase: Phase) -> bool {
        scheduler.unregister(&self.task_name(), phase)
    }

    fn task_name(&self) -> String {
        format!("motor:{}", self.name)
    }

    fn finish(&self, state: &mut MotorState, outcome: MoveOutcome) {
        self.actuator.lock().set_power(0.0);
        state.active = false;
        state.deadline = None;
        state.manual_power = 0.0;
        state.last_outcome = Some(outcome);
        if let Some(event) = state.event.take() {
            event.signal();
        }
        debug!(
            "PID motor {} move finished: {} (position {:.3}, setpoint {:.3})",
            self.name,
            outcome,
            state.pid.last_input(),
            state.pid.setpoint()
        );
    }
}

impl fmt::Debug for PidMotor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PidMotor")
            .field("name", &self.name)
            .field("active", &state.active)
            .field("setpoint", &state.pid.setpoint())
            .field("last_outcome", &state.last_outcome)
            .finish_non_exhaustive()
    }
}
