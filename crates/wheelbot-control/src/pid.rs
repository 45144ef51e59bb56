//! PID Controller - 比例-积分-微分控制器
//!
//! 单个闭环：通过构造时注入的读取函数获取过程变量（process variable），
//! 计算被限幅的输出，并给出带容差与稳定时间的"到达目标"判定。
//!
//! # 算法
//!
//! ```text
//! e      = setpoint - input            (is_inverted 时取反)
//! I     += e * dt                      (抗饱和：Ki * I 限制在输出范围内)
//! D      = (e - e_prev) / dt
//! output = clamp(Kp * e + Ki * I + Kd * D + Kf * sign(e), output_min, output_max)
//! ```
//!
//! `Kf` 是沿运动方向的恒定偏置（克服静摩擦），不随误差缩放。
//!
//! # 到达目标
//!
//! `|e| <= tolerance` 必须**连续**保持 `settling_time` 才算到达；
//! 中途离开容差带会重置稳定计时。`settling_time = 0` 时首个进入容差带的周期即到达。
//!
//! # 设定值
//!
//! - [`TargetMode::Absolute`]: 设定值即目标值
//! - [`TargetMode::Relative`]: 目标值为增量。`is_absolute_setpoint = true` 时增量累加在上一次
//!   设定值上（连续的相对运动不会累积误差）；否则累加在当前输入值上
//!
//! # 示例
//!
//! ```rust
//! use wheelbot_control::{PidController, PidParams, TargetMode};
//! use wheelbot_sched::clock::ManualClock;
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let params = PidParams::new()
//!     .with_gains(0.1, 0.0, 0.0)
//!     .with_tolerance(0.5)
//!     .with_settling_time(0.2);
//! let mut pid = PidController::new("distance", params, clock.shared(), || 0.0)?;
//!
//! pid.set_target(24.0, TargetMode::Absolute);
//! let output = pid.compute();
//! assert!(output > 0.0 && output <= 1.0);
//! # Ok::<(), wheelbot_control::ControlError>(())
//! ```

use std::fmt;
use std::time::Duration;

use tracing::{trace, warn};
use wheelbot_sched::clock::SharedClock;

use crate::error::ControlError;

/// 过程变量读取函数
pub type PidInput = Box<dyn FnMut() -> f64 + Send>;

/// 目标模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TargetMode {
    /// 绝对目标
    #[default]
    Absolute,
    /// 相对目标（增量）
    Relative,
}

/// PID 参数
///
/// 纯数据，构造 [`PidController`] 时校验。
///
/// # 默认参数
///
/// - Kp = Ki = Kd = Kf = 0.0（需要手动设置）
/// - 容差 = 0.0，稳定时间 = 0.0 秒
/// - 输出范围 = [-1.0, 1.0]
/// - 绝对设定值、不反向
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PidParams {
    /// 比例增益 (Kp)
    pub kp: f64,
    /// 积分增益 (Ki)
    pub ki: f64,
    /// 微分增益 (Kd)
    pub kd: f64,
    /// 前馈偏置 (Kf)
    pub kf: f64,
    /// 到达目标容差（过程变量单位）
    pub tolerance: f64,
    /// 稳定时间（秒）
    pub settling_time: f64,
    /// 输出下限
    pub output_min: f64,
    /// 输出上限
    pub output_max: f64,
    /// 相对目标是否累加在上一次设定值上
    pub absolute_setpoint: bool,
    /// 误差取反
    pub inverted: bool,
}

impl Default for PidParams {
    fn default() -> Self {
        Self {
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            kf: 0.0,
            tolerance: 0.0,
            settling_time: 0.0,
            output_min: -1.0,
            output_max: 1.0,
            absolute_setpoint: true,
            inverted: false,
        }
    }
}

impl PidParams {
    /// 默认参数
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 PID 增益
    pub fn with_gains(mut self, kp: f64, ki: f64, kd: f64) -> Self {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        self
    }

    /// 设置前馈偏置
    pub fn with_feedforward(mut self, kf: f64) -> Self {
        self.kf = kf;
        self
    }

    /// 设置到达目标容差
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// 设置稳定时间（秒）
    pub fn with_settling_time(mut self, seconds: f64) -> Self {
        self.settling_time = seconds;
        self
    }

    /// 设置输出范围
    pub fn with_output_range(mut self, min: f64, max: f64) -> Self {
        self.output_min = min;
        self.output_max = max;
        self
    }

    /// 设置相对目标的累加基准
    pub fn with_absolute_setpoint(mut self, absolute: bool) -> Self {
        self.absolute_setpoint = absolute;
        self
    }

    /// 设置误差取反
    pub fn with_inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    /// 校验参数
    pub fn validate(&self) -> Result<(), ControlError> {
        for (name, value) in [
            ("kp", self.kp),
            ("ki", self.ki),
            ("kd", self.kd),
            ("kf", self.kf),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ControlError::InvalidGain { name, value });
            }
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ControlError::InvalidTolerance(self.tolerance));
        }
        settling_duration(self.settling_time)?;
        validate_range(self.output_min, self.output_max)
    }
}

/// 稳定时间转换为 Duration（负数、非有限值或超出 Duration 范围时报错）
fn settling_duration(seconds: f64) -> Result<Duration, ControlError> {
    if seconds < 0.0 {
        return Err(ControlError::InvalidSettlingTime(seconds));
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| ControlError::InvalidSettlingTime(seconds))
}

fn validate_range(min: f64, max: f64) -> Result<(), ControlError> {
    if !(min.is_finite() && max.is_finite() && min < max) {
        return Err(ControlError::InvalidOutputRange { min, max });
    }
    Ok(())
}

/// PID 控制器
///
/// 由拥有者（PidMotor / PidDrive）每周期调用一次 [`compute`](Self::compute)，不独立轮询。
pub struct PidController {
    name: String,
    params: PidParams,
    settling_time: Duration,
    clock: SharedClock,
    input: PidInput,

    /// 设定值（过程变量坐标）
    setpoint: f64,
    /// 是否已设置过目标
    has_target: bool,

    /// 积分项累积值
    integral: f64,
    /// 上一次的误差（用于计算微分）
    prev_error: Option<f64>,
    /// 上一次计算的时间
    last_time: Option<Duration>,
    /// 误差进入容差带的时间
    settle_start: Option<Duration>,

    last_input: f64,
    last_error: f64,
    last_output: f64,
}

impl PidController {
    /// 创建 PID 控制器
    ///
    /// # 参数
    ///
    /// - `name`: 名称（日志使用）
    /// - `params`: PID 参数
    /// - `clock`: 时间源（dt 与稳定时间）
    /// - `input`: 过程变量读取函数
    ///
    /// # 错误
    ///
    /// 参数无效时返回 [`ControlError`]。
    pub fn new<F>(
        name: impl Into<String>,
        params: PidParams,
        clock: SharedClock,
        input: F,
    ) -> Result<Self, ControlError>
    where
        F: FnMut() -> f64 + Send + 'static,
    {
        params.validate()?;
        Ok(Self {
            name: name.into(),
            settling_time: settling_duration(params.settling_time)?,
            params,
            clock,
            input: Box::new(input),
            setpoint: 0.0,
            has_target: false,
            integral: 0.0,
            prev_error: None,
            last_time: None,
            settle_start: None,
            last_input: 0.0,
            last_error: 0.0,
            last_output: 0.0,
        })
    }

    /// 控制器名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 当前参数
    pub fn params(&self) -> &PidParams {
        &self.params
    }

    /// 读取一次过程变量
    pub fn read_input(&mut self) -> f64 {
        (self.input)()
    }

    /// 设置目标
    ///
    /// 同时清除积分、微分与稳定计时历史。
    pub fn set_target(&mut self, target: f64, mode: TargetMode) {
        self.setpoint = match mode {
            TargetMode::Absolute => target,
            TargetMode::Relative if self.params.absolute_setpoint && self.has_target => {
                self.setpoint + target
            },
            TargetMode::Relative => self.read_input() + target,
        };
        self.has_target = true;
        self.reset();
        trace!("PID {} setpoint = {}", self.name, self.setpoint);
    }

    /// 当前设定值
    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// 最近一次计算的误差
    pub fn error(&self) -> f64 {
        self.last_error
    }

    /// 最近一次计算读取的过程变量
    pub fn last_input(&self) -> f64 {
        self.last_input
    }

    /// 最近一次计算的输出
    pub fn output(&self) -> f64 {
        self.last_output
    }

    /// 当前积分项
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// 当前输出范围
    pub fn output_range(&self) -> (f64, f64) {
        (self.params.output_min, self.params.output_max)
    }

    /// 临时限制输出范围
    ///
    /// 不修改增益。例如寻线时将功率减半。
    pub fn set_output_range(&mut self, min: f64, max: f64) -> Result<(), ControlError> {
        validate_range(min, max)?;
        self.params.output_min = min;
        self.params.output_max = max;
        Ok(())
    }

    /// 重置控制器历史
    ///
    /// 清零积分、微分与稳定计时，保留设定值。
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
        self.last_time = None;
        self.settle_start = None;
        self.last_output = 0.0;
    }

    /// 计算一次输出
    pub fn compute(&mut self) -> f64 {
        let now = self.clock.now();
        let input = (self.input)();
        let mut error = self.setpoint - input;
        if self.params.inverted {
            error = -error;
        }

        // 非有限读数：保持上一次输出，积分、微分与稳定计时不变
        if !error.is_finite() {
            warn!(
                "PID {} read non-finite input {}, holding output {}",
                self.name, input, self.last_output
            );
            return self.last_output;
        }

        let dt = match self.last_time {
            Some(last) => now.saturating_sub(last).as_secs_f64(),
            None => 0.0,
        };
        if self.last_time.is_some() && dt <= 0.0 {
            warn!(
                "PID {} computed twice at the same instant, integral and derivative skipped",
                self.name
            );
        }

        let (min, max) = (self.params.output_min, self.params.output_max);

        // 积分项 + 抗饱和
        if dt > 0.0 && self.params.ki > 0.0 {
            let bound_lo = min / self.params.ki;
            let bound_hi = max / self.params.ki;
            self.integral = (self.integral + error * dt).clamp(bound_lo, bound_hi);
        }

        // 微分项
        let derivative = match self.prev_error {
            Some(prev) if dt > 0.0 => (error - prev) / dt,
            _ => 0.0,
        };

        let feedforward = if error > 0.0 {
            self.params.kf
        } else if error < 0.0 {
            -self.params.kf
        } else {
            0.0
        };

        let raw = self.params.kp * error
            + self.params.ki * self.integral
            + self.params.kd * derivative
            + feedforward;
        let output = if raw.is_nan() { 0.0 } else { raw.clamp(min, max) };

        // 稳定计时
        if error.abs() <= self.params.tolerance {
            self.settle_start.get_or_insert(now);
        } else {
            self.settle_start = None;
        }

        self.prev_error = Some(error);
        self.last_time = Some(now);
        self.last_input = input;
        self.last_error = error;
        self.last_output = output;

        trace!(
            "PID {}: input={:.4} error={:.4} integral={:.4} output={:.4}",
            self.name, input, error, self.integral, output
        );
        output
    }

    /// 是否到达目标
    ///
    /// 误差已连续保持在容差带内 `settling_time`。
    pub fn is_on_target(&self) -> bool {
        self.settle_start
            .is_some_and(|start| self.clock.now().saturating_sub(start) >= self.settling_time)
    }
}

impl fmt::Debug for PidController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PidController")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("setpoint", &self.setpoint)
            .field("integral", &self.integral)
            .field("last_error", &self.last_error)
            .field("last_output", &self.last_output)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use wheelbot_sched::clock::ManualClock;

    const TICK: Duration = Duration::from_millis(50);

    /// 可由测试改写的过程变量
    fn shared_input(initial: f64) -> (Arc<Mutex<f64>>, impl FnMut() -> f64 + Send + 'static) {
        let value = Arc::new(Mutex::new(initial));
        let v = value.clone();
        (value, move || *v.lock())
    }

    #[test]
    fn test_pid_params_default() {
        let params = PidParams::default();
        assert_eq!(params.kp, 0.0);
        assert_eq!(params.output_min, -1.0);
        assert_eq!(params.output_max, 1.0);
        assert!(params.absolute_setpoint);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_pid_params_validation() {
        let params = PidParams::new().with_output_range(1.0, -1.0);
        assert_eq!(
            params.validate(),
            Err(ControlError::InvalidOutputRange { min: 1.0, max: -1.0 })
        );

        let params = PidParams::new().with_gains(-1.0, 0.0, 0.0);
        assert!(matches!(
            params.validate(),
            Err(ControlError::InvalidGain { name: "kp", .. })
        ));

        let params = PidParams::new().with_tolerance(f64::NAN);
        assert!(matches!(
            params.validate(),
            Err(ControlError::InvalidTolerance(_))
        ));

        let params = PidParams::new().with_settling_time(-0.1);
        assert!(matches!(
            params.validate(),
            Err(ControlError::InvalidSettlingTime(_))
        ));

        // 超出 Duration 范围
        let params = PidParams::new().with_settling_time(1e30);
        assert!(matches!(
            params.validate(),
            Err(ControlError::InvalidSettlingTime(_))
        ));

        let clock = ManualClock::new();
        let result = PidController::new(
            "bad",
            PidParams::new().with_output_range(0.5, 0.5),
            clock.shared(),
            || 0.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_pid_proportional_only() {
        let clock = ManualClock::new();
        let params = PidParams::new()
            .with_gains(0.5, 0.0, 0.0)
            .with_output_range(-10.0, 10.0);
        let mut pid = PidController::new("p", params, clock.shared(), || 1.0).unwrap();

        pid.set_target(3.0, TargetMode::Absolute);
        // 误差 = 3.0 - 1.0 = 2.0，输出 = 0.5 * 2.0 = 1.0
        assert!((pid.compute() - 1.0).abs() < 1e-10);
        assert!((pid.error() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_pid_integral_accumulation() {
        let clock = ManualClock::new();
        let params = PidParams::new()
            .with_gains(0.0, 1.0, 0.0)
            .with_output_range(-10.0, 10.0);
        let mut pid = PidController::new("i", params, clock.shared(), || 0.5).unwrap();
        pid.set_target(1.0, TargetMode::Absolute);

        // 首次计算没有 dt，不积分
        assert_eq!(pid.compute(), 0.0);

        clock.advance(Duration::from_millis(100));
        // 积分 = 0.5 * 0.1 = 0.05
        assert!((pid.compute() - 0.05).abs() < 1e-10);

        clock.advance(Duration::from_millis(100));
        assert!((pid.compute() - 0.1).abs() < 1e-10);
    }

    #[test]
    fn test_pid_anti_windup() {
        let clock = ManualClock::new();
        let params = PidParams::new()
            .with_gains(0.0, 2.0, 0.0)
            .with_output_range(-1.0, 1.0);
        let mut pid = PidController::new("windup", params, clock.shared(), || 0.0).unwrap();
        pid.set_target(100.0, TargetMode::Absolute);

        for _ in 0..100 {
            clock.advance(Duration::from_secs(1));
            pid.compute();
        }
        // Ki * I 不超过输出上限
        assert!((pid.integral() - 0.5).abs() < 1e-10);
        assert!((pid.output() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_pid_derivative_term() {
        let clock = ManualClock::new();
        let (value, input) = shared_input(0.0);
        let params = PidParams::new()
            .with_gains(0.0, 0.0, 1.0)
            .with_output_range(-100.0, 100.0);
        let mut pid = PidController::new("d", params, clock.shared(), input).unwrap();
        pid.set_target(1.0, TargetMode::Absolute);

        // 首次：没有上一次误差
        assert_eq!(pid.compute(), 0.0);

        // 误差从 1.0 变为 0.5，变化率 = -0.5 / 0.1 = -5.0
        *value.lock() = 0.5;
        clock.advance(Duration::from_millis(100));
        assert!((pid.compute() + 5.0).abs() < 1e-10);

        // 误差不变
        clock.advance(Duration::from_millis(100));
        assert!(pid.compute().abs() < 1e-10);
    }

    #[test]
    fn test_pid_feedforward_sign() {
        let clock = ManualClock::new();
        let (value, input) = shared_input(0.0);
        let params = PidParams::new().with_feedforward(0.2);
        let mut pid = PidController::new("f", params, clock.shared(), input).unwrap();

        pid.set_target(10.0, TargetMode::Absolute);
        assert!((pid.compute() - 0.2).abs() < 1e-10);

        *value.lock() = 20.0;
        assert!((pid.compute() + 0.2).abs() < 1e-10);

        *value.lock() = 10.0;
        assert_eq!(pid.compute(), 0.0);
    }

    #[test]
    fn test_pid_inverted() {
        let clock = ManualClock::new();
        let params = PidParams::new()
            .with_gains(1.0, 0.0, 0.0)
            .with_inverted(true);
        let mut pid = PidController::new("inv", params, clock.shared(), || 0.0).unwrap();
        pid.set_target(0.5, TargetMode::Absolute);

        assert!((pid.compute() + 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_pid_output_clamping() {
        let clock = ManualClock::new();
        let params = PidParams::new()
            .with_gains(100.0, 0.0, 0.0)
            .with_output_range(-0.3, 0.6);
        let mut pid = PidController::new("clamp", params, clock.shared(), || 0.0).unwrap();

        pid.set_target(100.0, TargetMode::Absolute);
        assert_eq!(pid.compute(), 0.6);

        pid.set_target(-100.0, TargetMode::Absolute);
        assert_eq!(pid.compute(), -0.3);
    }

    #[test]
    fn test_pid_set_output_range() {
        let clock = ManualClock::new();
        let params = PidParams::new().with_gains(10.0, 0.0, 0.0);
        let mut pid = PidController::new("range", params, clock.shared(), || 0.0).unwrap();
        pid.set_target(10.0, TargetMode::Absolute);

        pid.set_output_range(-0.5, 0.5).unwrap();
        assert_eq!(pid.compute(), 0.5);
        assert_eq!(pid.params().kp, 10.0);

        assert!(pid.set_output_range(0.5, -0.5).is_err());
        assert_eq!(pid.output_range(), (-0.5, 0.5));
    }

    #[test]
    fn test_pid_relative_targets_accumulate_on_setpoint() {
        let clock = ManualClock::new();
        let params = PidParams::new().with_absolute_setpoint(true);
        let mut pid = PidController::new("rel", params, clock.shared(), || 3.0).unwrap();

        pid.set_target(10.0, TargetMode::Relative);
        pid.set_target(5.0, TargetMode::Relative);
        assert_eq!(pid.setpoint(), 18.0);

        pid.set_target(20.0, TargetMode::Absolute);
        assert_eq!(pid.setpoint(), 20.0);
    }

    #[test]
    fn test_pid_relative_targets_rebase_on_input() {
        let clock = ManualClock::new();
        let (value, input) = shared_input(3.0);
        let params = PidParams::new().with_absolute_setpoint(false);
        let mut pid = PidController::new("rel", params, clock.shared(), input).unwrap();

        pid.set_target(10.0, TargetMode::Relative);
        assert_eq!(pid.setpoint(), 13.0);

        *value.lock() = 12.5;
        pid.set_target(5.0, TargetMode::Relative);
        assert_eq!(pid.setpoint(), 17.5);
    }

    #[test]
    fn test_pid_zero_settling_on_first_tick() {
        let clock = ManualClock::new();
        let params = PidParams::new().with_tolerance(0.5);
        let mut pid = PidController::new("z", params, clock.shared(), || 9.8).unwrap();

        pid.set_target(10.0, TargetMode::Absolute);
        assert!(!pid.is_on_target());
        pid.compute();
        assert!(pid.is_on_target());
    }

    #[test]
    fn test_pid_settling_restarts_after_leaving_band() {
        let clock = ManualClock::new();
        let (value, input) = shared_input(0.0);
        let params = PidParams::new()
            .with_tolerance(1.0)
            .with_settling_time(0.5);
        let mut pid = PidController::new("settle", params, clock.shared(), input).unwrap();
        pid.set_target(10.0, TargetMode::Absolute);

        // 进入容差带，保持 0.45 秒
        *value.lock() = 9.5;
        pid.compute();
        for _ in 0..9 {
            clock.advance(TICK);
            pid.compute();
            assert!(!pid.is_on_target());
        }

        // 短暂离开
        *value.lock() = 8.0;
        clock.advance(TICK);
        pid.compute();
        assert!(!pid.is_on_target());

        // 重新进入：必须从最后一次进入起再等满 0.5 秒
        *value.lock() = 9.8;
        clock.advance(TICK);
        pid.compute();
        for _ in 0..9 {
            clock.advance(TICK);
            pid.compute();
            assert!(!pid.is_on_target());
        }
        clock.advance(TICK);
        pid.compute();
        assert!(pid.is_on_target());
    }

    #[test]
    fn test_pid_set_target_clears_history() {
        let clock = ManualClock::new();
        let params = PidParams::new()
            .with_gains(1.0, 1.0, 1.0)
            .with_tolerance(100.0);
        let mut pid = PidController::new("hist", params, clock.shared(), || 0.5).unwrap();

        pid.set_target(1.0, TargetMode::Absolute);
        pid.compute();
        clock.advance(Duration::from_secs(1));
        pid.compute();
        assert!(pid.integral() != 0.0);
        assert!(pid.is_on_target());

        pid.set_target(2.0, TargetMode::Absolute);
        assert_eq!(pid.integral(), 0.0);
        assert!(!pid.is_on_target());
    }

    #[test]
    fn test_pid_huge_settling_time_is_rejected() {
        let clock = ManualClock::new();
        let result = PidController::new(
            "huge",
            PidParams::new().with_settling_time(1e30),
            clock.shared(),
            || 0.0,
        );
        assert!(matches!(
            result,
            Err(ControlError::InvalidSettlingTime(v)) if v == 1e30
        ));
    }

    #[test]
    fn test_pid_non_finite_input_holds_output() {
        let clock = ManualClock::new();
        let (value, input) = shared_input(0.0);
        let params = PidParams::new()
            .with_gains(0.1, 0.5, 0.0)
            .with_output_range(-10.0, 10.0);
        let mut pid = PidController::new("nan", params, clock.shared(), input).unwrap();
        pid.set_target(1.0, TargetMode::Absolute);

        pid.compute();
        clock.advance(TICK);
        let before = pid.compute();
        let integral = pid.integral();
        assert!(before > 0.0);

        // 一次 NaN 读数：输出保持，积分不被污染
        *value.lock() = f64::NAN;
        clock.advance(TICK);
        assert_eq!(pid.compute(), before);
        assert_eq!(pid.integral(), integral);

        *value.lock() = f64::INFINITY;
        clock.advance(TICK);
        assert_eq!(pid.compute(), before);

        // 读数恢复后继续正常计算
        *value.lock() = 0.0;
        for _ in 0..5 {
            clock.advance(TICK);
            let output = pid.compute();
            assert!(output.is_finite() && output > before);
        }
        assert!(pid.integral().is_finite() && pid.integral() > integral);
    }

    proptest::proptest! {
        /// 任意增益、设定值与输入下，输出始终落在输出范围内
        #[test]
        fn prop_output_within_range(
            kp in 0.0f64..50.0,
            ki in 0.0f64..10.0,
            kd in 0.0f64..5.0,
            kf in 0.0f64..1.0,
            lo in -5.0f64..-0.01,
            hi in 0.01f64..5.0,
            setpoint in -1000.0f64..1000.0,
            samples in proptest::collection::vec(-1000.0f64..1000.0, 1..20),
        ) {
            let clock = ManualClock::new();
            let (value, input) = shared_input(0.0);
            let params = PidParams::new()
                .with_gains(kp, ki, kd)
                .with_feedforward(kf)
                .with_output_range(lo, hi);
            let mut pid = PidController::new("prop", params, clock.shared(), input).unwrap();
            pid.set_target(setpoint, TargetMode::Absolute);

            for sample in samples {
                *value.lock() = sample;
                let output = pid.compute();
                proptest::prop_assert!(output >= lo && output <= hi);
                clock.advance(TICK);
            }
        }
    }
}
