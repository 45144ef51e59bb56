//! 阈值触发器
//!
//! 每周期采样一次输入，按有序阈值表划分区间（zone），区间**变化**时调用处理函数。
//! 典型用法：寻线传感器越过阈值时取消正在进行的 PID 运动。
//!
//! # 区间划分
//!
//! 阈值表 `[t0, t1, ..., tn-1]` 严格递增，划分出 `n + 1` 个区间：
//!
//! ```text
//! zone 0: value < t0
//! zone k: t(k-1) <= value < tk
//! zone n: value >= t(n-1)
//! ```
//!
//! # 边沿触发
//!
//! - 启用后的第一个采样只建立基准区间，不调用处理函数
//! - 之后仅在区间变化时调用一次处理函数，停留在同一区间不会重复调用
//! - 禁用会清除当前区间，再次启用时重新建立基准
//! - 非有限采样值（NaN / ∞）被忽略
//!
//! # 示例
//!
//! ```rust
//! use wheelbot_control::{AnalogTrigger, TriggerEvent};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! let reading = Arc::new(AtomicU64::new(0.2f64.to_bits()));
//! let r = reading.clone();
//! let trigger = AnalogTrigger::new("line", &[0.5], move || {
//!     f64::from_bits(r.load(Ordering::Relaxed))
//! })?;
//! trigger.set_handler(|event: &TriggerEvent<'_>| {
//!     assert_eq!(event.zone, 1);
//! });
//! trigger.set_enabled(true);
//!
//! assert_eq!(trigger.poll(), None); // 基准
//! reading.store(0.9f64.to_bits(), Ordering::Relaxed);
//! assert_eq!(trigger.poll(), Some(1)); // 越过阈值
//! # Ok::<(), wheelbot_control::ControlError>(())
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};
use wheelbot_sched::{Phase, Scheduler, Tick};

use crate::error::ControlError;

/// 触发事件（传给处理函数）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerEvent<'a> {
    /// 触发器名称
    pub trigger: &'a str,
    /// 新区间
    pub zone: usize,
    /// 旧区间
    pub prev_zone: usize,
    /// 触发时的采样值
    pub value: f64,
}

/// 触发处理函数
///
/// 在调度线程上同步调用，不得阻塞。处理函数可以取消运动或禁用触发器本身，
/// 但不应在同一回调里发起新的运动。
pub type TriggerHandler = Box<dyn FnMut(&TriggerEvent<'_>) + Send>;

type TriggerInput = Box<dyn FnMut() -> f64 + Send>;

/// 触发器参数
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TriggerParams {
    /// 有序阈值表
    pub thresholds: Vec<f64>,
    /// 构造后立即启用
    pub enabled: bool,
}

impl TriggerParams {
    /// 以阈值表创建参数
    pub fn new(thresholds: impl Into<Vec<f64>>) -> Self {
        Self {
            thresholds: thresholds.into(),
            enabled: false,
        }
    }

    /// 设置构造后立即启用
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// 校验阈值表
    pub fn validate(&self, name: &str) -> Result<(), ControlError> {
        validate_thresholds(name, &self.thresholds)
    }
}

fn validate_thresholds(name: &str, thresholds: &[f64]) -> Result<(), ControlError> {
    if thresholds.is_empty() {
        return Err(ControlError::EmptyThresholds(name.to_string()));
    }
    let ascending = thresholds.iter().all(|t| t.is_finite())
        && thresholds.windows(2).all(|w| w[0] < w[1]);
    if !ascending {
        return Err(ControlError::NonMonotonicThresholds {
            name: name.to_string(),
            thresholds: thresholds.to_vec(),
        });
    }
    Ok(())
}

struct TriggerState {
    thresholds: SmallVec<[f64; 4]>,
    input: TriggerInput,
    handler: Option<TriggerHandler>,
    /// 每次设置 / 移除处理函数递增，分发期间的修改据此保留
    handler_generation: u64,
    enabled: bool,
    current_zone: Option<usize>,
    last_value: Option<f64>,
    fire_count: u64,
}

impl TriggerState {
    fn zone_of(&self, value: f64) -> usize {
        self.thresholds.partition_point(|t| *t <= value)
    }
}

/// 模拟量阈值触发器
///
/// 句柄可克隆，所有克隆共享同一状态。
#[derive(Clone)]
pub struct AnalogTrigger {
    name: Arc<str>,
    state: Arc<Mutex<TriggerState>>,
}

impl AnalogTrigger {
    /// 创建触发器（初始禁用，无处理函数）
    ///
    /// # 错误
    ///
    /// 阈值表为空、含非有限值或非严格递增时返回 [`ControlError`]。
    pub fn new<F>(
        name: impl Into<String>,
        thresholds: &[f64],
        input: F,
    ) -> Result<Self, ControlError>
    where
        F: FnMut() -> f64 + Send + 'static,
    {
        let name: String = name.into();
        validate_thresholds(&name, thresholds)?;
        Ok(Self {
            name: name.into(),
            state: Arc::new(Mutex::new(TriggerState {
                thresholds: SmallVec::from_slice(thresholds),
                input: Box::new(input),
                handler: None,
                handler_generation: 0,
                enabled: false,
                current_zone: None,
                last_value: None,
                fire_count: 0,
            })),
        })
    }

    /// 从参数创建触发器
    pub fn from_params<F>(
        name: impl Into<String>,
        params: &TriggerParams,
        input: F,
    ) -> Result<Self, ControlError>
    where
        F: FnMut() -> f64 + Send + 'static,
    {
        let trigger = Self::new(name, &params.thresholds, input)?;
        trigger.set_enabled(params.enabled);
        Ok(trigger)
    }

    /// 触发器名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 阈值表
    pub fn thresholds(&self) -> Vec<f64> {
        self.state.lock().thresholds.to_vec()
    }

    /// 设置处理函数（替换已有的）
    pub fn set_handler<H>(&self, handler: H)
    where
        H: FnMut(&TriggerEvent<'_>) + Send + 'static,
    {
        let mut state = self.state.lock();
        state.handler = Some(Box::new(handler));
        state.handler_generation += 1;
    }

    /// 移除处理函数
    ///
    /// 在处理函数内部调用同样生效。
    pub fn clear_handler(&self) {
        let mut state = self.state.lock();
        state.handler = None;
        state.handler_generation += 1;
    }

    /// 启用 / 禁用
    ///
    /// 状态变化时清除当前区间，启用后的第一个采样重新建立基准。
    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.state.lock();
        if state.enabled != enabled {
            state.enabled = enabled;
            state.current_zone = None;
            debug!(
                "Trigger {} {}",
                self.name,
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    /// 是否启用
    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// 当前区间（禁用或尚未采样时为 None）
    pub fn current_zone(&self) -> Option<usize> {
        self.state.lock().current_zone
    }

    /// 最近一次有效采样值
    pub fn last_value(&self) -> Option<f64> {
        self.state.lock().last_value
    }

    /// 处理函数调用次数
    pub fn fire_count(&self) -> u64 {
        self.state.lock().fire_count
    }

    /// 采样一次
    ///
    /// 区间变化时调用处理函数并返回新区间；否则返回 None。
    pub fn poll(&self) -> Option<usize> {
        let mut state = self.state.lock();
        if !state.enabled {
            return None;
        }

        let value = (state.input)();
        if !value.is_finite() {
            trace!("Trigger {} ignored non-finite sample {}", self.name, value);
            return None;
        }
        state.last_value = Some(value);

        let zone = state.zone_of(value);
        let current = state.current_zone;
        let prev_zone = match current {
            None => {
                state.current_zone = Some(zone);
                trace!("Trigger {} baseline zone {}", self.name, zone);
                return None;
            },
            Some(prev) if prev == zone => return None,
            Some(prev) => prev,
        };

        state.current_zone = Some(zone);
        state.fire_count += 1;
        let handler = state.handler.take();
        let generation = state.handler_generation;
        drop(state);

        debug!(
            "Trigger {} zone {} -> {} (value {:.4})",
            self.name, prev_zone, zone, value
        );

        // 处理函数在锁外调用，可以操作本触发器
        if let Some(mut handler) = handler {
            handler(&TriggerEvent {
                trigger: &self.name,
                zone,
                prev_zone,
                value,
            });
            let mut state = self.state.lock();
            if state.handler_generation == generation {
                state.handler = Some(handler);
            }
        }
        Some(zone)
    }

    /// 注册到调度器，每周期在 `phase` 阶段采样一次
    ///
    /// 任务名为 `trigger:<name>`；重复注册是空操作。
    pub fn attach(&self, scheduler: &Scheduler, phase: Phase) -> bool {
        let trigger = self.clone();
        scheduler.register(&self.task_name(), phase, move |_tick: &Tick| {
            trigger.poll();
        })
    }

    /// 从调度器注销
    pub fn detach(&self, scheduler: &Scheduler, phase: Phase) -> bool {
        scheduler.unregister(&self.task_name(), phase)
    }

    fn task_name(&self) -> String {
        format!("trigger:{}", self.name)
    }
}

impl fmt::Debug for AnalogTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AnalogTrigger")
            .field("name", &self.name)
            .field("thresholds", &state.thresholds)
            .field("enabled", &state.enabled)
            .field("current_zone", &state.current_zone)
            .field("fire_count", &state.fire_count)
            .finish_non_exhaustive()
    }
}

/// 数字量触发器
///
/// 两个区间：[`DigitalTrigger::RELEASED`] 与 [`DigitalTrigger::PRESSED`]。
#[derive(Clone, Debug)]
pub struct DigitalTrigger {
    inner: AnalogTrigger,
}

impl DigitalTrigger {
    /// 未按下区间
    pub const RELEASED: usize = 0;
    /// 按下区间
    pub const PRESSED: usize = 1;

    /// 创建数字量触发器（初始禁用）
    pub fn new<F>(name: impl Into<String>, mut input: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let name: String = name.into();
        let inner = AnalogTrigger {
            name: name.into(),
            state: Arc::new(Mutex::new(TriggerState {
                thresholds: SmallVec::from_slice(&[0.5]),
                input: Box::new(move || if input() { 1.0 } else { 0.0 }),
                handler: None,
                handler_generation: 0,
                enabled: false,
                current_zone: None,
                last_value: None,
                fire_count: 0,
            })),
        };
        Self { inner }
    }

    /// 触发器名称
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// 设置处理函数
    pub fn set_handler<H>(&self, handler: H)
    where
        H: FnMut(&TriggerEvent<'_>) + Send + 'static,
    {
        self.inner.set_handler(handler);
    }

    /// 启用 / 禁用
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.set_enabled(enabled);
    }

    /// 是否启用
    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    /// 最近一次采样是否处于按下状态
    pub fn is_pressed(&self) -> bool {
        self.inner.current_zone() == Some(Self::PRESSED)
    }

    /// 采样一次
    pub fn poll(&self) -> Option<usize> {
        self.inner.poll()
    }

    /// 注册到调度器
    pub fn attach(&self, scheduler: &Scheduler, phase: Phase) -> bool {
        self.inner.attach(scheduler, phase)
    }

    /// 从调度器注销
    pub fn detach(&self, scheduler: &Scheduler, phase: Phase) -> bool {
        self.inner.detach(scheduler, phase)
    }

    /// 底层模拟量触发器
    pub fn as_analog(&self) -> &AnalogTrigger {
        &self.inner
    }
}
