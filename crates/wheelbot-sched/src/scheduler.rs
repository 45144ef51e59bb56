//! 协作式阶段调度器
//!
//! 单线程、协作式的回调注册表。宿主（host）每个固定周期调用一次
//! [`Scheduler::run_period`]（或按顺序逐个调用 [`Scheduler::dispatch`]），
//! 调度器本身不做任何定时。
//!
//! # 阶段顺序（每周期）
//!
//! ```text
//! PrePeriodic -> [宿主周期逻辑] -> PostPeriodic
//!     -> PreContinuous -> [宿主连续逻辑] -> PostContinuous
//! ```
//!
//! 同一阶段内按注册顺序执行。
//!
//! # 注册语义
//!
//! - 回调在阶段内以名字作为身份：重复注册同名回调是空操作
//! - 注销未注册的回调是空操作，不是错误
//! - 分发过程中允许回调注册/注销其他回调：分发前先取快照，
//!   本轮中途被注销的回调不再执行，中途新注册的回调从下一轮开始执行
//!
//! # 约束
//!
//! 回调**不得阻塞**：阻塞会拖住整个控制循环以及共享它的所有机构。
//!
//! # 示例
//!
//! ```rust
//! use wheelbot_sched::{Phase, RunMode, Scheduler, Tick};
//! use wheelbot_sched::clock::ManualClock;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! let scheduler = Scheduler::new(ManualClock::new().shared());
//! let count = Arc::new(AtomicU32::new(0));
//! let c = count.clone();
//! scheduler.register("counter", Phase::PrePeriodic, move |_tick: &Tick| {
//!     c.fetch_add(1, Ordering::Relaxed);
//! });
//!
//! scheduler.run_period(RunMode::Running, |_| {}, |_| {});
//! assert_eq!(count.load(Ordering::Relaxed), 1);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::clock::SharedClock;

/// 调度阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Phase {
    /// 宿主周期逻辑之前（通常用于读取传感器、更新位姿）
    PrePeriodic = 0,
    /// 宿主周期逻辑之后
    PostPeriodic = 1,
    /// 宿主连续逻辑之前
    PreContinuous = 2,
    /// 宿主连续逻辑之后（通常用于 PID 输出、触发器检查）
    PostContinuous = 3,
}

impl Phase {
    /// 按执行顺序排列的全部阶段
    pub const ALL: [Phase; 4] = [
        Phase::PrePeriodic,
        Phase::PostPeriodic,
        Phase::PreContinuous,
        Phase::PostContinuous,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// 阶段名称
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::PrePeriodic => "pre_periodic",
            Phase::PostPeriodic => "post_periodic",
            Phase::PreContinuous => "pre_continuous",
            Phase::PostContinuous => "post_continuous",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 宿主运行模式
///
/// 宿主区分初始化阶段与运行阶段，回调可据此决定是否工作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// 初始化阶段（比赛开始前）
    #[default]
    Init,
    /// 运行阶段
    Running,
}

/// 单次回调的上下文
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// 周期序号（从 0 开始）
    pub index: u64,
    /// 宿主运行模式
    pub mode: RunMode,
    /// 当前阶段
    pub phase: Phase,
    /// 本周期开始时间
    pub now: Duration,
    /// 距离上一周期开始的时间（首个周期为 0）
    pub dt: Duration,
}

/// 周期任务
///
/// 闭包 `FnMut(&Tick)` 自动实现此 trait。
pub trait Task: Send {
    /// 执行一次
    fn run(&mut self, tick: &Tick);
}

impl<F> Task for F
where
    F: FnMut(&Tick) + Send,
{
    fn run(&mut self, tick: &Tick) {
        self(tick)
    }
}

#[derive(Clone)]
struct Entry {
    name: Arc<str>,
    active: Arc<AtomicBool>,
    task: Arc<Mutex<Box<dyn Task>>>,
}

#[derive(Default)]
struct Registry {
    phases: [Vec<Entry>; 4],
}

struct PeriodState {
    index: u64,
    last_start: Option<Duration>,
}

/// 协作式调度器（共享句柄）
///
/// 克隆得到同一个调度器的句柄，可以交给需要在分发过程中注册/注销回调的组件。
#[derive(Clone)]
pub struct Scheduler {
    clock: SharedClock,
    registry: Arc<Mutex<Registry>>,
    period: Arc<Mutex<PeriodState>>,
    dispatch_counts: Arc<[AtomicU64; 4]>,
}

impl Scheduler {
    /// 创建空调度器
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            registry: Arc::new(Mutex::new(Registry::default())),
            period: Arc::new(Mutex::new(PeriodState {
                index: 0,
                last_start: None,
            })),
            dispatch_counts: Arc::new(Default::default()),
        }
    }

    /// 调度器使用的时钟
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// 注册回调
    ///
    /// 同一阶段内同名回调已存在时为空操作，返回 `false`。
    pub fn register<T>(&self, name: &str, phase: Phase, task: T) -> bool
    where
        T: Task + 'static,
    {
        let mut registry = self.registry.lock();
        let entries = &mut registry.phases[phase.index()];
        if entries.iter().any(|e| &*e.name == name) {
            trace!("Callback {} already registered in {}", name, phase);
            return false;
        }

        entries.push(Entry {
            name: name.into(),
            active: Arc::new(AtomicBool::new(true)),
            task: Arc::new(Mutex::new(Box::new(task))),
        });
        debug!("Registered callback {} in {}", name, phase);
        true
    }

    /// 注销回调
    ///
    /// 未注册时为空操作，返回 `false`。
    pub fn unregister(&self, name: &str, phase: Phase) -> bool {
        let mut registry = self.registry.lock();
        let entries = &mut registry.phases[phase.index()];
        match entries.iter().position(|e| &*e.name == name) {
            Some(pos) => {
                let entry = entries.remove(pos);
                // 正在进行的分发快照中仍持有该条目，标记后不再执行
                entry.active.store(false, Ordering::Release);
                debug!("Unregistered callback {} from {}", name, phase);
                true
            },
            None => false,
        }
    }

    /// 阶段内是否已注册指定回调
    pub fn is_registered(&self, name: &str, phase: Phase) -> bool {
        self.registry.lock().phases[phase.index()]
            .iter()
            .any(|e| &*e.name == name)
    }

    /// 阶段内回调数量
    pub fn len(&self, phase: Phase) -> usize {
        self.registry.lock().phases[phase.index()].len()
    }

    /// 所有阶段均无回调
    pub fn is_empty(&self) -> bool {
        self.registry.lock().phases.iter().all(Vec::is_empty)
    }

    /// 阶段内回调名称（按注册顺序）
    pub fn names(&self, phase: Phase) -> Vec<String> {
        self.registry.lock().phases[phase.index()]
            .iter()
            .map(|e| e.name.to_string())
            .collect()
    }

    /// 阶段被分发的累计次数
    pub fn dispatch_count(&self, phase: Phase) -> u64 {
        self.dispatch_counts[phase.index()].load(Ordering::Relaxed)
    }

    /// 分发一个阶段
    ///
    /// 按注册顺序执行该阶段的所有回调一次。
    pub fn dispatch(&self, phase: Phase, tick: &Tick) {
        let snapshot: Vec<Entry> = self.registry.lock().phases[phase.index()].clone();
        let tick = Tick { phase, ..*tick };

        for entry in &snapshot {
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            match entry.task.try_lock() {
                Some(mut task) => task.run(&tick),
                None => warn!(
                    "Callback {} re-entered during {} dispatch, skipped",
                    entry.name, phase
                ),
            }
        }

        self.dispatch_counts[phase.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// 开始新周期，返回本周期的上下文（阶段为 `PrePeriodic`）
    pub fn begin_period(&self, mode: RunMode) -> Tick {
        let now = self.clock.now();
        let mut period = self.period.lock();
        let dt = period
            .last_start
            .map(|last| now.saturating_sub(last))
            .unwrap_or(Duration::ZERO);
        let tick = Tick {
            index: period.index,
            mode,
            phase: Phase::PrePeriodic,
            now,
            dt,
        };
        period.index += 1;
        period.last_start = Some(now);
        tick
    }

    /// 执行完整的一个周期
    ///
    /// 按固定顺序分发四个阶段，并在其间调用宿主的周期逻辑与连续逻辑。
    pub fn run_period<P, C>(&self, mode: RunMode, periodic: P, continuous: C) -> Tick
    where
        P: FnOnce(&Tick),
        C: FnOnce(&Tick),
    {
        let tick = self.begin_period(mode);

        self.dispatch(Phase::PrePeriodic, &tick);
        periodic(&tick);
        self.dispatch(Phase::PostPeriodic, &tick);

        self.dispatch(Phase::PreContinuous, &tick);
        continuous(&Tick {
            phase: Phase::PreContinuous,
            ..tick
        });
        self.dispatch(Phase::PostContinuous, &tick);

        tick
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        let mut s = f.debug_struct("Scheduler");
        for phase in Phase::ALL {
            s.field(phase.as_str(), &registry.phases[phase.index()].len());
        }
        s.finish()
    }
}
