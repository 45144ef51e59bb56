//! 通用状态机
//!
//! 对不透明状态令牌 `S` 进行排序的状态机，用于编排自动运行序列。
//! 状态令牌通常是调用方定义的枚举；状态机从不对令牌做序数运算。
//!
//! # 等待事件
//!
//! 状态体中"发出命令 -> 登记等待 -> 返回"是最常见的写法：
//!
//! ```rust
//! use wheelbot_sched::{Event, StateMachine};
//! use wheelbot_sched::clock::ManualClock;
//!
//! #[derive(Debug, Clone, Copy, PartialEq)]
//! enum Step {
//!     DriveForward,
//!     Turn,
//!     Done,
//! }
//!
//! let clock = ManualClock::new();
//! let mut sm = StateMachine::new("auto", clock.shared());
//! let drive_done = Event::new("drive.done");
//!
//! sm.start(Step::DriveForward);
//! // 每周期：
//! if sm.is_ready() {
//!     match sm.get_state() {
//!         Some(Step::DriveForward) => {
//!             // pid_drive.set_target(..., Some(&drive_done), ...);
//!             sm.wait_for_single_event(&drive_done, Step::Turn);
//!         },
//!         Some(Step::Turn) => sm.set_state(Step::Done),
//!         _ => sm.stop(),
//!     }
//! }
//! assert!(!sm.is_ready());
//!
//! drive_done.signal();
//! assert!(sm.is_ready());
//! assert_eq!(sm.get_state(), Some(Step::Turn));
//! ```
//!
//! # 就绪判定
//!
//! 调用方每周期调用一次 [`StateMachine::is_ready`]；返回 `false` 时本周期不得执行状态体。

use std::fmt::Debug;
use std::time::Duration;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::clock::SharedClock;
use crate::event::Event;

#[derive(Debug)]
struct Wait<S> {
    next: S,
    events: SmallVec<[Event; 4]>,
    deadline: Option<Duration>,
}

/// 事件驱动的状态机
pub struct StateMachine<S> {
    name: String,
    clock: SharedClock,
    current: Option<S>,
    wait: Option<Wait<S>>,
    enabled: bool,
}

impl<S> StateMachine<S>
where
    S: Clone + PartialEq + Debug,
{
    /// 创建停止状态的状态机
    pub fn new(name: impl Into<String>, clock: SharedClock) -> Self {
        Self {
            name: name.into(),
            clock,
            current: None,
            wait: None,
            enabled: false,
        }
    }

    /// 状态机名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 启动状态机
    ///
    /// 设置初始状态、清除所有等待。可对已停止的状态机重新启动。
    pub fn start(&mut self, initial: S) {
        debug!("StateMachine {} started at {:?}", self.name, initial);
        self.current = Some(initial);
        self.wait = None;
        self.enabled = true;
    }

    /// 停止状态机
    ///
    /// 停止后不再就绪，直到以新的初始状态重新 `start()`。
    pub fn stop(&mut self) {
        debug!("StateMachine {} stopped at {:?}", self.name, self.current);
        self.enabled = false;
        self.current = None;
        self.wait = None;
    }

    /// 是否处于启用状态
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 当前状态
    pub fn get_state(&self) -> Option<S> {
        self.current.clone()
    }

    /// 立即无条件转移到指定状态
    ///
    /// 同时丢弃尚未满足的等待。
    pub fn set_state(&mut self, state: S) {
        trace!("StateMachine {}: {:?} -> {:?}", self.name, self.current, state);
        self.current = Some(state);
        self.wait = None;
    }

    /// 声明转移门：等待所有随后 `add_event()` 的事件触发后转移到 `next`
    pub fn wait_for_events(&mut self, next: S) {
        self.wait = Some(Wait {
            next,
            events: SmallVec::new(),
            deadline: None,
        });
    }

    /// 与 [`wait_for_events`](Self::wait_for_events) 相同，但超时后即使事件未全部触发也转移
    pub fn wait_for_events_timeout(&mut self, next: S, timeout: Duration) {
        self.wait = Some(Wait {
            next,
            events: SmallVec::new(),
            deadline: Some(self.clock.now() + timeout),
        });
    }

    /// 等待单个事件后转移到 `next`
    pub fn wait_for_single_event(&mut self, event: &Event, next: S) {
        self.wait_for_events(next);
        self.add_event(event);
    }

    /// 向当前转移门添加一个等待事件
    ///
    /// 必须先调用 `wait_for_events*()`；否则忽略。重复添加同一事件只记录一次。
    pub fn add_event(&mut self, event: &Event) {
        match self.wait.as_mut() {
            Some(wait) => {
                if !wait.events.iter().any(|e| e.same_as(event)) {
                    wait.events.push(event.clone());
                }
            },
            None => debug!(
                "StateMachine {}: add_event({}) without wait_for_events, ignored",
                self.name,
                event.name()
            ),
        }
    }

    /// 放弃当前等待，立即转移到等待声明的下一状态
    pub fn skip_wait(&mut self) {
        if let Some(wait) = self.wait.take() {
            debug!("StateMachine {}: wait skipped -> {:?}", self.name, wait.next);
            self.current = Some(wait.next);
        }
    }

    /// 是否正在等待事件
    pub fn is_waiting(&self) -> bool {
        self.wait.is_some()
    }

    /// 就绪判定
    ///
    /// 启用且（无等待或等待的事件全部触发或等待已超时）时返回 `true`。
    /// 等待满足时原子地清除等待并转移到下一状态后再返回。
    pub fn is_ready(&mut self) -> bool {
        if !self.enabled {
            return false;
        }

        let Some(wait) = self.wait.as_ref() else {
            return true;
        };

        let all_signaled = wait.events.iter().all(Event::is_signaled);
        let timed_out = wait.deadline.is_some_and(|d| self.clock.now() >= d);
        if !all_signaled && !timed_out {
            return false;
        }

        if let Some(wait) = self.wait.take() {
            if timed_out && !all_signaled {
                debug!(
                    "StateMachine {}: wait timed out -> {:?}",
                    self.name, wait.next
                );
            } else {
                trace!("StateMachine {}: events ready -> {:?}", self.name, wait.next);
            }
            self.current = Some(wait.next);
        }
        true
    }
}

impl<S: Debug> Debug for StateMachine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("current", &self.current)
            .field("waiting", &self.wait.is_some())
            .field("enabled", &self.enabled)
            .finish()
    }
}
