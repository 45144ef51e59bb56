//! 定时器 - 在指定时长后触发事件
//!
//! [`Timer`] 最多持有一个待触发的 `(deadline, Event)` 对。
//! 由调度器在某个阶段每周期调用一次 [`Timer::poll`]，到期时触发事件并清除待触发对。
//!
//! # 注意
//!
//! 重新 `arm()` 会静默覆盖尚未触发的旧配对：旧事件**永远不会**被此定时器触发。
//! 若有状态机仍在等待旧事件，它将永远等待下去。需要更换事件时请先 `cancel()`。
//!
//! # 示例
//!
//! ```rust
//! use wheelbot_sched::{Event, Timer};
//! use wheelbot_sched::clock::ManualClock;
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let timer = Timer::new("delay", clock.shared());
//! let event = Event::new("delay.done");
//!
//! timer.arm(Duration::from_secs(1), &event);
//! clock.advance(Duration::from_millis(999));
//! timer.poll();
//! assert!(!event.is_signaled());
//!
//! clock.advance(Duration::from_millis(1));
//! timer.poll();
//! assert!(event.is_signaled());
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::clock::SharedClock;
use crate::event::Event;

#[derive(Debug)]
struct Pending {
    deadline: Duration,
    event: Event,
}

/// 单次定时器（共享句柄）
#[derive(Clone)]
pub struct Timer {
    name: Arc<str>,
    clock: SharedClock,
    pending: Arc<Mutex<Option<Pending>>>,
}

impl Timer {
    /// 创建定时器
    pub fn new(name: impl Into<String>, clock: SharedClock) -> Self {
        let name: String = name.into();
        Self {
            name: name.into(),
            clock,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// 定时器名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 布置定时器
    ///
    /// 清除 `event` 并记录 `deadline = now + duration`。
    /// 若已有未触发的配对，旧配对被静默丢弃。
    pub fn arm(&self, duration: Duration, event: &Event) {
        event.clear();
        let deadline = self.clock.now() + duration;
        let previous = self.pending.lock().replace(Pending {
            deadline,
            event: event.clone(),
        });

        if let Some(previous) = previous
            && !previous.event.same_as(event)
        {
            debug!(
                "Timer {} re-armed, abandoning pending event {}",
                self.name,
                previous.event.name()
            );
        }
        trace!("Timer {} armed for {:?} -> {}", self.name, duration, event.name());
    }

    /// 取消待触发的配对（不触发事件）
    pub fn cancel(&self) {
        if let Some(pending) = self.pending.lock().take() {
            debug!("Timer {} cancelled ({})", self.name, pending.event.name());
        }
    }

    /// 是否有待触发的配对
    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// 距离到期的剩余时间
    pub fn remaining(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.pending
            .lock()
            .as_ref()
            .map(|p| p.deadline.saturating_sub(now))
    }

    /// 每周期检查一次
    ///
    /// 到期（`now >= deadline`）时触发事件并清除待触发对，返回 `true`。
    pub fn poll(&self) -> bool {
        let now = self.clock.now();
        let fired = {
            let mut pending = self.pending.lock();
            match pending.as_ref() {
                Some(p) if now >= p.deadline => pending.take(),
                _ => None,
            }
        };

        match fired {
            Some(p) => {
                trace!("Timer {} expired -> {}", self.name, p.event.name());
                p.event.signal();
                true
            },
            None => false,
        }
    }
}
