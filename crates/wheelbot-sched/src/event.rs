//! 事件 - 一次性完成通知
//!
//! [`Event`] 是一个带名字的二值信号，是系统中所有"完成通知"的基本单元：
//! 定时器到期、PID 运动到达目标/超时/被取消，都通过 `signal()` 通知等待方。
//!
//! # 语义
//!
//! - 读取（`is_signaled()`）**不会**自动清除信号
//! - 拥有该事件的操作在重新布置（arm）时负责 `clear()`
//! - 克隆得到的是同一个事件的另一个句柄（共享状态），而不是新事件
//!
//! # 示例
//!
//! ```rust
//! use wheelbot_sched::Event;
//!
//! let done = Event::new("drive.done");
//! let waiter = done.clone();
//!
//! assert!(!waiter.is_signaled());
//! done.signal();
//! assert!(waiter.is_signaled());
//! assert!(waiter.is_signaled()); // 不会自动清除
//!
//! done.clear();
//! assert!(!waiter.is_signaled());
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

struct EventInner {
    name: String,
    signaled: AtomicBool,
}

/// 一次性二值信号（共享句柄）
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    /// 创建未触发的事件
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventInner {
                name: name.into(),
                signaled: AtomicBool::new(false),
            }),
        }
    }

    /// 事件名称
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// 触发事件
    pub fn signal(&self) {
        self.inner.signaled.store(true, Ordering::Release);
    }

    /// 清除事件
    pub fn clear(&self) {
        self.inner.signaled.store(false, Ordering::Release);
    }

    /// 事件是否已触发
    pub fn is_signaled(&self) -> bool {
        self.inner.signaled.load(Ordering::Acquire)
    }

    /// 是否为同一个事件（句柄身份比较）
    pub fn same_as(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Event {}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name())
            .field("signaled", &self.is_signaled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_signal_and_clear() {
        let event = Event::new("test");
        assert!(!event.is_signaled());

        event.signal();
        assert!(event.is_signaled());

        // 重复触发仍然保持触发状态
        event.signal();
        assert!(event.is_signaled());

        event.clear();
        assert!(!event.is_signaled());
    }

    #[test]
    fn test_event_clone_shares_state() {
        let a = Event::new("shared");
        let b = a.clone();

        a.signal();
        assert!(b.is_signaled());
        assert_eq!(a, b);
    }

    #[test]
    fn test_event_identity_not_name() {
        let a = Event::new("same-name");
        let b = Event::new("same-name");
        assert_ne!(a, b);
        assert!(!a.same_as(&b));
    }
}
