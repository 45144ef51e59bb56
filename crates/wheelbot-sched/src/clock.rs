//! 时钟 - 单调时间源
//!
//! 所有与时间相关的判断（定时器到期、PID 稳定时间、运动超时、状态机等待超时）
//! 都通过同一个 [`Clock`] 读取时间，保证它们使用一致的时间基准。
//!
//! # 实现
//!
//! - [`SystemClock`]: 基于 `std::time::Instant` 的单调时钟（实机使用）
//! - [`ManualClock`]: 手动推进的时钟（测试与仿真使用，完全确定性）
//!
//! # 示例
//!
//! ```rust
//! use wheelbot_sched::clock::{Clock, ManualClock};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! clock.advance(Duration::from_millis(50));
//! assert_eq!(clock.now_millis(), 50);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 单调时间源
///
/// `now()` 返回自时钟纪元以来经过的时间，保证单调不减。
pub trait Clock: Send + Sync {
    /// 自纪元以来经过的时间
    fn now(&self) -> Duration;

    /// 自纪元以来经过的秒数
    fn now_secs(&self) -> f64 {
        self.now().as_secs_f64()
    }

    /// 自纪元以来经过的毫秒数
    fn now_millis(&self) -> u64 {
        self.now().as_millis() as u64
    }
}

/// 共享时钟句柄
pub type SharedClock = Arc<dyn Clock>;

/// 系统单调时钟
///
/// 纪元为创建时刻。
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// 创建以当前时刻为纪元的时钟
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// 创建共享句柄
    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// 手动推进的时钟
///
/// 克隆出的句柄共享同一个时间值，测试代码推进时间后，
/// 所有持有该时钟的组件立即看到新时间。
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// 创建时间为 0 的时钟
    pub fn new() -> Self {
        Self::default()
    }

    /// 向前推进时间
    pub fn advance(&self, delta: Duration) {
        self.nanos.fetch_add(delta.as_nanos() as u64, Ordering::Relaxed);
    }

    /// 设置绝对时间
    ///
    /// 时间不允许倒退：小于当前值的设置会被忽略。
    pub fn set(&self, now: Duration) {
        self.nanos.fetch_max(now.as_nanos() as u64, Ordering::Relaxed);
    }

    /// 以共享句柄形式返回
    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}
