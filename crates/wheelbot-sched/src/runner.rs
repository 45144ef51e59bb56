//! Loop Runner - 固定周期宿主循环
//!
//! 参考宿主实现：以固定周期驱动 [`Scheduler::run_period`]，
//! 先运行若干个初始化周期（[`RunMode::Init`]），随后进入运行周期（[`RunMode::Running`]）。
//!
//! # 核心功能
//!
//! - **精确定时**: 使用 `spin_sleep` 实现低抖动延时，按绝对截止时间对齐周期
//! - **超时告警**: 单周期耗时超过标称周期的倍数时输出警告
//! - **停止标志**: 通过 [`LoopRunner::stop_handle`] 从其他线程请求停止
//!
//! PID 微分项与稳定时间按固定周期整定，宿主周期必须稳定。
//!
//! # 示例
//!
//! ```rust,no_run
//! use wheelbot_sched::{LoopConfig, LoopRunner, Scheduler};
//! use wheelbot_sched::clock::SystemClock;
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new(SystemClock::shared());
//! let config = LoopConfig {
//!     period: Duration::from_millis(50),
//!     max_periods: Some(100),
//!     ..LoopConfig::default()
//! };
//! let mut runner = LoopRunner::new(scheduler, config)?;
//! runner.run(|_tick| {}, |_tick| {});
//! # Ok::<(), wheelbot_sched::SchedError>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use spin_sleep::SpinSleeper;
use tracing::{debug, info, warn};

use crate::error::SchedError;
use crate::scheduler::{RunMode, Scheduler, Tick};

/// 宿主循环配置
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// 控制周期
    ///
    /// 默认 50ms（20Hz）。
    pub period: Duration,

    /// 超时告警倍数
    ///
    /// 单周期耗时超过 `period * late_warn_multiplier` 时输出警告。
    pub late_warn_multiplier: f64,

    /// 初始化周期数（以 `RunMode::Init` 运行）
    pub init_periods: u64,

    /// 最大周期数（None 表示无限循环）
    ///
    /// 用于测试或定时运行，计数包含初始化周期。
    pub max_periods: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            period: Duration::from_millis(50),
            late_warn_multiplier: 1.5,
            init_periods: 1,
            max_periods: None,
        }
    }
}

impl LoopConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<(), SchedError> {
        if self.period.is_zero() {
            return Err(SchedError::InvalidPeriod(self.period));
        }
        if !(self.late_warn_multiplier >= 1.0) {
            return Err(SchedError::InvalidLateMultiplier(self.late_warn_multiplier));
        }
        Ok(())
    }
}

/// 固定周期宿主循环
pub struct LoopRunner {
    scheduler: Scheduler,
    config: LoopConfig,
    stop: Arc<AtomicBool>,
    late_periods: u64,
}

impl LoopRunner {
    /// 创建宿主循环
    ///
    /// # 错误
    ///
    /// 配置无效时返回 [`SchedError`]。
    pub fn new(scheduler: Scheduler, config: LoopConfig) -> Result<Self, SchedError> {
        config.validate()?;
        if config.period < Duration::from_millis(1) {
            warn!(
                "Very short control period: {:?}. This may cause performance issues.",
                config.period
            );
        }
        Ok(Self {
            scheduler,
            config,
            stop: Arc::new(AtomicBool::new(false)),
            late_periods: 0,
        })
    }

    /// 停止标志
    ///
    /// 置为 `true` 后循环在当前周期结束时退出。
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// 超时周期计数
    pub fn late_periods(&self) -> u64 {
        self.late_periods
    }

    /// 运行循环
    ///
    /// 阻塞直到达到 `max_periods` 或停止标志被置位，返回执行的周期数。
    ///
    /// - `periodic`: 宿主周期逻辑（PostPeriodic 之前）
    /// - `continuous`: 宿主连续逻辑（PostContinuous 之前）
    pub fn run<P, C>(&mut self, mut periodic: P, mut continuous: C) -> u64
    where
        P: FnMut(&Tick),
        C: FnMut(&Tick),
    {
        #[cfg(feature = "realtime")]
        raise_priority();

        let sleeper = SpinSleeper::default();
        let period = self.config.period;
        let late_threshold = period.mul_f64(self.config.late_warn_multiplier);
        let start = Instant::now();
        let mut count: u64 = 0;

        info!("Loop runner started, period {:?}", period);

        loop {
            if let Some(max) = self.config.max_periods
                && count >= max
            {
                break;
            }
            if self.stop.load(Ordering::Relaxed) {
                debug!("Loop runner stop requested");
                break;
            }

            let mode = if count < self.config.init_periods {
                RunMode::Init
            } else {
                RunMode::Running
            };

            let period_start = Instant::now();
            self.scheduler
                .run_period(mode, |tick| periodic(tick), |tick| continuous(tick));
            let elapsed = period_start.elapsed();
            count += 1;

            if elapsed > late_threshold {
                self.late_periods += 1;
                warn!(
                    "Control period overrun: {:?} (nominal {:?}, period #{})",
                    elapsed, period, count
                );
            }

            // 按绝对截止时间对齐，避免累积漂移
            if let Some(deadline) =
                deadline_offset(period, count).and_then(|offset| start.checked_add(offset))
            {
                let now = Instant::now();
                if deadline > now {
                    sleeper.sleep(deadline - now);
                }
            }
        }

        info!("Loop runner finished after {} periods", count);
        count
    }
}

/// 第 `count` 个周期结束时相对起点的偏移；溢出时返回 None
fn deadline_offset(period: Duration, count: u64) -> Option<Duration> {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let nanos = period.as_nanos().checked_mul(u128::from(count))?;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).ok()?;
    Some(Duration::new(secs, (nanos % NANOS_PER_SEC) as u32))
}

#[cfg(feature = "realtime")]
fn raise_priority() {
    use thread_priority::{ThreadPriority, set_current_thread_priority};

    match set_current_thread_priority(ThreadPriority::Max) {
        Ok(()) => debug!("Loop thread priority raised"),
        Err(e) => warn!("Failed to raise loop thread priority: {:?}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::scheduler::Phase;
    use parking_lot::Mutex;

    #[test]
    fn test_loop_config_validation() {
        let config = LoopConfig {
            period: Duration::ZERO,
            ..LoopConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(SchedError::InvalidPeriod(Duration::ZERO))
        );

        let config = LoopConfig {
            late_warn_multiplier: 0.5,
            ..LoopConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SchedError::InvalidLateMultiplier(_))
        ));

        let config = LoopConfig {
            late_warn_multiplier: f64::NAN,
            ..LoopConfig::default()
        };
        assert!(config.validate().is_err());

        assert!(LoopConfig::default().validate().is_ok());
    }

    #[test]
    fn test_deadline_offset_beyond_u32_periods() {
        let period = Duration::from_millis(1);
        assert_eq!(deadline_offset(period, 0), Some(Duration::ZERO));
        assert_eq!(deadline_offset(period, 3), Some(Duration::from_millis(3)));

        // 超过 u32::MAX 个周期不截断
        let count = u64::from(u32::MAX) + 2;
        assert_eq!(deadline_offset(period, count), Some(Duration::from_millis(count)));

        assert_eq!(deadline_offset(Duration::MAX, 2), None);
    }

    #[test]
    fn test_runner_init_then_running() {
        let scheduler = Scheduler::new(SystemClock::shared());
        let modes: Arc<Mutex<Vec<RunMode>>> = Arc::default();
        let m = modes.clone();
        scheduler.register("mode", Phase::PrePeriodic, move |tick: &Tick| {
            m.lock().push(tick.mode)
        });

        let config = LoopConfig {
            period: Duration::from_millis(2),
            init_periods: 2,
            max_periods: Some(5),
            ..LoopConfig::default()
        };
        let mut runner = LoopRunner::new(scheduler, config).unwrap();
        let mut periodic_calls = 0;
        let count = runner.run(|_| periodic_calls += 1, |_| {});

        assert_eq!(count, 5);
        assert_eq!(periodic_calls, 5);
        assert_eq!(
            *modes.lock(),
            vec![
                RunMode::Init,
                RunMode::Init,
                RunMode::Running,
                RunMode::Running,
                RunMode::Running
            ]
        );
    }

    #[test]
    fn test_runner_stop_flag() {
        let scheduler = Scheduler::new(SystemClock::shared());
        let mut runner = LoopRunner::new(
            scheduler,
            LoopConfig {
                period: Duration::from_millis(1),
                ..LoopConfig::default()
            },
        )
        .unwrap();

        let stop = runner.stop_handle();
        let count = runner.run(
            |tick| {
                if tick.index == 3 {
                    stop.store(true, Ordering::Relaxed);
                }
            },
            |_| {},
        );
        assert_eq!(count, 4);
    }
}
