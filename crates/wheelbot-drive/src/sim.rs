//! 仿真硬件
//!
//! 用于集成测试与仿真程序的执行机构与传感器。所有类型都是可克隆句柄，
//! 测试代码保留一份克隆即可观察或改写状态。
//!
//! 仿真按时钟**惰性积分**：位置在读取或改变功率时根据经过的时间更新，
//! 不需要额外的步进调用。配合 [`ManualClock`](wheelbot_sched::ManualClock) 即可得到确定性的时间线。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use wheelbot_sched::clock::SharedClock;

use crate::hal::{Actuator, HeadingSource, sanitize_power};

struct SimMotorState {
    power: f64,
    position: f64,
    last_update: Duration,
}

/// 仿真电机
///
/// 速度 = 功率 × 满功率速度（位置单位 / 秒），位置为速度的积分。
#[derive(Clone)]
pub struct SimMotor {
    name: Arc<str>,
    clock: SharedClock,
    /// 满功率速度（位置单位 / 秒）
    max_speed: f64,
    state: Arc<Mutex<SimMotorState>>,
}

impl SimMotor {
    /// 创建仿真电机
    pub fn new(name: impl Into<String>, clock: SharedClock, max_speed: f64) -> Self {
        let name: String = name.into();
        let now = clock.now();
        Self {
            name: name.into(),
            clock,
            max_speed,
            state: Arc::new(Mutex::new(SimMotorState {
                power: 0.0,
                position: 0.0,
                last_update: now,
            })),
        }
    }

    /// 电机名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 直接设置位置（模拟外力）
    pub fn set_position(&self, position: f64) {
        let mut state = self.integrate();
        state.position = position;
    }

    fn integrate(&self) -> parking_lot::MutexGuard<'_, SimMotorState> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let dt = now.saturating_sub(state.last_update).as_secs_f64();
        state.position += state.power * self.max_speed * dt;
        state.last_update = now;
        state
    }
}

impl Actuator for SimMotor {
    fn set_power(&mut self, power: f64) {
        let mut state = self.integrate();
        state.power = sanitize_power(power);
    }

    fn power(&self) -> f64 {
        self.state.lock().power
    }

    fn position(&self) -> f64 {
        self.integrate().position
    }

    fn reset_position(&mut self) {
        let mut state = self.integrate();
        state.position = 0.0;
    }
}

impl std::fmt::Debug for SimMotor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimMotor")
            .field("name", &self.name)
            .field("power", &state.power)
            .field("position", &state.position)
            .finish()
    }
}

enum GyroSource {
    Manual(f64),
    Differential {
        left: SimMotor,
        right: SimMotor,
        /// 位置单位 → 长度单位
        scale: f64,
        track_width: f64,
    },
}

/// 仿真陀螺仪
#[derive(Clone)]
pub struct SimGyro {
    source: Arc<Mutex<GyroSource>>,
}

impl SimGyro {
    /// 手动设置航向的陀螺仪
    pub fn manual(heading: f64) -> Self {
        Self {
            source: Arc::new(Mutex::new(GyroSource::Manual(heading))),
        }
    }

    /// 跟随差速底盘左右轮的陀螺仪（运动学精确）
    pub fn differential(left: &SimMotor, right: &SimMotor, scale: f64, track_width: f64) -> Self {
        Self {
            source: Arc::new(Mutex::new(GyroSource::Differential {
                left: left.clone(),
                right: right.clone(),
                scale,
                track_width,
            })),
        }
    }

    /// 改写航向（切换为手动模式）
    pub fn set_heading(&self, heading: f64) {
        *self.source.lock() = GyroSource::Manual(heading);
    }

    /// 当前航向（度）
    pub fn read(&self) -> f64 {
        match &*self.source.lock() {
            GyroSource::Manual(h) => *h,
            GyroSource::Differential {
                left,
                right,
                scale,
                track_width,
            } => {
                let delta = (left.position() - right.position()) * scale;
                (delta / track_width).to_degrees()
            },
        }
    }
}

impl HeadingSource for SimGyro {
    fn heading(&mut self) -> f64 {
        self.read()
    }
}

/// 仿真模拟量传感器
#[derive(Clone, Debug, Default)]
pub struct SimSensor {
    bits: Arc<AtomicU64>,
}

impl SimSensor {
    /// 创建传感器
    pub fn new(value: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(value.to_bits())),
        }
    }

    /// 设置读数
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// 当前读数
    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// 读取函数（注入 PID 控制器或触发器）
    pub fn reader(&self) -> impl FnMut() -> f64 + Send + 'static {
        let sensor = self.clone();
        move || sensor.value()
    }
}
