//! 硬件抽象
//!
//! 驱动层只依赖两个最小接口：执行机构（功率输出 + 累计位置）与航向源。
//! 物理驱动（电机控制器、编码器、陀螺仪）在本仓库之外实现。

use std::sync::Arc;

use parking_lot::Mutex;

/// 执行机构（电机 + 编码器）
///
/// 所有方法在调度线程上同步调用，不得阻塞，不返回错误：
/// 硬件故障由实现方自行记录并降级（例如输出 0）。
pub trait Actuator: Send {
    /// 设置输出功率，范围 [-1.0, 1.0]
    fn set_power(&mut self, power: f64);

    /// 当前输出功率
    fn power(&self) -> f64;

    /// 累计位置（编码器计数或实现方定义的单位）
    fn position(&self) -> f64;

    /// 位置清零
    fn reset_position(&mut self);
}

/// 航向源（陀螺仪 / IMU）
///
/// 航向单位为度，顺时针为正，不做回绕（连续累计）。
pub trait HeadingSource: Send {
    /// 当前航向（度）
    fn heading(&mut self) -> f64;
}

/// 共享执行机构句柄
///
/// 执行机构由驱动底盘或 PID 电机**驱动**，但不被它们独占所有。
pub type SharedActuator = Arc<Mutex<dyn Actuator>>;

/// 包装为共享执行机构句柄
pub fn shared_actuator<A: Actuator + 'static>(actuator: A) -> SharedActuator {
    Arc::new(Mutex::new(actuator))
}

/// 输出功率净化：NaN 视为 0，其余限制在 [-1.0, 1.0]
#[inline]
pub(crate) fn sanitize_power(power: f64) -> f64 {
    if power.is_nan() {
        0.0
    } else {
        power.clamp(-1.0, 1.0)
    }
}
