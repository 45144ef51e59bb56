//! 底盘运动学
//!
//! 纯函数：驾驶指令 → 每轮功率（逆运动学），每轮位移 → 底盘位移（正运动学）。
//!
//! # 约定
//!
//! - 功率范围 [-1.0, 1.0]
//! - `turn` / `rotation` 为正时顺时针旋转（左轮加速）
//! - 横移 `x` 为正时向右
//! - 航向单位为度，顺时针为正
//! - 麦克纳姆轮顺序 `[左前, 右前, 左后, 右后]`

use crate::hal::sanitize_power;

/// 按最大幅值等比缩放
///
/// 任一分量绝对值超过 `max` 时，所有分量除以最大绝对值再乘以 `max`，
/// 保持分量之间的比例（也就是运动方向）。未超限时原样返回。
///
/// NaN 视为 0；存在无穷分量时，无穷分量取 `±max`，有限分量取 0。
pub fn desaturate<const N: usize>(values: [f64; N], max: f64) -> [f64; N] {
    let values = values.map(|v| if v.is_nan() { 0.0 } else { v });
    if values.iter().any(|v| v.is_infinite()) {
        return values.map(|v| if v.is_infinite() { max.copysign(v) } else { 0.0 });
    }
    let largest = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if largest > max {
        values.map(|v| v / largest * max)
    } else {
        values
    }
}

/// 坦克驱动：左右功率分别限幅
pub fn tank(left: f64, right: f64) -> [f64; 2] {
    [sanitize_power(left), sanitize_power(right)]
}

/// 街机驱动：前进 + 转向
///
/// 超限时按最大幅值缩放，保持转弯半径。
pub fn arcade(drive: f64, turn: f64) -> [f64; 2] {
    desaturate([drive + turn, drive - turn], 1.0)
}

/// 场地坐标向量转换到机器人坐标
///
/// `heading` 为机器人航向（度，顺时针为正）。
pub fn field_to_robot(x: f64, y: f64, heading: f64) -> (f64, f64) {
    let (sin, cos) = heading.to_radians().sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

/// 麦克纳姆驱动
///
/// 给定航向时 `(x, y)` 视为场地坐标（field-centric），先旋转到机器人坐标再混合。
///
/// 返回 `[左前, 右前, 左后, 右后]`。
pub fn mecanum(x: f64, y: f64, rotation: f64, heading: Option<f64>) -> [f64; 4] {
    let (x, y) = match heading {
        Some(h) if h.is_finite() => field_to_robot(x, y, h),
        _ => (x, y),
    };
    desaturate(
        [
            y + x + rotation,
            y - x - rotation,
            y - x + rotation,
            y + x - rotation,
        ],
        1.0,
    )
}

/// 差速底盘正运动学
///
/// 返回 `(前进位移, 航向变化（度）)`；`track_width <= 0` 时航向变化为 0。
pub fn differential_forward(left: f64, right: f64, track_width: f64) -> (f64, f64) {
    let forward = (left + right) / 2.0;
    let heading = if track_width > 0.0 {
        ((left - right) / track_width).to_degrees()
    } else {
        0.0
    };
    (forward, heading)
}

/// 麦克纳姆底盘正运动学
///
/// 输入 `[左前, 右前, 左后, 右后]` 位移，返回 `(横移, 前进, 航向变化（度）)`。
pub fn mecanum_forward(wheels: [f64; 4], track_width: f64) -> (f64, f64, f64) {
    let [lf, rf, lb, rb] = wheels;
    let y = (lf + rf + lb + rb) / 4.0;
    let x = (lf - rf - lb + rb) / 4.0;
    let (_, heading) = differential_forward((lf + lb) / 2.0, (rf + rb) / 2.0, track_width);
    (x, y, heading)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_desaturate_keeps_ratio() {
        let out = desaturate([2.0, 1.0, -0.5], 1.0);
        assert!(approx(out[0], 1.0));
        assert!(approx(out[1], 0.5));
        assert!(approx(out[2], -0.25));

        // 未超限时不变
        assert_eq!(desaturate([0.3, -0.9], 1.0), [0.3, -0.9]);
    }

    #[test]
    fn test_desaturate_non_finite() {
        assert_eq!(desaturate([f64::INFINITY, 0.5], 1.0), [1.0, 0.0]);
        assert_eq!(
            desaturate([f64::INFINITY, f64::NEG_INFINITY, f64::NAN], 1.0),
            [1.0, -1.0, 0.0]
        );
        assert_eq!(arcade(f64::INFINITY, 0.0), [1.0, 1.0]);
        assert_eq!(arcade(f64::NAN, 0.5), [0.5, -0.5]);
    }

    #[test]
    fn test_tank_clamps_each_side() {
        assert_eq!(tank(1.5, 0.5), [1.0, 0.5]);
        assert_eq!(tank(-2.0, f64::NAN), [-1.0, 0.0]);
    }

    #[test]
    fn test_arcade_mixing() {
        assert_eq!(arcade(0.5, 0.0), [0.5, 0.5]);
        assert_eq!(arcade(0.0, 0.5), [0.5, -0.5]);
        let [l, r] = arcade(1.0, 1.0);
        assert!(approx(l, 1.0) && approx(r, 0.0));
    }

    #[test]
    fn test_mecanum_pure_motions() {
        assert_eq!(mecanum(0.0, 0.5, 0.0, None), [0.5, 0.5, 0.5, 0.5]);
        assert_eq!(mecanum(0.5, 0.0, 0.0, None), [0.5, -0.5, -0.5, 0.5]);
        assert_eq!(mecanum(0.0, 0.0, 0.5, None), [0.5, -0.5, 0.5, -0.5]);
    }

    #[test]
    fn test_mecanum_normalization() {
        let out = mecanum(1.0, 1.0, 1.0, None);
        // 原始值 [3, -1, 1, 1]
        assert!(approx(out[0], 1.0));
        assert!(approx(out[1], -1.0 / 3.0));
        assert!(approx(out[2], 1.0 / 3.0));
        assert!(approx(out[3], 1.0 / 3.0));
    }

    #[test]
    fn test_mecanum_field_centric() {
        // 机器人顺时针转了 90°（朝向场地 +x），场地前进 = 机器人向左横移
        let out = mecanum(0.0, 1.0, 0.0, Some(90.0));
        let expected = [-1.0, 1.0, 1.0, -1.0];
        for (o, e) in out.iter().zip(expected) {
            assert!(approx(*o, e), "{:?}", out);
        }
    }

    #[test]
    fn test_forward_kinematics() {
        let (forward, heading) = differential_forward(10.0, 10.0, 12.0);
        assert!(approx(forward, 10.0) && approx(heading, 0.0));

        let (forward, heading) = differential_forward(1.0, -1.0, 2.0);
        assert!(approx(forward, 0.0));
        assert!(approx(heading, 1.0f64.to_degrees()));

        let (x, y, _) = mecanum_forward([1.0, -1.0, -1.0, 1.0], 10.0);
        assert!(approx(x, 1.0) && approx(y, 0.0));
    }

    proptest::proptest! {
        /// 缩放后不超限，且保持分量比例
        #[test]
        fn prop_desaturate_keeps_direction(
            values in proptest::array::uniform4(-10.0f64..10.0),
        ) {
            let out = desaturate(values, 1.0);
            let largest = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
            for (o, v) in out.iter().zip(values) {
                proptest::prop_assert!(o.abs() <= 1.0 + 1e-12);
                if largest > 1.0 {
                    proptest::prop_assert!((o * largest - v).abs() < 1e-9);
                } else {
                    proptest::prop_assert_eq!(*o, v);
                }
            }
        }

        /// 未饱和时，麦克纳姆逆解经正运动学还原为原始运动
        #[test]
        fn prop_mecanum_inverse_then_forward(
            x in -0.3f64..0.3,
            y in -0.3f64..0.3,
            rotation in -0.3f64..0.3,
            track_width in 0.1f64..5.0,
        ) {
            let wheels = mecanum(x, y, rotation, None);
            let (fx, fy, heading) = mecanum_forward(wheels, track_width);
            proptest::prop_assert!(approx(fx, x));
            proptest::prop_assert!(approx(fy, y));
            proptest::prop_assert!(approx(heading, (2.0 * rotation / track_width).to_degrees()));
        }
    }
}
