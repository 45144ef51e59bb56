//! # 遥测
//!
//! 按行输出的状态显示接口。显示硬件（驾驶站屏幕、机载 LCD）在本仓库之外实现，
//! 这里提供日志输出与内存记录两种实现，以及把底盘状态格式化为显示行的 [`DriveStatus`]。

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;
use wheelbot_drive::{DriveTarget, PidDrive};
use wheelbot_sched::Clock;

/// 状态显示接口
pub trait TelemetrySink: Send {
    /// 在第 `line` 行显示文本（覆盖该行原有内容）
    fn status(&mut self, line: usize, text: &str);
}

/// 输出到日志的显示
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn status(&mut self, line: usize, text: &str) {
        info!(line, "{}", text);
    }
}

/// 记录在内存中的显示（测试使用）
///
/// 句柄可克隆，所有克隆共享同一块"屏幕"。
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<BTreeMap<usize, String>>>,
}

impl MemorySink {
    /// 创建空屏幕
    pub fn new() -> Self {
        Self::default()
    }

    /// 某一行的当前内容
    pub fn line(&self, line: usize) -> Option<String> {
        self.lines.lock().get(&line).cloned()
    }

    /// 所有行（按行号排序）
    pub fn lines(&self) -> Vec<(usize, String)> {
        self.lines
            .lock()
            .iter()
            .map(|(n, text)| (*n, text.clone()))
            .collect()
    }

    /// 清屏
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl TelemetrySink for MemorySink {
    fn status(&mut self, line: usize, text: &str) {
        self.lines.lock().insert(line, text.to_string());
    }
}

/// 底盘状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriveStatus {
    /// 采样时间（毫秒）
    pub timestamp_ms: u64,
    /// 驱动名称
    pub drive: String,
    /// 累计横移
    pub x: f64,
    /// 累计前进
    pub y: f64,
    /// 航向（度）
    pub heading: f64,
    /// 是否有运动在进行
    pub active: bool,
    /// 前进设定值
    pub target_y: Option<f64>,
    /// 航向设定值
    pub target_heading: Option<f64>,
    /// 最近一次运动的结束原因
    pub outcome: Option<String>,
    /// 各轮功率
    pub wheel_powers: Vec<f64>,
}

impl DriveStatus {
    /// 采样当前状态
    pub fn capture(drive: &PidDrive, clock: &dyn Clock) -> Self {
        let base = drive.base();
        let pose = base.pose();
        let status = drive.status();
        let DriveTarget { y, turn, .. } = status.setpoints;
        Self {
            timestamp_ms: clock.now_millis(),
            drive: status.name,
            x: pose.x,
            y: pose.y,
            heading: pose.heading,
            active: status.active,
            target_y: y,
            target_heading: turn,
            outcome: status.last_outcome.map(|o| o.to_string()),
            wheel_powers: base.wheel_powers().into_iter().map(|(_, p)| p).collect(),
        }
    }

    /// 格式化为显示行
    pub fn lines(&self) -> Vec<String> {
        let state = if self.active {
            "active".to_string()
        } else {
            format!("idle ({})", self.outcome.as_deref().unwrap_or("-"))
        };
        let fmt_target = |t: Option<f64>| t.map_or("-".to_string(), |v| format!("{:.3}", v));
        vec![
            format!("[{:>8}ms] {} {}", self.timestamp_ms, self.drive, state),
            format!(
                "pose: x={:.3} y={:.3} heading={:.1}",
                self.x, self.y, self.heading
            ),
            format!(
                "target: y={} heading={}",
                fmt_target(self.target_y),
                fmt_target(self.target_heading)
            ),
            format!(
                "power: {}",
                self.wheel_powers
                    .iter()
                    .map(|p| format!("{:+.2}", p))
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
        ]
    }

    /// 输出到显示，从第 `first_line` 行开始
    pub fn publish(&self, sink: &mut dyn TelemetrySink, first_line: usize) {
        for (i, text) in self.lines().iter().enumerate() {
            sink.status(first_line + i, text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wheelbot_control::{PidParams, TargetMode};
    use wheelbot_drive::hal::shared_actuator;
    use wheelbot_drive::sim::SimMotor;
    use wheelbot_drive::{DriveBase, DriveParams, WheelPosition};
    use wheelbot_sched::clock::ManualClock;

    fn drive(clock: &ManualClock) -> PidDrive {
        let base = DriveBase::builder("base", DriveParams::differential(0.001, 0.5))
            .wheel(
                WheelPosition::LeftFront,
                shared_actuator(SimMotor::new("l", clock.shared(), 1000.0)),
            )
            .wheel(
                WheelPosition::RightFront,
                shared_actuator(SimMotor::new("r", clock.shared(), 1000.0)),
            )
            .build()
            .unwrap();
        PidDrive::builder("drive", base, clock.shared())
            .y_pid(PidParams::new().with_gains(1.0, 0.0, 0.0).with_output_range(-0.5, 0.5))
            .build()
            .unwrap()
    }

    #[test]
    fn test_memory_sink_overwrites_lines() {
        let mut sink = MemorySink::new();
        sink.status(0, "hello");
        sink.status(2, "world");
        sink.status(0, "again");

        assert_eq!(sink.line(0).as_deref(), Some("again"));
        assert_eq!(sink.line(1), None);
        assert_eq!(sink.lines().len(), 2);

        sink.clear();
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_drive_status_capture_and_publish() {
        let clock = ManualClock::new();
        let drive = drive(&clock);
        drive.set_target(
            wheelbot_drive::DriveTarget::new().with_y(1.0),
            TargetMode::Absolute,
            None,
            None,
        );
        drive.tick();
        clock.advance(Duration::from_millis(100));
        drive.tick();

        let status = DriveStatus::capture(&drive, &clock);
        assert_eq!(status.timestamp_ms, 100);
        assert!(status.active);
        assert_eq!(status.target_y, Some(1.0));
        assert_eq!(status.target_heading, None);
        assert_eq!(status.wheel_powers, vec![0.5, 0.5]);
        assert!((status.y - 0.05).abs() < 1e-9);

        let mut sink = MemorySink::new();
        let screen = sink.clone();
        status.publish(&mut sink, 1);
        assert_eq!(screen.lines().len(), 4);
        assert!(screen.line(1).unwrap().contains("drive active"));
        assert!(screen.line(3).unwrap().contains("y=1.000"));
        assert!(screen.line(4).unwrap().contains("+0.50 +0.50"));
    }

    #[test]
    fn test_drive_status_serializes_to_json() {
        let clock = ManualClock::new();
        let drive = drive(&clock);
        drive.cancel();

        let status = DriveStatus::capture(&drive, &clock);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["drive"], "drive");
        assert_eq!(json["active"], false);
        assert!(json["outcome"].is_null());
    }
}
