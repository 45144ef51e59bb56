//! 完整控制循环仿真
//!
//! 状态机串联：前进 0.5m → 转向 90° 同时抬臂 → 向前寻线（触发器取消运动）→ 结束。

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use common::{MAX_COUNTS_PER_SEC, SimRobot};
use parking_lot::Mutex;
use wheelbot_sdk::drive::hal::shared_actuator;
use wheelbot_sdk::drive::sim::{SimMotor, SimSensor};
use wheelbot_sdk::prelude::*;
use wheelbot_sdk::tools::MemorySink;

/// 寻线传感器在此前进距离之后看到线
const LINE_AT: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Forward,
    TurnAndLift,
    SeekLine,
    Done,
}

#[test]
fn test_autonomous_sequence() {
    let robot = SimRobot::with_defaults();
    let config = RobotConfig::default();

    // 寻线传感器：由仿真任务根据前进距离给出读数
    let line = SimSensor::new(0.0);
    {
        let base = robot.base.clone();
        let line = line.clone();
        robot.scheduler.register(
            "line_sim",
            Phase::PrePeriodic,
            move |_tick: &Tick| {
                line.set(if base.get_y_position() > LINE_AT { 1.0 } else { 0.0 });
            },
        );
    }
    let trigger =
        AnalogTrigger::from_params("line", config.trigger("line").unwrap(), line.reader()).unwrap();
    assert!(!trigger.is_enabled());
    {
        let drive = robot.drive.clone();
        trigger.set_handler(move |_event: &TriggerEvent<'_>| drive.cancel());
    }
    trigger.attach(&robot.scheduler, Phase::PrePeriodic);

    // 机械臂：执行机构自身位置作为反馈
    let arm_motor = SimMotor::new("arm", robot.clock.shared(), MAX_COUNTS_PER_SEC);
    let arm = PidMotor::with_position_feedback(
        "arm",
        shared_actuator(arm_motor.clone()),
        PidParams::new()
            .with_gains(0.01, 0.0, 0.0)
            .with_tolerance(5.0)
            .with_settling_time(0.1),
        robot.clock.shared(),
    )
    .unwrap();
    arm.attach(&robot.scheduler, Phase::PostPeriodic);

    let drive_done = Event::new("drive_done");
    let arm_done = Event::new("arm_done");
    let mut auto: StateMachine<Step> = StateMachine::new("auto", robot.clock.shared());
    auto.start(Step::Forward);

    let mut visited = Vec::new();
    let mut arrivals = Vec::new();
    for _ in 0..600 {
        robot.period(|_tick: &Tick| {
            if !auto.is_ready() {
                return;
            }
            let Some(step) = auto.get_state() else {
                return;
            };
            if visited.last() != Some(&step) {
                visited.push(step);
                arrivals.push((robot.drive.last_outcome(), robot.base.pose()));
            }

            match step {
                Step::Forward => {
                    robot.drive.set_target(
                        DriveTarget::new().with_y(0.5),
                        TargetMode::Absolute,
                        Some(&drive_done),
                        Some(Duration::from_secs(5)),
                    );
                    auto.wait_for_single_event(&drive_done, Step::TurnAndLift);
                },
                Step::TurnAndLift => {
                    robot.drive.set_target(
                        DriveTarget::new().with_turn(90.0),
                        TargetMode::Absolute,
                        Some(&drive_done),
                        Some(Duration::from_secs(5)),
                    );
                    arm.set_target(300.0, TargetMode::Absolute, Some(&arm_done), None);
                    auto.wait_for_events(Step::SeekLine);
                    auto.add_event(&drive_done);
                    auto.add_event(&arm_done);
                },
                Step::SeekLine => {
                    trigger.set_enabled(true);
                    robot.drive.set_target(
                        DriveTarget::new().with_y(2.0),
                        TargetMode::Relative,
                        Some(&drive_done),
                        Some(Duration::from_secs(10)),
                    );
                    auto.wait_for_single_event(&drive_done, Step::Done);
                },
                Step::Done => {
                    trigger.set_enabled(false);
                    auto.stop();
                },
            }
        });
        if auto.get_state().is_none() {
            break;
        }
    }

    assert_eq!(
        visited,
        vec![Step::Forward, Step::TurnAndLift, Step::SeekLine, Step::Done]
    );

    // 前进到位
    let (outcome, pose) = arrivals[1];
    assert_eq!(outcome, Some(MoveOutcome::TargetReached));
    assert!((pose.y - 0.5).abs() < 0.02, "forward ended at {:?}", pose);

    // 转向到位，机械臂到位
    let (outcome, pose) = arrivals[2];
    assert_eq!(outcome, Some(MoveOutcome::TargetReached));
    assert!((pose.heading - 90.0).abs() < 2.0, "turn ended at {:?}", pose);
    assert_eq!(arm.last_outcome(), Some(MoveOutcome::TargetReached));
    assert!((arm.position() - 300.0).abs() < 10.0);

    // 寻线被触发器取消，而不是走满 2m
    let (outcome, pose) = arrivals[3];
    assert_eq!(outcome, Some(MoveOutcome::Cancelled));
    assert!(pose.y > LINE_AT && pose.y < LINE_AT + 0.2, "seek ended at {:?}", pose);
    assert_eq!(trigger.fire_count(), 1);
    assert_eq!(robot.powers(), (0.0, 0.0));
    assert!(robot.base.owner().is_none());

    // 遥测
    let status = DriveStatus::capture(&robot.drive, &robot.clock);
    assert!(!status.active);
    assert_eq!(status.outcome.as_deref(), Some("cancelled"));
    let mut sink = MemorySink::new();
    status.publish(&mut sink, 2);
    assert!(sink.line(2).unwrap().contains("drive idle (cancelled)"));
    assert!(sink.line(3).unwrap().starts_with("pose:"));
    assert_eq!(sink.lines().len(), 4);
}

#[test]
fn test_timed_out_move_still_signals() {
    let robot = SimRobot::with_defaults();
    // 一条走不完的路
    let done = Event::new("done");
    robot.drive.set_target(
        DriveTarget::new().with_y(100.0),
        TargetMode::Relative,
        Some(&done),
        Some(Duration::from_millis(500)),
    );

    let mut periods = 0;
    while !done.is_signaled() && periods < 100 {
        robot.idle(1);
        periods += 1;
    }

    assert!(done.is_signaled());
    assert_eq!(robot.drive.last_outcome(), Some(MoveOutcome::TimedOut));
    // 周期序号 10（t = 500ms）判定超时
    assert_eq!(periods, 11);
    assert_eq!(robot.powers(), (0.0, 0.0));
}

#[test]
fn test_loop_runner_drives_scheduler() {
    let config = RobotConfig::default();
    let scheduler = Scheduler::new(SystemClock::shared());
    let pre = Arc::new(AtomicU64::new(0));
    let counter = pre.clone();
    scheduler.register("count", Phase::PrePeriodic, move |_tick: &Tick| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    let mut loop_config = config.control_loop.to_loop_config(Some(6));
    loop_config.period = Duration::from_millis(2);
    loop_config.init_periods = 2;
    let mut runner = LoopRunner::new(scheduler.clone(), loop_config).unwrap();

    let modes = Arc::new(Mutex::new(Vec::new()));
    let m = modes.clone();
    let count = runner.run(move |tick: &Tick| m.lock().push(tick.mode), |_tick: &Tick| {});

    assert_eq!(count, 6);
    assert_eq!(pre.load(Ordering::Relaxed), 6);
    assert_eq!(scheduler.dispatch_count(Phase::PostContinuous), 6);
    assert_eq!(
        *modes.lock(),
        vec![
            RunMode::Init,
            RunMode::Init,
            RunMode::Running,
            RunMode::Running,
            RunMode::Running,
            RunMode::Running,
        ]
    );
}
