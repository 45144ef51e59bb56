//! 控制周期性能基准测试
//!
//! - 空调度器的一个周期
//! - 带底盘位姿、触发器、PID 驱动的完整周期
//! - 单个 PID 计算

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use wheelbot_sdk::drive::hal::shared_actuator;
use wheelbot_sdk::drive::sim::{SimGyro, SimMotor, SimSensor};
use wheelbot_sdk::prelude::*;

const PERIOD: Duration = Duration::from_millis(50);

fn bench_empty_period(c: &mut Criterion) {
    let clock = ManualClock::new();
    let scheduler = Scheduler::new(clock.shared());

    c.bench_function("empty_period", |b| {
        b.iter(|| {
            let tick = scheduler.run_period(RunMode::Running, |_| {}, |_| {});
            clock.advance(PERIOD);
            black_box(tick)
        })
    });
}

fn bench_active_period(c: &mut Criterion) {
    let mut group = c.benchmark_group("active_period");

    for triggers in [0usize, 4, 16] {
        let clock = ManualClock::new();
        let scheduler = Scheduler::new(clock.shared());
        let left = SimMotor::new("left", clock.shared(), 1000.0);
        let right = SimMotor::new("right", clock.shared(), 1000.0);
        let gyro = SimGyro::differential(&left, &right, 0.001, 0.3);
        let base = DriveBase::builder("base", DriveParams::differential(0.001, 0.3))
            .wheel(WheelPosition::LeftFront, shared_actuator(left))
            .wheel(WheelPosition::RightFront, shared_actuator(right))
            .heading_source(gyro)
            .build()
            .unwrap();
        let drive = PidDrive::builder("drive", base.clone(), clock.shared())
            .y_pid(PidParams::new().with_gains(2.0, 0.1, 0.0).with_tolerance(0.01))
            .turn_pid(PidParams::new().with_gains(0.02, 0.0, 0.0).with_tolerance(1.0))
            .build()
            .unwrap();
        base.attach(&scheduler, Phase::PrePeriodic);
        drive.attach(&scheduler, Phase::PostPeriodic);

        let sensor = SimSensor::new(0.0);
        for i in 0..triggers {
            let trigger =
                AnalogTrigger::new(format!("t{}", i), &[0.25, 0.5, 0.75], sensor.reader()).unwrap();
            trigger.set_enabled(true);
            trigger.attach(&scheduler, Phase::PrePeriodic);
        }

        // 目标足够远，基准测试期间运动一直进行
        drive.set_target(
            DriveTarget::new().with_y(1.0e6).with_turn(45.0),
            TargetMode::Absolute,
            None,
            None,
        );

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}triggers", triggers)),
            &triggers,
            |b, _| {
                let mut value = 0.0;
                b.iter(|| {
                    value = (value + 0.1) % 1.0;
                    sensor.set(value);
                    let tick = scheduler.run_period(RunMode::Running, |_| {}, |_| {});
                    clock.advance(PERIOD);
                    black_box(tick)
                })
            },
        );
    }

    group.finish();
}

fn bench_pid_compute(c: &mut Criterion) {
    let clock = ManualClock::new();
    let sensor = SimSensor::new(0.0);
    let params = PidParams::new().with_gains(1.0, 0.5, 0.1).with_tolerance(0.01);
    let mut pid = PidController::new("bench", params, clock.shared(), sensor.reader()).unwrap();
    pid.set_target(10.0, TargetMode::Absolute);

    c.bench_function("pid_compute", |b| {
        b.iter(|| {
            clock.advance(PERIOD);
            black_box(pid.compute())
        })
    });
}

criterion_group!(
    benches,
    bench_empty_period,
    bench_active_period,
    bench_pid_compute
);
criterion_main!(benches);
