//! # Wheelbot Sim
//!
//! 在桌面上运行完整控制栈：仿真底盘 + 自主程序。
//!
//! ```bash
//! # 以仿真时间尽快运行（默认）
//! wheelbot-sim run
//!
//! # 按真实周期运行，Ctrl-C 停止
//! wheelbot-sim run --realtime --config robot.toml
//!
//! # JSON 遥测输出
//! wheelbot-sim run --json --status-every 5
//!
//! # 导出默认配置
//! wheelbot-sim config > robot.toml
//! ```

mod robot;

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use wheelbot_sdk::prelude::*;
use wheelbot_sdk::tools::TracingSink;

use robot::SimRobot;

/// Wheelbot 仿真器
#[derive(Parser, Debug)]
#[command(name = "wheelbot-sim")]
#[command(about = "Run the wheelbot motion-control stack against simulated hardware", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行自主程序
    Run {
        /// 机器人配置文件（TOML，缺省使用内置默认配置）
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// 最大周期数
        #[arg(long, default_value_t = 600)]
        periods: u64,

        /// 按真实时间运行（否则以仿真时间尽快运行）
        #[arg(long)]
        realtime: bool,

        /// 每隔多少个周期输出一次状态（0 表示不输出）
        #[arg(long, default_value_t = 10)]
        status_every: u64,

        /// 以 JSON 行输出状态
        #[arg(long)]
        json: bool,
    },

    /// 输出默认配置
    Config {
        /// 写入文件而不是标准输出
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    wheelbot_sdk::logging::init_logger();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            periods,
            realtime,
            status_every,
            json,
        } => {
            let config = match config {
                Some(path) => RobotConfig::load_from_file(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => RobotConfig::default(),
            };
            let reporter = Reporter {
                every: status_every,
                json,
            };
            if realtime {
                run_realtime(&config, periods, reporter)
            } else {
                run_simulated(&config, periods, reporter)
            }
        },

        Commands::Config { output } => {
            let config = RobotConfig::default();
            match output {
                Some(path) => {
                    config.save_to_file(&path)?;
                    info!("Default config written to {}", path.display());
                },
                None => print!("{}", config.to_toml_string()?),
            }
            Ok(())
        },
    }
}

/// 周期性状态输出
#[derive(Debug, Clone, Copy)]
struct Reporter {
    every: u64,
    json: bool,
}

impl Reporter {
    fn report(&self, tick: &Tick, drive: &PidDrive, clock: &dyn Clock) {
        if self.every == 0 || tick.index % self.every != 0 {
            return;
        }
        let status = DriveStatus::capture(drive, clock);
        if self.json {
            match serde_json::to_string(&status) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to encode status: {}", e),
            }
        } else {
            status.publish(&mut TracingSink, 0);
        }
    }
}

/// 以 ManualClock 运行：每周期推进一个控制周期的仿真时间
fn run_simulated(config: &RobotConfig, periods: u64, reporter: Reporter) -> Result<()> {
    let clock = ManualClock::new();
    let mut robot = SimRobot::build(config, clock.shared())?;
    let loop_config = config.control_loop.to_loop_config(Some(periods));
    loop_config.validate()?;

    let mut count = 0;
    while count < periods && !robot.is_finished() {
        let mode = if count < loop_config.init_periods {
            RunMode::Init
        } else {
            RunMode::Running
        };
        let scheduler = robot.scheduler.clone();
        let drive = robot.drive.clone();
        scheduler.run_period(
            mode,
            |tick| robot.periodic(tick),
            |tick| reporter.report(tick, &drive, &clock),
        );
        clock.advance(loop_config.period);
        count += 1;
    }

    summarize(&robot, count);
    Ok(())
}

/// 以 SystemClock + LoopRunner 按真实周期运行
fn run_realtime(config: &RobotConfig, periods: u64, reporter: Reporter) -> Result<()> {
    let clock = SystemClock::shared();
    let mut robot = SimRobot::build(config, clock.clone())?;
    let mut runner = LoopRunner::new(
        robot.scheduler.clone(),
        config.control_loop.to_loop_config(Some(periods)),
    )?;

    let stop = runner.stop_handle();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nReceived interrupt signal. Stopping...");
            stop.store(true, Ordering::Relaxed);
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    let drive = robot.drive.clone();
    let count = runner.run(
        |tick| {
            robot.periodic(tick);
            if robot.is_finished() {
                stop.store(true, Ordering::Relaxed);
            }
        },
        |tick| reporter.report(tick, &drive, clock.as_ref()),
    );

    if runner.late_periods() > 0 {
        warn!("{} periods overran their deadline", runner.late_periods());
    }
    summarize(&robot, count);
    Ok(())
}

fn summarize(robot: &SimRobot, periods: u64) {
    let pose = robot.drive.base().pose();
    info!(
        "Ran {} periods: outcome {}, pose x={:.3} y={:.3} heading={:.1}",
        periods,
        robot
            .drive
            .last_outcome()
            .map_or("none", MoveOutcome::as_str),
        pose.x,
        pose.y,
        pose.heading
    );
}
