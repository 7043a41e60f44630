//! # Feeder CLI
//!
//! Command-line interface for the visual-servo feeding arm.
//!
//! ## 双模式架构
//!
//! ### One-shot 模式（推荐用于脚本）
//!
//! ```bash
//! # 配置默认串口
//! feeder-cli config set --port /dev/ttyUSB0 --baud 115200
//!
//! # 执行操作（内部：连接 -> 执行 -> 断开）
//! feeder-cli init
//! feeder-cli set 3 60
//! feeder-cli --simulate feed --target 420,240
//! ```
//!
//! ### REPL 模式（推荐用于调试）
//!
//! ```bash
//! $ feeder-cli shell
//! feeder> connect /dev/ttyUSB0
//! feeder> target 420,240
//! feeder> track
//! feeder> stop
//! feeder> exit
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod modes;
mod synthetic;
mod validation;

use commands::ConfigCommand;
use modes::oneshot::{OneShotMode, SessionOptions};
use modes::repl::run_repl;

/// Feeder CLI - 喂食机械臂命令行工具
#[derive(Parser, Debug)]
#[command(name = "feeder-cli")]
#[command(about = "Command-line interface for the visual-servo feeding arm", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,

    #[command(subcommand)]
    command: Commands,
}

/// 连接参数（覆盖配置文件）
#[derive(Args, Debug, Clone)]
struct SessionArgs {
    /// 串口路径
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// 波特率
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// 标定文件路径（默认 <config_dir>/feeder/calibration.toml）
    #[arg(long, global = true)]
    calibration: Option<PathBuf>,

    /// 使用模拟下位机代替真实串口
    #[arg(long, global = true)]
    simulate: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 列出可用串口
    Ports,

    /// 测试串口能否打开（不发送数据）
    Probe,

    /// 全部舵机回到静止姿态
    Init,

    /// 手动设置单个舵机
    Set {
        /// 舵机 ID（1-4）
        #[arg(allow_negative_numbers = true)]
        servo_id: i64,

        /// 角度（0-180）
        #[arg(allow_negative_numbers = true)]
        angle: i64,
    },

    /// 单次喂食
    Feed {
        /// 合成检测目标（像素坐标 X,Y）
        #[arg(short, long)]
        target: Option<String>,
    },

    /// 动态跟踪（Ctrl+C 停止并复位）
    Track {
        /// 合成检测目标（像素坐标 X,Y）
        #[arg(short, long)]
        target: Option<String>,

        /// 跟踪时长（秒），不指定则直到 Ctrl+C
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// 按绝对坐标映射瞄准检测位置
    Aim {
        /// 合成检测目标（像素坐标 X,Y）
        #[arg(short, long)]
        target: Option<String>,
    },

    /// 停止喂食并复位
    Stop,

    /// 启动交互式 Shell（REPL 模式）
    Shell {
        /// 连接后不自动初始化舵机
        #[arg(long)]
        no_auto_init: bool,
    },
}

impl SessionArgs {
    fn into_options(self, target: Option<String>) -> Result<SessionOptions> {
        Ok(SessionOptions {
            port: self.port,
            baud_rate: self.baud,
            calibration: self.calibration,
            simulate: self.simulate,
            target: target.as_deref().map(validation::parse_target).transpose()?,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    feeder_sdk::init_logger_with("feeder_cli=info,info");

    let cli = Cli::parse();
    let session = cli.session;

    match cli.command {
        Commands::Config(cmd) => {
            // One-shot 模式：配置管理
            cmd.execute(session.calibration.as_deref())
        },

        Commands::Ports => modes::oneshot::list_ports(),

        Commands::Probe => {
            let options = session.into_options(None)?;
            modes::oneshot::probe(&options)
        },

        Commands::Init => {
            let mode = OneShotMode::new(session.into_options(None)?)?;
            mode.init()
        },

        Commands::Set { servo_id, angle } => {
            let mode = OneShotMode::new(session.into_options(None)?)?;
            mode.set(servo_id, angle)
        },

        Commands::Feed { target } => {
            let mode = OneShotMode::new(session.into_options(target)?)?;
            mode.feed()
        },

        Commands::Track { target, duration } => {
            let duration = duration.map(validation::parse_duration).transpose()?;
            let mode = OneShotMode::new(session.into_options(target)?)?;
            mode.track(duration)
        },

        Commands::Aim { target } => {
            let mode = OneShotMode::new(session.into_options(target)?)?;
            mode.aim()
        },

        Commands::Stop => {
            let mode = OneShotMode::new(session.into_options(None)?)?;
            mode.stop()
        },

        Commands::Shell { no_auto_init } => {
            // REPL 模式：交互式 Shell
            run_repl(session.into_options(None)?, !no_auto_init).await
        },
    }
}
