//! 配置管理命令
//!
//! 管理 CLI 配置（默认串口、波特率）与标定文件。
//! 两个文件都位于平台配置目录下的 `feeder/`。

use anyhow::{Context, Result};
use clap::Subcommand;
use feeder_sdk::CalibrationConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// 配置目录
fn config_dir() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;

    path.push("feeder");
    Ok(path)
}

fn config_file() -> Result<PathBuf> {
    let mut path = config_dir()?;
    path.push("cli.toml");
    Ok(path)
}

/// 标定文件路径（命令行参数优先）
pub fn calibration_path(overridden: Option<&Path>) -> Result<PathBuf> {
    match overridden {
        Some(path) => Ok(path.to_path_buf()),
        None => {
            let mut path = config_dir()?;
            path.push("calibration.toml");
            Ok(path)
        },
    }
}

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 默认串口
    pub port: Option<String>,

    /// 默认波特率
    pub baud_rate: Option<u32>,

    /// Shell 连接后是否自动初始化舵机
    pub auto_init: Option<bool>,
}

impl CliConfig {
    /// 加载配置（文件不存在时返回默认值）
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("读取配置文件失败")?;
        toml::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    /// 保存配置
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file()?)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("创建配置目录失败")?;
        }

        let body = toml::to_string_pretty(self).context("序列化配置失败")?;
        let content = format!("# Feeder CLI Configuration\n\n{}", body);
        fs::write(path, content).context("写入配置文件失败")?;

        Ok(())
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 默认串口（如 /dev/ttyUSB0, COM3）
        #[arg(short, long)]
        port: Option<String>,

        /// 默认波特率
        #[arg(short, long)]
        baud: Option<u32>,

        /// Shell 连接后是否自动初始化舵机
        #[arg(long)]
        auto_init: Option<bool>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称（port / baud / auto_init / all）
        #[arg(default_value = "all")]
        key: String,
    },

    /// 检查配置与标定文件
    Check,

    /// 写出默认标定文件
    Calibration {
        /// 覆盖已有文件
        #[arg(long)]
        reset: bool,
    },
}

impl ConfigCommand {
    pub fn execute(self, calibration: Option<&Path>) -> Result<()> {
        match self {
            ConfigCommand::Set {
                port,
                baud,
                auto_init,
            } => Self::set_(port, baud, auto_init),

            ConfigCommand::Get { key } => Self::get_(&key),

            ConfigCommand::Check => Self::check_(calibration),

            ConfigCommand::Calibration { reset } => Self::calibration_(calibration, reset),
        }
    }

    fn set_(port: Option<String>, baud: Option<u32>, auto_init: Option<bool>) -> Result<()> {
        let mut config = CliConfig::load()?;

        if let Some(ref port) = port {
            config.port = Some(port.clone());
            println!("✅ 设置默认串口: {}", port);
        }

        if let Some(baud) = baud {
            anyhow::ensure!(baud > 0, "波特率必须大于 0");
            config.baud_rate = Some(baud);
            println!("✅ 设置默认波特率: {}", baud);
        }

        if let Some(auto_init) = auto_init {
            config.auto_init = Some(auto_init);
            println!("✅ 设置自动初始化: {}", auto_init);
        }

        config.save()?;
        Ok(())
    }

    fn get_(key: &str) -> Result<()> {
        let config = CliConfig::load()?;
        let show = |value: Option<String>| value.unwrap_or_else(|| "(未设置)".to_string());

        match key {
            "port" => println!("{}", show(config.port)),

            "baud" => println!("{}", show(config.baud_rate.map(|b| b.to_string()))),

            "auto_init" => println!("{}", show(config.auto_init.map(|b| b.to_string()))),

            _ => {
                println!("Feeder CLI 配置:");
                println!("  串口: {:?}", config.port);
                println!("  波特率: {:?}", config.baud_rate);
                println!("  自动初始化: {:?}", config.auto_init);
            },
        }

        Ok(())
    }

    fn check_(calibration: Option<&Path>) -> Result<()> {
        let config = CliConfig::load()?;
        println!("配置文件: {}", config_file()?.display());
        println!("  串口: {:?}", config.port);
        println!("  波特率: {:?}", config.baud_rate);

        let path = calibration_path(calibration)?;
        let calibration = CalibrationConfig::load_or_default(&path)
            .with_context(|| format!("标定文件无效: {}", path.display()))?;

        println!("标定文件: {}", path.display());
        if !path.exists() {
            println!("  (不存在，使用默认值)");
        }
        println!(
            "  画面: {}x{}",
            calibration.frame.width, calibration.frame.height
        );
        println!(
            "  舵机 1: {}-{} 中心 {}",
            calibration.servo.horizontal.min,
            calibration.servo.horizontal.max,
            calibration.servo.horizontal.center
        );
        println!(
            "  舵机 2: {}-{} 中心 {}",
            calibration.servo.vertical.min,
            calibration.servo.vertical.max,
            calibration.servo.vertical.center
        );
        println!("  静止姿态: {:?}", calibration.pose.rest);
        println!("✅ 标定有效");

        Ok(())
    }

    fn calibration_(calibration: Option<&Path>, reset: bool) -> Result<()> {
        let path = calibration_path(calibration)?;

        if path.exists() && !reset {
            println!("⚠️  标定文件已存在: {}（使用 --reset 覆盖）", path.display());
            return Ok(());
        }

        CalibrationConfig::default().save_to_file(&path)?;
        println!("✅ 已写出默认标定: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cli.toml");

        let config = CliConfig {
            port: Some("/dev/ttyACM0".to_string()),
            baud_rate: Some(9600),
            auto_init: Some(false),
        };
        config.save_to(&path).unwrap();

        assert_eq!(CliConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_cli_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_calibration_path_override() {
        let path = calibration_path(Some(Path::new("/tmp/cal.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/cal.toml"));
    }
}
