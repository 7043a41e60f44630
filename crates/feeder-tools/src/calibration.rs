//! # 标定配置
//!
//! 机械臂的全部标定数据：画面尺寸、舵机可动范围、静止姿态、绝对坐标映射、
//! 动作时序、跟踪参数与串口链路参数。
//!
//! 配置只在启动时加载并校验一次；校验失败是唯一的致命错误类别。
//!
//! 配置文件路径（CLI 约定）：
//! - Linux/macOS: `~/.config/feeder/calibration.toml`
//! - Windows: `%APPDATA%\feeder\calibration.toml`

use feeder_protocol::{DEFAULT_BAUD_RATE, MAX_ANGLE, ServoId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid TOML in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid calibration `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 标定配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CalibrationConfig {
    /// 画面尺寸
    pub frame: FrameConfig,

    /// 舵机 1、2 的可动范围
    pub servo: ServoRanges,

    /// 静止与喂食姿态
    pub pose: PoseConfig,

    /// 绝对坐标映射（画面坐标 → 舵机角度）
    pub coordinate_map: CoordinateMap,

    /// 动作时序
    pub timing: TimingConfig,

    /// 动态跟踪参数
    pub tracking: TrackingConfig,

    /// 串口链路参数
    pub link: LinkConfig,
}

impl CalibrationConfig {
    /// 从 TOML 文本解析并校验
    ///
    /// # 错误
    /// - `ConfigError::Parse`: TOML 语法或字段类型错误
    /// - `ConfigError::Invalid`: 标定数据自相矛盾
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            origin: "<string>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    ///
    /// 缺失的字段取默认值。
    ///
    /// # 错误
    /// - `ConfigError::Read`: 文件不可读
    /// - `ConfigError::Parse` / `ConfigError::Invalid`: 见 [`from_toml_str`](Self::from_toml_str)
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            origin: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 文件存在则加载，否则返回默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// 保存为 TOML（自动创建父目录）
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;

        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, content).map_err(write_err)
    }

    /// 校验标定数据
    ///
    /// # 错误
    /// - `ConfigError::Invalid`: 画面尺寸为零、范围相等或倒置、中心越界、角度超过 180、
    ///   时序非法、跟踪周期为零、波特率为零
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(ConfigError::invalid(
                "frame",
                format!("size must be non-zero, got {}x{}", self.frame.width, self.frame.height),
            ));
        }

        self.servo.horizontal.validate("servo.horizontal")?;
        self.servo.vertical.validate("servo.vertical")?;
        self.pose.validate()?;
        self.coordinate_map.validate()?;
        self.timing.validate()?;

        if self.tracking.period_ms == 0 {
            return Err(ConfigError::invalid("tracking.period_ms", "must be non-zero"));
        }
        if self.link.baud_rate == 0 {
            return Err(ConfigError::invalid("link.baud_rate", "must be non-zero"));
        }
        Ok(())
    }

    /// 舵机的可动范围（只有舵机 1、2 由映射驱动）
    pub fn range_for(&self, id: ServoId) -> Option<ServoRange> {
        match id {
            ServoId::Horizontal => Some(self.servo.horizontal),
            ServoId::Vertical => Some(self.servo.vertical),
            ServoId::Wrist | ServoId::Feeder => None,
        }
    }

    /// 画面几何中心
    pub fn frame_center(&self) -> (i32, i32) {
        (
            (self.frame.width / 2) as i32,
            (self.frame.height / 2) as i32,
        )
    }
}

/// 画面尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

/// 单个舵机的可动范围（度）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoRange {
    pub min: u8,
    pub max: u8,
    pub center: u8,
}

impl ServoRange {
    pub const fn new(min: u8, max: u8, center: u8) -> Self {
        Self { min, max, center }
    }

    /// 范围跨度（度）
    #[inline]
    pub fn span(&self) -> u8 {
        self.max.saturating_sub(self.min)
    }

    /// 是否在范围内（含端点）
    #[inline]
    pub fn contains(&self, angle: i32) -> bool {
        (self.min as i32..=self.max as i32).contains(&angle)
    }

    /// 钳位到范围内
    #[inline]
    pub fn clamp(&self, angle: i32) -> u8 {
        angle.clamp(self.min as i32, self.max as i32) as u8
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.min >= self.max {
            return Err(ConfigError::invalid(
                field,
                format!("min ({}) must be below max ({})", self.min, self.max),
            ));
        }
        if self.max > MAX_ANGLE {
            return Err(ConfigError::invalid(
                field,
                format!("max ({}) exceeds {}", self.max, MAX_ANGLE),
            ));
        }
        if !self.contains(self.center as i32) {
            return Err(ConfigError::invalid(
                field,
                format!(
                    "center ({}) outside [{}, {}]",
                    self.center, self.min, self.max
                ),
            ));
        }
        Ok(())
    }
}

/// 舵机 1、2 的可动范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoRanges {
    /// 水平舵机（ID 1）
    pub horizontal: ServoRange,
    /// 垂直舵机（ID 2）
    pub vertical: ServoRange,
}

impl Default for ServoRanges {
    fn default() -> Self {
        Self {
            horizontal: ServoRange::new(90, 150, 120),
            vertical: ServoRange::new(20, 60, 45),
        }
    }
}

/// 姿态配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// 静止（初始化）角度，按 ID 1-4
    pub rest: [u8; 4],
    /// 动态跟踪时腕部舵机（ID 3）的待喂角度
    pub wrist_feed_ready: u8,
    /// 喂食舵机（ID 4）的喂食角度
    pub feed_angle: u8,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            rest: [120, 45, 90, 90],
            wrist_feed_ready: 60,
            feed_angle: 0,
        }
    }
}

impl PoseConfig {
    /// 舵机的静止角度
    #[inline]
    pub fn rest_angle(&self, id: ServoId) -> u8 {
        self.rest[id.index()]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for id in ServoId::ALL {
            let angle = self.rest_angle(id);
            if angle > MAX_ANGLE {
                return Err(ConfigError::invalid(
                    format!("pose.rest[{}]", id.index()),
                    format!("angle {} exceeds {}", angle, MAX_ANGLE),
                ));
            }
        }
        if self.wrist_feed_ready > MAX_ANGLE {
            return Err(ConfigError::invalid(
                "pose.wrist_feed_ready",
                format!("angle {} exceeds {}", self.wrist_feed_ready, MAX_ANGLE),
            ));
        }
        if self.feed_angle > MAX_ANGLE {
            return Err(ConfigError::invalid(
                "pose.feed_angle",
                format!("angle {} exceeds {}", self.feed_angle, MAX_ANGLE),
            ));
        }
        Ok(())
    }
}

/// 绝对坐标映射
///
/// 画面坐标区间线性映射到舵机角度区间；Y 轴方向反转（画面下方对应较小角度）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinateMap {
    pub x_min: i32,
    pub x_max: i32,
    pub y_min: i32,
    pub y_max: i32,
    pub angle_min: u8,
    pub angle_max: u8,
}

impl Default for CoordinateMap {
    fn default() -> Self {
        Self {
            x_min: 100,
            x_max: 540,
            y_min: 100,
            y_max: 380,
            angle_min: 0,
            angle_max: 180,
        }
    }
}

impl CoordinateMap {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.x_min >= self.x_max {
            return Err(ConfigError::invalid(
                "coordinate_map.x",
                format!("x_min ({}) must be below x_max ({})", self.x_min, self.x_max),
            ));
        }
        if self.y_min >= self.y_max {
            return Err(ConfigError::invalid(
                "coordinate_map.y",
                format!("y_min ({}) must be below y_max ({})", self.y_min, self.y_max),
            ));
        }
        if self.angle_min > self.angle_max || self.angle_max > MAX_ANGLE {
            return Err(ConfigError::invalid(
                "coordinate_map.angle",
                format!(
                    "angle range [{}, {}] must be ordered and within [0, {}]",
                    self.angle_min, self.angle_max, MAX_ANGLE
                ),
            ));
        }
        Ok(())
    }
}

/// 动作时序（秒）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// 单次喂食：舵机 1 到位后的等待
    pub horizontal_settle_s: f64,
    /// 单次喂食：舵机 2 到位后的等待
    pub vertical_settle_s: f64,
    /// 单次喂食：驱动喂食舵机前的等待
    pub feed_delay_s: f64,
    /// 初始化 / 复位序列中相邻指令的间隔
    pub reset_step_s: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            horizontal_settle_s: 0.5,
            vertical_settle_s: 0.5,
            feed_delay_s: 1.0,
            reset_step_s: 0.3,
        }
    }
}

impl TimingConfig {
    pub fn horizontal_settle(&self) -> Duration {
        secs(self.horizontal_settle_s)
    }

    pub fn vertical_settle(&self) -> Duration {
        secs(self.vertical_settle_s)
    }

    pub fn feed_delay(&self) -> Duration {
        secs(self.feed_delay_s)
    }

    pub fn reset_step(&self) -> Duration {
        secs(self.reset_step_s)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("timing.horizontal_settle_s", self.horizontal_settle_s),
            ("timing.vertical_settle_s", self.vertical_settle_s),
            ("timing.feed_delay_s", self.feed_delay_s),
            ("timing.reset_step_s", self.reset_step_s),
        ];
        for (field, value) in fields {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be a representable non-negative number of seconds, got {}", value),
                ));
            }
        }
        Ok(())
    }
}

/// 已校验的秒数转换；未经 `validate` 的非法值退化为零等待
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// 动态跟踪参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// 循环周期（毫秒）
    pub period_ms: u64,
    /// 角度变化阈值（度），小于该值不发送
    pub threshold_deg: u8,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            period_ms: 100,
            threshold_deg: 2,
        }
    }
}

impl TrackingConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// 探索性调用（手动设置、绝对瞄准）的默认应答窗口
pub const DEFAULT_EXPLORATORY_ACK: Duration = Duration::from_millis(500);

/// 控制器序列（初始化、喂食、跟踪、复位）的默认应答窗口
pub const DEFAULT_CONTROLLER_ACK: Duration = Duration::from_millis(1000);

/// 串口链路参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// 默认端口
    pub port: String,
    /// 波特率
    pub baud_rate: u32,
    /// 探索性调用（手动设置）的应答窗口（毫秒）
    pub exploratory_ack_ms: u64,
    /// 控制器序列的应答窗口（毫秒）
    pub controller_ack_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: default_port().to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            exploratory_ack_ms: DEFAULT_EXPLORATORY_ACK.as_millis() as u64,
            controller_ack_ms: DEFAULT_CONTROLLER_ACK.as_millis() as u64,
        }
    }
}

impl LinkConfig {
    pub fn exploratory_ack(&self) -> Duration {
        Duration::from_millis(self.exploratory_ack_ms)
    }

    pub fn controller_ack(&self) -> Duration {
        Duration::from_millis(self.controller_ack_ms)
    }
}

fn default_port() -> &'static str {
    if cfg!(windows) { "COM3" } else { "/dev/ttyUSB0" }
}
