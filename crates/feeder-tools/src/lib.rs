//! # Feeder Tools - 共享配置数据
//!
//! **依赖原则**: 只依赖 `feeder-protocol`，避免依赖 `feeder-client` / `feeder-driver`
//!
//! ## 包含模块
//!
//! - `calibration` - 标定配置（舵机范围、静止姿态、坐标映射、时序、链路参数）
//!
//! ## 使用示例
//!
//! ```rust
//! use feeder_tools::CalibrationConfig;
//!
//! let config = CalibrationConfig::default();
//! config.validate().unwrap();
//! assert_eq!(config.servo.horizontal.center, 120);
//! ```

pub mod calibration;

// 重新导出常用类型
pub use calibration::{
    CalibrationConfig, ConfigError, CoordinateMap, DEFAULT_CONTROLLER_ACK, DEFAULT_EXPLORATORY_ACK,
    FrameConfig, LinkConfig, PoseConfig, ServoRange, ServoRanges, TimingConfig, TrackingConfig,
};
