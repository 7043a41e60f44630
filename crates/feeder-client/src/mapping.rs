//! 坐标 → 舵机角度映射
//!
//! 两种模式，均为纯函数、无失败路径：
//!
//! - **绝对映射**（[`LinearMap`] / [`AbsoluteMapper`]）：画面坐标区间线性插值到角度区间，
//!   超出区间的坐标先钳位；Y 轴方向反转。
//! - **偏移映射**（[`OffsetMapper`]）：嘴部中心相对画面中心的有符号偏移，
//!   除以画面尺寸的三分之一归一化到 `[-1, 1]`，再围绕各舵机中心缩放：
//!   水平舵机随偏移右移而减小，垂直舵机随偏移下移而增大（方向固定，不可配置）。
//!
//! 区间相等（除零）属于配置错误，由 `CalibrationConfig::validate` 在启动时拦截；
//! 这里遇到相等区间时返回 `angle_min`，不会 panic。

use feeder_tools::{CalibrationConfig, CoordinateMap, ServoRange};

/// 线性区间映射
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearMap {
    pub coord_min: i32,
    pub coord_max: i32,
    pub angle_min: i32,
    pub angle_max: i32,
}

impl LinearMap {
    pub const fn new(coord_min: i32, coord_max: i32, angle_min: i32, angle_max: i32) -> Self {
        Self {
            coord_min,
            coord_max,
            angle_min,
            angle_max,
        }
    }

    /// 钳位后线性插值，结果向下取整
    ///
    /// `angle_min + (clamp(coord) - coord_min) * (angle_max - angle_min) / (coord_max - coord_min)`
    pub fn map(&self, coord: i32) -> i32 {
        let span = self.coord_max as i64 - self.coord_min as i64;
        if span <= 0 {
            return self.angle_min;
        }
        let coord = coord.clamp(self.coord_min, self.coord_max) as i64;
        let scaled = (coord - self.coord_min as i64) * (self.angle_max as i64 - self.angle_min as i64);
        self.angle_min + scaled.div_euclid(span) as i32
    }

    /// 方向反转的映射：`angle_max - map(coord) + angle_min`
    pub fn map_inverted(&self, coord: i32) -> i32 {
        self.angle_max - self.map(coord) + self.angle_min
    }
}

/// 绝对坐标映射（画面坐标直接映射为舵机 1、2 的角度）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsoluteMapper {
    x: LinearMap,
    y: LinearMap,
}

impl AbsoluteMapper {
    pub fn new(map: &CoordinateMap) -> Self {
        let (amin, amax) = (map.angle_min as i32, map.angle_max as i32);
        Self {
            x: LinearMap::new(map.x_min, map.x_max, amin, amax),
            y: LinearMap::new(map.y_min, map.y_max, amin, amax),
        }
    }

    /// 计算 `(舵机 1, 舵机 2)` 角度，Y 轴反转
    pub fn angles(&self, center: (i32, i32)) -> (i32, i32) {
        (self.x.map(center.0), self.y.map_inverted(center.1))
    }
}

/// 偏移映射
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetMapper {
    frame_center: (i32, i32),
    max_offset: (i32, i32),
    horizontal: ServoRange,
    vertical: ServoRange,
}

impl OffsetMapper {
    /// 从标定配置构建
    ///
    /// 归一化除数为画面宽、高的三分之一（整数除法，640×480 → 213、160）。
    pub fn new(config: &CalibrationConfig) -> Self {
        Self {
            frame_center: config.frame_center(),
            max_offset: (
                (config.frame.width / 3).max(1) as i32,
                (config.frame.height / 3).max(1) as i32,
            ),
            horizontal: config.servo.horizontal,
            vertical: config.servo.vertical,
        }
    }

    /// 画面中心
    pub fn frame_center(&self) -> (i32, i32) {
        self.frame_center
    }

    /// 嘴部中心相对画面中心的偏移
    ///
    /// 饱和减法：异常关键点换算出的极端坐标只会落到归一化的边界上。
    pub fn offset(&self, center: (i32, i32)) -> (i32, i32) {
        (
            center.0.saturating_sub(self.frame_center.0),
            center.1.saturating_sub(self.frame_center.1),
        )
    }

    /// 偏移归一化到 `[-1, 1]`
    pub fn normalize(&self, offset: (i32, i32)) -> (f64, f64) {
        (
            (offset.0 as f64 / self.max_offset.0 as f64).clamp(-1.0, 1.0),
            (offset.1 as f64 / self.max_offset.1 as f64).clamp(-1.0, 1.0),
        )
    }

    /// 由偏移计算 `(舵机 1, 舵机 2)` 角度
    ///
    /// 结果四舍五入并钳位到各自的 `[min, max]`。
    pub fn angles_for_offset(&self, offset: (i32, i32)) -> (u8, u8) {
        let (nx, ny) = self.normalize(offset);
        let h = scale(self.horizontal, -nx);
        let v = scale(self.vertical, ny);
        (h, v)
    }

    /// 由嘴部中心计算 `(舵机 1, 舵机 2)` 角度
    pub fn angles_for_center(&self, center: (i32, i32)) -> (u8, u8) {
        self.angles_for_offset(self.offset(center))
    }
}

fn scale(range: ServoRange, normalized: f64) -> u8 {
    let half = range.span() as f64 / 2.0;
    let angle = range.center as f64 + normalized * half;
    range.clamp(angle.round() as i32)
}
