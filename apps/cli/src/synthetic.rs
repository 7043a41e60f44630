//! 合成检测源
//!
//! 没有相机与推理模型时，用一个可移动的"嘴部目标"驱动检测线程：
//! 相机按固定帧率产出空白帧，推理在目标周围生成唇部关键点。
//! 目标为 `None` 时不返回人脸（未检测到）。

use feeder_sdk::driver::{
    FaceLandmarks, Frame, FrameSource, LandmarkDetector, MOUTH_LANDMARK_INDICES, NormalizedPoint,
    VisionError,
};
use parking_lot::Mutex;
use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

/// 面部网格关键点数
const FACE_MESH_POINTS: usize = 468;

/// 合成帧间隔（约 30 fps）
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// 唇部椭圆半轴（像素）
const LIP_RADIUS: (f32, f32) = (24.0, 12.0);

/// 可在运行时移动的嘴部目标（像素坐标）
#[derive(Debug, Clone, Default)]
pub struct SyntheticTarget {
    inner: Arc<Mutex<Option<(i32, i32)>>>,
}

impl SyntheticTarget {
    pub fn new(initial: Option<(i32, i32)>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    /// 移动目标（`None` 表示画面中没有人脸）
    pub fn set(&self, target: Option<(i32, i32)>) {
        *self.inner.lock() = target;
    }

    pub fn get(&self) -> Option<(i32, i32)> {
        *self.inner.lock()
    }
}

/// 合成相机
pub struct SyntheticCamera {
    width: u32,
    height: u32,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FrameSource for SyntheticCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>, VisionError> {
        std::thread::sleep(FRAME_INTERVAL);
        Ok(Some(Frame::blank(self.width, self.height)))
    }
}

/// 合成关键点推理
pub struct SyntheticDetector {
    target: SyntheticTarget,
}

impl SyntheticDetector {
    pub fn new(target: SyntheticTarget) -> Self {
        Self { target }
    }
}

impl LandmarkDetector for SyntheticDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceLandmarks>, VisionError> {
        let Some((x, y)) = self.target.get() else {
            return Ok(Vec::new());
        };
        if frame.width == 0 || frame.height == 0 {
            return Err(VisionError::Inference("empty frame".to_string()));
        }

        let (w, h) = (frame.width as f32, frame.height as f32);
        let mut face = vec![NormalizedPoint::new(x as f32 / w, y as f32 / h); FACE_MESH_POINTS];

        // 唇部关键点均匀分布在以目标为中心的椭圆上，均值即目标
        let n = MOUTH_LANDMARK_INDICES.len() as f32;
        for (k, &index) in MOUTH_LANDMARK_INDICES.iter().enumerate() {
            let theta = TAU * k as f32 / n;
            face[index] = NormalizedPoint::new(
                (x as f32 + LIP_RADIUS.0 * theta.cos()) / w,
                (y as f32 + LIP_RADIUS.1 * theta.sin()) / h,
            );
        }
        Ok(vec![face])
    }
}
