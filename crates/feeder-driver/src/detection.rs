//! 检测线程（DetectionWorker）
//!
//! 专用线程持续执行：取帧 → 关键点推理 → 计算嘴部中心 → 发布快照。
//! 取帧与推理都可能很慢，因此与指令发送线程完全隔离。
//!
//! # 人脸策略
//!
//! 推理能力可能返回多张人脸，**只使用第一张**，其余忽略。
//!
//! # 生命周期
//!
//! - 相机流结束或取帧失败：记录日志并停止线程
//! - 推理失败：本帧视为未检测到（`detected = false`），继续下一帧
//! - `stop()` / drop：设置停止标志并 join 线程，随后释放相机

use crate::error::VisionError;
use crate::sink::SharedLogSink;
use crate::state::{DetectionStateStore, FeatureDetection};
use crate::thread::JoinTimeout;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, warn};

/// 嘴部区域关键点下标（面部网格的唇部轮廓，共 40 个）
pub const MOUTH_LANDMARK_INDICES: [usize; 40] = [
    0, 13, 14, 17, 37, 39, 40, 61, 78, 80, 81, 82, 84, 87, 88, 91, 95, 146, 178, 181, 185, 191,
    267, 269, 270, 291, 308, 310, 311, 312, 314, 317, 318, 321, 324, 375, 402, 405, 409, 415,
];

/// 停止时等待线程退出的上限
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// RGB 图像帧
#[derive(Debug, Clone)]
pub struct Frame {
    /// 宽（像素）
    pub width: u32,
    /// 高（像素）
    pub height: u32,
    /// RGB8 像素数据，行优先；合成源可以为空
    pub data: Vec<u8>,
}

impl Frame {
    /// 创建不携带像素数据的帧（合成源、测试）
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: Vec::new(),
        }
    }
}

/// 归一化关键点坐标（0..1）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 转换为像素坐标（截断取整）
    #[inline]
    pub fn to_pixel(self, width: u32, height: u32) -> (i32, i32) {
        ((self.x * width as f32) as i32, (self.y * height as f32) as i32)
    }
}

/// 单张人脸的完整关键点网格，按关键点编号索引
pub type FaceLandmarks = Vec<NormalizedPoint>;

/// 相机能力
pub trait FrameSource: Send {
    /// 阻塞直到下一帧可用
    ///
    /// 返回 `Ok(None)` 表示流已结束。
    fn next_frame(&mut self) -> Result<Option<Frame>, VisionError>;

    /// 释放相机资源（线程退出时调用一次）
    fn release(&mut self) {}
}

/// 关键点推理能力
pub trait LandmarkDetector: Send {
    /// 返回帧中检测到的人脸（可能为空）
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceLandmarks>, VisionError>;
}

/// 从推理结果中提取嘴部中心与关键点（像素）
///
/// 只看第一张人脸；网格中缺失的下标被跳过；没有可用关键点时返回 `None`。
/// 中心是关键点的算术平均，向零截断。
pub fn extract_mouth(
    faces: &[FaceLandmarks],
    width: u32,
    height: u32,
) -> Option<((i32, i32), Vec<(i32, i32)>)> {
    let face = faces.first()?;

    let points: Vec<(i32, i32)> = MOUTH_LANDMARK_INDICES
        .iter()
        .filter_map(|&idx| face.get(idx))
        .map(|p| p.to_pixel(width, height))
        .collect();

    let center = compute_center(&points)?;
    Some((center, points))
}

/// 关键点的算术平均中心（向零截断），空集返回 `None`
pub fn compute_center(points: &[(i32, i32)]) -> Option<(i32, i32)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as i64;
    let (sx, sy) = points.iter().fold((0i64, 0i64), |(sx, sy), &(x, y)| {
        (sx + x as i64, sy + y as i64)
    });
    Some(((sx / n) as i32, (sy / n) as i32))
}

/// 检测线程句柄
pub struct DetectionWorker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DetectionWorker {
    /// 启动检测线程
    ///
    /// # 参数
    /// - `source`: 相机能力
    /// - `detector`: 关键点推理能力
    /// - `store`: 发布目标
    /// - `sink`: 日志汇
    ///
    /// # 错误
    /// - 线程创建失败
    pub fn spawn(
        source: Box<dyn FrameSource>,
        detector: Box<dyn LandmarkDetector>,
        store: Arc<DetectionStateStore>,
        sink: SharedLogSink,
    ) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = std::thread::Builder::new()
            .name("feeder-detect".to_string())
            .spawn(move || detection_loop(source, detector, store, sink, running_clone))?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// 线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 停止线程并等待退出（幂等）
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && let Err(_e) = handle.join_timeout(STOP_JOIN_TIMEOUT)
        {
            error!(
                "Detection thread panicked or failed to shut down within {:?}",
                STOP_JOIN_TIMEOUT
            );
        }
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn detection_loop(
    mut source: Box<dyn FrameSource>,
    mut detector: Box<dyn LandmarkDetector>,
    store: Arc<DetectionStateStore>,
    sink: SharedLogSink,
    running: Arc<AtomicBool>,
) {
    let mut last = store.snapshot();
    let mut frame_index = last.frame_index;
    debug!("Detection thread started");

    while running.load(Ordering::Acquire) {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                sink.info("Camera stream ended, detection stopped");
                break;
            },
            Err(e) => {
                sink.error(&format!("Cannot read from camera: {}", e));
                break;
            },
        };

        frame_index += 1;

        let mouth = match detector.detect(&frame) {
            Ok(faces) => extract_mouth(&faces, frame.width, frame.height),
            Err(e) => {
                warn!("Landmark inference failed on frame {}: {}", frame_index, e);
                None
            },
        };

        let record = match mouth {
            Some((center, points)) => FeatureDetection::found(center, points, frame_index),
            None => FeatureDetection::missed(&last, frame_index),
        };
        store.publish(record.clone());
        last = record;
    }

    source.release();
    running.store(false, Ordering::Release);
    debug!("Detection thread exited after {} frames", frame_index);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_with_mouth_at(x: f32, y: f32) -> FaceLandmarks {
        let mut mesh = vec![NormalizedPoint::new(0.0, 0.0); 468];
        for &idx in MOUTH_LANDMARK_INDICES.iter() {
            mesh[idx] = NormalizedPoint::new(x, y);
        }
        mesh
    }

    #[test]
    fn test_mouth_indices_are_sorted_and_unique() {
        assert_eq!(MOUTH_LANDMARK_INDICES.len(), 40);
        assert!(MOUTH_LANDMARK_INDICES.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_compute_center_truncates() {
        assert_eq!(compute_center(&[]), None);
        assert_eq!(compute_center(&[(1, 1), (2, 2)]), Some((1, 1)));
        assert_eq!(compute_center(&[(400, 230), (440, 250)]), Some((420, 240)));
        // 负数向零截断
        assert_eq!(compute_center(&[(-1, 0), (-2, 0)]), Some((-1, 0)));
    }

    #[test]
    fn test_to_pixel_truncates() {
        let p = NormalizedPoint::new(0.6578, 0.5);
        assert_eq!(p.to_pixel(640, 480), (420, 240));
    }

    #[test]
    fn test_extract_mouth_uses_first_face_only() {
        let faces = vec![mesh_with_mouth_at(0.25, 0.5), mesh_with_mouth_at(0.75, 0.75)];
        let (center, points) = extract_mouth(&faces, 640, 480).unwrap();
        assert_eq!(center, (160, 240));
        assert_eq!(points.len(), 40);
    }

    #[test]
    fn test_extract_mouth_no_face() {
        assert!(extract_mouth(&[], 640, 480).is_none());
    }

    #[test]
    fn test_extract_mouth_short_mesh() {
        // 只覆盖前 20 个下标的网格
        let mesh = vec![NormalizedPoint::new(0.5, 0.5); 20];
        let (center, points) = extract_mouth(&[mesh], 640, 480).unwrap();
        assert_eq!(points.len(), 4); // 0, 13, 14, 17
        assert_eq!(center, (320, 240));

        assert!(extract_mouth(&[Vec::new()], 640, 480).is_none());
    }
}
