//! 检测状态定义与交换
//!
//! 检测线程是唯一写者，控制线程是读者。快照通过 `ArcSwap` 整体替换，
//! 读者只会看到完整的旧记录或完整的新记录，不会看到部分更新。

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Instant;

/// 单帧特征检测结果
///
/// 更新频率：与相机帧率一致
/// 同步机制：ArcSwap（整条记录原子替换）
///
/// **注意**：`detected == false` 时 `center` / `points` 是上一次成功检测的陈旧数据，
/// 消费方必须先检查 `detected`。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureDetection {
    /// 特征中心（像素）
    pub center: (i32, i32),
    /// 特征区域关键点（像素），可能为空
    pub points: Vec<(i32, i32)>,
    /// 已处理帧计数（每次迭代递增，无论检测是否成功）
    pub frame_index: u64,
    /// 本帧是否检测到特征
    pub detected: bool,
    /// 单调时钟时间戳（从未发布时为 `None`）
    pub timestamp: Option<Instant>,
}

impl FeatureDetection {
    /// 构造一条"已检测到"的记录
    pub fn found(center: (i32, i32), points: Vec<(i32, i32)>, frame_index: u64) -> Self {
        Self {
            center,
            points,
            frame_index,
            detected: true,
            timestamp: Some(Instant::now()),
        }
    }

    /// 基于上一条记录构造"未检测到"的记录（保留陈旧的中心与关键点）
    pub fn missed(previous: &FeatureDetection, frame_index: u64) -> Self {
        Self {
            center: previous.center,
            points: previous.points.clone(),
            frame_index,
            detected: false,
            timestamp: Some(Instant::now()),
        }
    }
}

/// 检测状态存储（单写者 / 多读者）
///
/// 只暴露 `publish` / `snapshot`，内部同步原语不对外可见。
#[derive(Debug)]
pub struct DetectionStateStore {
    latest: ArcSwap<FeatureDetection>,
}

impl DetectionStateStore {
    /// 创建存储，初始快照为 `detected = false`
    pub fn new() -> Self {
        Self {
            latest: ArcSwap::from_pointee(FeatureDetection::default()),
        }
    }

    /// 创建共享存储
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// 原子替换最新快照（不保留历史）
    pub fn publish(&self, detection: FeatureDetection) {
        self.latest.store(Arc::new(detection));
    }

    /// 获取最新快照的完整副本
    ///
    /// # 性能
    /// - 无锁读取（ArcSwap::load），不阻塞写者
    pub fn snapshot(&self) -> FeatureDetection {
        self.latest.load().as_ref().clone()
    }

    /// 最新已处理帧计数
    pub fn frame_index(&self) -> u64 {
        self.latest.load().frame_index
    }
}

impl Default for DetectionStateStore {
    fn default() -> Self {
        Self::new()
    }
}
