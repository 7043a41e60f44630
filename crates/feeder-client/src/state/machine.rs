//! 机械臂状态机
//!
//! ```text
//!                 connect
//! Disconnected ───────────▶ Idle ──initServos──────────▶ Initializing ──▶ Idle
//!      ▲                     │  ──startSingleFeed──────▶ SingleFeed ────▶ Idle
//!      │ disconnect          │  ──startDynamicTracking─▶ DynamicTracking ─(stop flag)─▶ Idle
//!      └─────────────────────┘
//!                 任意已连接状态 ──stopFeeding──▶ Stopping ──▶ Idle
//! ```
//!
//! 每个控制器只有一个状态实例；状态切换由单一指令线程串行执行。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 机械臂状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ArmState {
    /// 串口未连接（默认）
    #[default]
    Disconnected = 0,
    /// 已连接、空闲
    Idle = 1,
    /// 正在执行初始化序列
    Initializing = 2,
    /// 正在执行单次喂食序列
    SingleFeed = 3,
    /// 动态跟踪中
    DynamicTracking = 4,
    /// 正在执行复位序列
    Stopping = 5,
}

impl ArmState {
    /// 从 u8 转换
    ///
    /// 如果值无效，返回 Disconnected。
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Idle,
            2 => Self::Initializing,
            3 => Self::SingleFeed,
            4 => Self::DynamicTracking,
            5 => Self::Stopping,
            _ => Self::Disconnected,
        }
    }

    /// 转换为 u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 是否有动作序列在执行
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Initializing | Self::SingleFeed | Self::DynamicTracking | Self::Stopping
        )
    }

    /// 是否已连接
    pub fn is_connected(self) -> bool {
        self != Self::Disconnected
    }
}

impl fmt::Display for ArmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArmState::Disconnected => "Disconnected",
            ArmState::Idle => "Idle",
            ArmState::Initializing => "Initializing",
            ArmState::SingleFeed => "SingleFeed",
            ArmState::DynamicTracking => "DynamicTracking",
            ArmState::Stopping => "Stopping",
        };
        f.write_str(s)
    }
}

/// 机械臂状态（原子版本，用于线程间共享）
///
/// # 使用场景
///
/// - 指令线程在序列开始/结束时写入
/// - 调用方（UI、CLI）随时读取，不阻塞
#[derive(Debug)]
pub struct AtomicArmState {
    inner: AtomicU8,
}

impl AtomicArmState {
    /// 创建新的原子状态
    pub fn new(state: ArmState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    /// 获取当前状态
    pub fn get(&self) -> ArmState {
        ArmState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// 设置状态
    pub fn set(&self, state: ArmState) {
        self.inner.store(state.as_u8(), Ordering::Release);
    }

    /// 仍处于连接状态时切换到 `next`
    ///
    /// 已断开时保持 `Disconnected` 并返回 `false`，避免断开后被序列结束覆盖。
    pub fn set_if_connected(&self, next: ArmState) -> bool {
        self.inner
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == ArmState::Disconnected.as_u8() {
                    None
                } else {
                    Some(next.as_u8())
                }
            })
            .is_ok()
    }
}

impl Default for AtomicArmState {
    fn default() -> Self {
        Self::new(ArmState::Disconnected)
    }
}
