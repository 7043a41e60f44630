//! 控制器状态

mod machine;

pub use machine::{ArmState, AtomicArmState};
