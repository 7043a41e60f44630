//! 角度映射的属性测试
//!
//! 使用 proptest 验证范围与单调性。

use feeder_client::{AngleGate, LinearMap, OffsetMapper};
use feeder_tools::CalibrationConfig;
use proptest::prelude::*;

fn mapper() -> OffsetMapper {
    OffsetMapper::new(&CalibrationConfig::default())
}

proptest! {
    /// 任意坐标映射结果都在角度区间内
    #[test]
    fn linear_map_stays_in_range(
        coord_min in -1000i32..1000,
        width in 1i32..2000,
        angle_min in 0i32..90,
        angle_width in 0i32..90,
        coord in -5000i32..5000,
    ) {
        let map = LinearMap::new(coord_min, coord_min + width, angle_min, angle_min + angle_width);
        let angle = map.map(coord);
        prop_assert!(angle >= angle_min && angle <= angle_min + angle_width);

        let inverted = map.map_inverted(coord);
        prop_assert!(inverted >= angle_min && inverted <= angle_min + angle_width);
        prop_assert_eq!(angle + inverted, 2 * angle_min + angle_width);
    }

    /// 线性映射单调不减
    #[test]
    fn linear_map_is_monotonic(a in -1000i32..2000, b in -1000i32..2000) {
        let map = LinearMap::new(100, 540, 0, 180);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(map.map(lo) <= map.map(hi));
    }

    /// 偏移映射结果都在舵机可动范围内
    #[test]
    fn offset_angles_within_servo_ranges(x in -10_000i32..10_000, y in -10_000i32..10_000) {
        let (h, v) = mapper().angles_for_center((x, y));
        prop_assert!((90..=150).contains(&h));
        prop_assert!((20..=60).contains(&v));
    }

    /// 嘴部右移时水平舵机角度不增，下移时垂直舵机角度不减
    #[test]
    fn offset_direction_is_fixed(x1 in 0i32..640, x2 in 0i32..640, y1 in 0i32..480, y2 in 0i32..480) {
        let m = mapper();
        let (left, right) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        prop_assert!(m.angles_for_center((left, 240)).0 >= m.angles_for_center((right, 240)).0);

        let (top, bottom) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        prop_assert!(m.angles_for_center((320, top)).1 <= m.angles_for_center((320, bottom)).1);
    }

    /// 迟滞门限：只有变化量不小于阈值才放行
    #[test]
    fn angle_gate_threshold(last in 0u8..=180, target in 0u8..=180, threshold in 0u8..10) {
        let mut gate = AngleGate::new(threshold);
        prop_assert!(gate.should_send(target));
        gate.record(last);
        prop_assert_eq!(gate.should_send(target), last.abs_diff(target) >= threshold);
    }
}

#[test]
fn frame_center_maps_to_servo_centers() {
    assert_eq!(mapper().angles_for_center((320, 240)), (120, 45));
}
