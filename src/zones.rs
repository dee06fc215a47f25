// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 2×2 分区计数
//!
//! 图片 (缩放后) 被等分为 4 个象限. 每个检测框取底边中点
//! (近似人的落脚点), 按固定顺序找到第一个包含该点的分区并计数.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Detection;

/// 分区名 (按匹配顺序)
pub const ZONE_NAMES: [&str; 4] = ["Zone 1", "Zone 2", "Zone 3", "Zone 4"];

/// 整数像素点
pub type Point = (i64, i64);

/// 固定多边形分区
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub name: &'static str,
    pub polygon: Vec<Point>,
}

impl Zone {
    /// 边界算作包含
    pub fn contains(&self, pt: Point) -> bool {
        point_polygon_test(pt, &self.polygon) >= 0
    }
}

/// 覆盖整张图的 4 个象限: 左上、右上、左下、右下
pub fn zones_for(w: u32, h: u32) -> [Zone; 4] {
    let (w, h) = (w as i64, h as i64);
    let (hw, hh) = (w / 2, h / 2);
    let quad = |name, x0, y0, x1, y1| Zone {
        name,
        polygon: vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)],
    };

    [
        quad(ZONE_NAMES[0], 0, 0, hw, hh),
        quad(ZONE_NAMES[1], hw, 0, w, hh),
        quad(ZONE_NAMES[2], 0, hh, hw, h),
        quad(ZONE_NAMES[3], hw, hh, w, h),
    ]
}

/// 点与多边形的关系: 1 在内部, 0 在边或顶点上, -1 在外部
pub fn point_polygon_test(pt: Point, polygon: &[Point]) -> i32 {
    let n = polygon.len();
    if n == 0 {
        return -1;
    }

    // i128: 截断后的坐标可能饱和到 i64 边界
    let (px, py) = (pt.0 as i128, pt.1 as i128);
    let mut inside = false;
    for i in 0..n {
        let (x1, y1) = (polygon[i].0 as i128, polygon[i].1 as i128);
        let (x2, y2) = (polygon[(i + 1) % n].0 as i128, polygon[(i + 1) % n].1 as i128);

        let cross = (x2 - x1) * (py - y1) - (y2 - y1) * (px - x1);
        if cross == 0
            && px >= x1.min(x2)
            && px <= x1.max(x2)
            && py >= y1.min(y2)
            && py <= y1.max(y2)
        {
            return 0;
        }

        // 向 +x 方向射线, 统计穿越次数
        if (y1 > py) != (y2 > py) {
            let lhs = (px - x1) * (y2 - y1);
            let rhs = (py - y1) * (x2 - x1);
            let left_of_edge = if y2 > y1 { lhs < rhs } else { lhs > rhs };
            if left_of_edge {
                inside = !inside;
            }
        }
    }

    if inside {
        1
    } else {
        -1
    }
}

/// 检测框底边中点, 坐标向零截断
pub fn assignment_point(d: &Detection) -> Point {
    let x1 = d.x - d.width / 2.0;
    let x2 = d.x + d.width / 2.0;
    let y2 = d.y + d.height / 2.0;
    (((x1 + x2) / 2.0) as i64, y2 as i64)
}

/// 第一个包含该点的分区
pub fn assign<'a>(pt: Point, zones: &'a [Zone]) -> Option<&'a Zone> {
    zones.iter().find(|z| z.contains(pt))
}

/// 每个分区的人数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneCounts(BTreeMap<String, u32>);

impl ZoneCounts {
    /// 所有分区计数为 0
    pub fn for_zones(zones: &[Zone]) -> Self {
        Self(zones.iter().map(|z| (z.name.to_string(), 0)).collect())
    }

    pub fn increment(&mut self, zone: &str) {
        *self.0.entry(zone.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, zone: &str) -> u32 {
        self.0.get(zone).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }
}

/// 图片文件名 → 分区计数
pub type CountReport = BTreeMap<String, ZoneCounts>;

/// 对一张 w×h 图片上的检测结果做分区计数, 落在图外的点不计
pub fn count_detections(detections: &[Detection], w: u32, h: u32) -> ZoneCounts {
    let zones = zones_for(w, h);
    let mut counts = ZoneCounts::for_zones(&zones);
    for d in detections {
        if let Some(zone) = assign(assignment_point(d), &zones) {
            counts.increment(zone.name);
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32, width: f32, height: f32) -> Detection {
        Detection::new(x, y, width, height, 0.9)
    }

    #[test]
    fn test_example_point_in_zone_2() {
        let zones = zones_for(100, 100);
        assert_eq!(assign((60, 10), &zones).map(|z| z.name), Some("Zone 2"));
    }

    #[test]
    fn test_every_pixel_assigned_once() {
        for (w, h) in [(100, 100), (7, 5), (640, 359)] {
            let zones = zones_for(w, h);
            let mut per_zone = [0usize; 4];
            for y in 0..=h as i64 {
                for x in 0..=w as i64 {
                    let zone = assign((x, y), &zones)
                        .unwrap_or_else(|| panic!("({x},{y}) unassigned in {w}x{h}"));
                    let i = ZONE_NAMES.iter().position(|n| *n == zone.name).unwrap();
                    per_zone[i] += 1;
                }
            }
            let total: usize = per_zone.iter().sum();
            assert_eq!(total, (w as usize + 1) * (h as usize + 1));
            assert!(per_zone.iter().all(|&n| n > 0));
        }
    }

    #[test]
    fn test_quadrant_interiors_do_not_overlap() {
        let zones = zones_for(100, 100);
        for y in 0..=100i64 {
            for x in 0..=100i64 {
                let strictly_inside = zones
                    .iter()
                    .filter(|z| point_polygon_test((x, y), &z.polygon) > 0)
                    .count();
                assert!(strictly_inside <= 1);
            }
        }
    }

    #[test]
    fn test_point_polygon_test() {
        let square = vec![(0, 0), (10, 0), (10, 10), (0, 10)];
        assert_eq!(point_polygon_test((5, 5), &square), 1);
        assert_eq!(point_polygon_test((0, 5), &square), 0);
        assert_eq!(point_polygon_test((10, 10), &square), 0);
        assert_eq!(point_polygon_test((11, 5), &square), -1);
        assert_eq!(point_polygon_test((-1, -1), &square), -1);

        let triangle = vec![(0, 0), (10, 0), (0, 10)];
        assert_eq!(point_polygon_test((2, 2), &triangle), 1);
        assert_eq!(point_polygon_test((5, 5), &triangle), 0);
        assert_eq!(point_polygon_test((6, 6), &triangle), -1);
    }

    #[test]
    fn test_far_outside_detection_is_not_counted() {
        let zones = zones_for(100, 100);
        let pt = assignment_point(&det(1e20, 5.0, 10.0, 10.0));
        assert_eq!(pt.0, i64::MAX);
        assert!(assign(pt, &zones).is_none());
        assert!(assign((i64::MIN, i64::MIN), &zones).is_none());

        let counts = count_detections(&[det(-1e20, 5.0, 10.0, 10.0), det(60., 5., 10., 10.)], 100, 100);
        assert_eq!(counts.total(), 1);
    }

    #[test]
    fn test_shared_edge_goes_to_first_zone() {
        let zones = zones_for(100, 100);
        assert_eq!(assign((50, 50), &zones).map(|z| z.name), Some("Zone 1"));
        assert_eq!(assign((50, 80), &zones).map(|z| z.name), Some("Zone 3"));
        assert_eq!(assign((80, 50), &zones).map(|z| z.name), Some("Zone 2"));
    }

    #[test]
    fn test_assignment_point_is_bottom_center() {
        assert_eq!(assignment_point(&det(60.7, 5.0, 10.0, 10.0)), (60, 10));
        assert_eq!(assignment_point(&det(20.0, 20.0, 8.0, 9.0)), (20, 24));
    }

    #[test]
    fn test_count_detections() {
        let detections = vec![
            det(10., 10., 4., 4.),  // (10, 12) → Zone 1
            det(60., 5., 10., 10.), // (60, 10) → Zone 2
            det(70., 5., 10., 10.), // (70, 10) → Zone 2
            det(90., 90., 4., 4.),  // (90, 92) → Zone 4
            det(90., 99., 4., 4.),  // (90, 101) 图外
        ];
        let counts = count_detections(&detections, 100, 100);
        assert_eq!(counts.get("Zone 1"), 1);
        assert_eq!(counts.get("Zone 2"), 2);
        assert_eq!(counts.get("Zone 3"), 0);
        assert_eq!(counts.get("Zone 4"), 1);
        assert_eq!(counts.total(), 4);

        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"Zone 1":1,"Zone 2":2,"Zone 3":0,"Zone 4":1}"#);
    }
}
