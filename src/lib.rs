// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod augment; // 离线数据增强
pub mod config; // 命令行参数
pub mod convert; // CSV 标注 → YOLO 标签
pub mod counting; // 分区人数统计
pub mod detection; // 检测后端 (托管接口 / ONNX) + TTA
pub mod evaluate; // 计数误差评估
pub mod labels; // YOLO 标签格式
pub mod train; // 训练启动器
pub mod utils; // 日志、文件遍历等工具
pub mod zones; // 2×2 分区

pub use crate::config::ModelArgs;
pub use crate::detection::{build_detector, Detection, Detector};
pub use crate::labels::LabelRecord;
pub use crate::zones::{CountReport, Zone, ZoneCounts};

/// 能提供边界框的检测项 (参与 NMS)
pub trait HasBbox {
    fn bbox(&self) -> Bbox;
}

/// 贪心 NMS
///
/// - 先丢弃 `confidence <= score_threshold` 的项
/// - 按置信度稳定降序排序
/// - 与任一已保留项 IoU 大于 `iou_threshold` 的项被抑制
pub fn non_max_suppression<T: HasBbox>(xs: &mut Vec<T>, score_threshold: f32, iou_threshold: f32) {
    xs.retain(|x| x.bbox().confidence() > score_threshold);
    xs.sort_by(|b1, b2| b2.bbox().confidence().total_cmp(&b1.bbox().confidence()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        let candidate = xs[index].bbox();
        for prev_index in 0..current_index {
            let iou = xs[prev_index].bbox().iou(&candidate);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bbox {
    // a bounding box around an object, pixel space
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
    confidence: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
            confidence,
        }
    }

    /// 由中心点格式 (cx, cy, w, h) 构造
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self::new(cx - width / 2., cy - height / 2., width, height, confidence)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        let union = self.union(another);
        if union <= 0. {
            return 0.;
        }
        self.intersection_area(another) / union
    }
}

impl HasBbox for Bbox {
    fn bbox(&self) -> Bbox {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = Bbox::new(0., 0., 10., 10., 1.0);
        let b = Bbox::new(20., 20., 10., 10., 1.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = Bbox::new(0., 0., 10., 10., 1.0);
        let b = Bbox::new(5., 0., 10., 10., 1.0);
        // 交 50, 并 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_area_iou() {
        let a = Bbox::new(1., 1., 0., 0., 1.0);
        assert_eq!(a.iou(&a), 0.0);
    }

    #[test]
    fn test_nms_keeps_highest_confidence() {
        let mut xs = vec![
            Bbox::new(0., 0., 10., 10., 0.6),
            Bbox::new(1., 1., 10., 10., 0.9),
            Bbox::new(50., 50., 10., 10., 0.3),
        ];
        non_max_suppression(&mut xs, 0.0, 0.3);
        assert_eq!(xs.len(), 2);
        assert_eq!(xs[0].confidence(), 0.9);
        assert_eq!(xs[1].confidence(), 0.3);
    }

    #[test]
    fn test_nms_score_threshold_is_exclusive() {
        let mut xs = vec![
            Bbox::new(0., 0., 10., 10., 0.0),
            Bbox::new(50., 50., 10., 10., 0.1),
        ];
        non_max_suppression(&mut xs, 0.0, 0.5);
        assert_eq!(xs.len(), 1);
        assert_eq!(xs[0].confidence(), 0.1);
    }

    #[test]
    fn test_nms_overlap_at_threshold_is_kept() {
        // IoU = 1/3, 阈值 1/3 时不抑制
        let mut xs = vec![
            Bbox::new(0., 0., 10., 10., 0.9),
            Bbox::new(5., 0., 10., 10., 0.8),
        ];
        let iou = xs[0].iou(&xs[1]);
        non_max_suppression(&mut xs, 0.0, iou);
        assert_eq!(xs.len(), 2);
    }
}
