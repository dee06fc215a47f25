// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 测试时增强 (TTA): 原图 + 水平翻转各推理一次, 翻转结果映射回原图后 NMS 合并

use anyhow::Result;
use image::DynamicImage;

use super::{Detection, Detector};
use crate::non_max_suppression;

/// 合并时的分数阈值 (只丢弃置信度 <= 0 的框)
pub const MERGE_SCORE_THRESHOLD: f32 = 0.0;

/// 翻转图上的检测 → 原图坐标: x ← w - x
pub fn unflip(detections: &mut [Detection], image_width: u32) {
    let w = image_width as f32;
    for d in detections.iter_mut() {
        d.x = w - d.x;
    }
}

/// 拼接两组检测并做贪心 NMS, `overlap` 为百分比
pub fn merge(original: Vec<Detection>, flipped_back: Vec<Detection>, overlap: f32) -> Vec<Detection> {
    let mut merged = original;
    merged.extend(flipped_back);
    non_max_suppression(&mut merged, MERGE_SCORE_THRESHOLD, overlap / 100.0);
    merged
}

/// 原图 + 水平翻转两次推理, 合并去重
pub fn tta_predict(
    detector: &mut dyn Detector,
    image: &DynamicImage,
    overlap: f32,
) -> Result<Vec<Detection>> {
    let r0 = detector.predict(image)?;

    let flipped = image.fliph();
    let mut r1 = detector.predict(&flipped)?;
    unflip(&mut r1, image.width());

    let (n0, n1) = (r0.len(), r1.len());
    let merged = merge(r0, r1, overlap);
    tracing::debug!(original = n0, flipped = n1, merged = merged.len(), "tta merge");
    Ok(merged)
}
