// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 分区人数统计
//!
//! 逐张处理: 读图 → 缩放 → 检测 (可选 TTA) → 2×2 分区计数.
//! 读不出来的图片跳过; 检测失败直接中止. 结果在最后一次性写出.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView};

use crate::detection::tta_predict;
use crate::utils::{file_name, list_images};
use crate::zones::{count_detections, CountReport, ZoneCounts};
use crate::{Detection, Detector};

/// 计数选项
#[derive(Debug, Clone, Copy)]
pub struct CountOptions {
    /// 推理前缩放比例
    pub resize: f32,
    /// 是否启用水平翻转 TTA
    pub tta: bool,
    /// TTA 合并时的重叠阈值 (百分比)
    pub overlap: f32,
}

impl Default for CountOptions {
    fn default() -> Self {
        Self {
            resize: 0.5,
            tta: false,
            overlap: 30.0,
        }
    }
}

/// 按比例缩放, 尺寸向零截断; 缩放后为空时返回 None
pub fn resize_by_factor(image: &DynamicImage, factor: f32) -> Option<DynamicImage> {
    let (w0, h0) = image.dimensions();
    let w = (w0 as f64 * factor as f64) as u32;
    let h = (h0 as f64 * factor as f64) as u32;
    if w == 0 || h == 0 {
        return None;
    }
    if (w, h) == (w0, h0) {
        return Some(image.clone());
    }
    Some(image.resize_exact(w, h, FilterType::Triangle))
}

/// 单次或 TTA 检测
pub fn detect(
    detector: &mut dyn Detector,
    image: &DynamicImage,
    options: &CountOptions,
) -> Result<Vec<Detection>> {
    if options.tta {
        tta_predict(detector, image, options.overlap)
    } else {
        detector.predict(image)
    }
}

/// 一张图的分区计数; 缩放后尺寸为 0 时返回 None
pub fn count_image(
    detector: &mut dyn Detector,
    image: &DynamicImage,
    options: &CountOptions,
) -> Result<Option<ZoneCounts>> {
    let Some(resized) = resize_by_factor(image, options.resize) else {
        return Ok(None);
    };
    let detections = detect(detector, &resized, options)?;
    Ok(Some(count_detections(
        &detections,
        resized.width(),
        resized.height(),
    )))
}

/// 处理目录下所有图片
pub fn count_directory(
    detector: &mut dyn Detector,
    dir: &Path,
    options: &CountOptions,
) -> Result<CountReport> {
    let mut report = CountReport::new();

    for path in list_images(dir)? {
        let name = file_name(&path);
        let image = match image::open(&path) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(image = %name, error = %e, "skipping unreadable image");
                continue;
            }
        };

        let counts = count_image(detector, &image, options)
            .with_context(|| format!("detection failed on {}", path.display()))?;
        match counts {
            Some(counts) => {
                tracing::info!(image = %name, total = counts.total(), "counted");
                report.insert(name, counts);
            }
            None => {
                tracing::warn!(image = %name, resize = options.resize, "image empty after resize, skipped");
            }
        }
    }

    Ok(report)
}

/// 写出计数结果 (2 空格缩进的 JSON)
pub fn write_report(path: &Path, report: &CountReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// 读取计数结果
pub fn read_report(path: &Path) -> Result<CountReport> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("malformed count report {}", path.display()))
}
