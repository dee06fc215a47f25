// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 计数误差评估: 逐张比较预测人数与真值, 汇总绝对误差

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::counting::{detect, resize_by_factor, CountOptions};
use crate::labels::{file_stem, read_label_file};
use crate::zones::CountReport;
use crate::Detector;

/// 每张图的真值人数
pub type GroundTruth = BTreeMap<String, u32>;

/// 从 JSON `{ "<image>": <count> }` 读取真值
pub fn ground_truth_from_json(path: &Path) -> Result<GroundTruth> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("malformed ground truth {}", path.display()))
}

/// 从标签目录读取真值, 图片名取自 `images` 目录
///
/// 没有标签文件的图片 (无标注的空场景) 真值为 0.
pub fn ground_truth_from_labels(labels: &Path, images: &Path) -> Result<GroundTruth> {
    let mut gt = GroundTruth::new();
    let mut matched = 0;
    for path in crate::utils::list_images(images)? {
        let name = crate::utils::file_name(&path);
        let label = labels.join(format!("{}.txt", file_stem(&name)));
        let count = if label.is_file() {
            matched += 1;
            read_label_file(&label)?.len() as u32
        } else {
            tracing::warn!(image = %name, "no label file, ground truth is 0");
            0
        };
        gt.insert(name, count);
    }
    if matched == 0 {
        bail!(
            "no label files in {} match images in {}",
            labels.display(),
            images.display()
        );
    }
    Ok(gt)
}

/// 单张图的评估结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEval {
    pub ground_truth: u32,
    pub predicted: u32,
    pub abs_error: u32,
}

/// 评估报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub per_image: BTreeMap<String, ImageEval>,
    pub total_abs_error: u64,
    pub mean_abs_error: f64,
}

impl EvalReport {
    pub fn from_counts(gt: &GroundTruth, predicted: &BTreeMap<String, u32>) -> Result<Self> {
        let mut per_image = BTreeMap::new();
        let mut total = 0u64;
        for (name, &truth) in gt {
            let Some(&pred) = predicted.get(name) else {
                bail!("no prediction for {name}");
            };
            let abs_error = truth.abs_diff(pred);
            total += abs_error as u64;
            per_image.insert(
                name.clone(),
                ImageEval {
                    ground_truth: truth,
                    predicted: pred,
                    abs_error,
                },
            );
        }

        let mean_abs_error = if per_image.is_empty() {
            0.0
        } else {
            total as f64 / per_image.len() as f64
        };
        Ok(Self {
            per_image,
            total_abs_error: total,
            mean_abs_error,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// 用检测器逐张预测人数 (检测框个数)
pub fn predict_counts(
    detector: &mut dyn Detector,
    images: &Path,
    gt: &GroundTruth,
    options: &CountOptions,
) -> Result<BTreeMap<String, u32>> {
    let mut predicted = BTreeMap::new();
    for name in gt.keys() {
        let path = images.join(name);
        if !path.is_file() {
            bail!("ground-truth image {} not found", path.display());
        }
        let image = image::open(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let count = match resize_by_factor(&image, options.resize) {
            Some(resized) => detect(detector, &resized, options)
                .with_context(|| format!("detection failed on {}", path.display()))?
                .len() as u32,
            None => 0,
        };
        tracing::info!(image = %name, predicted = count, truth = gt[name], "evaluated");
        predicted.insert(name.clone(), count);
    }
    Ok(predicted)
}

/// 分区计数报告 → 每张图总人数
pub fn counts_from_report(report: &CountReport) -> BTreeMap<String, u32> {
    report
        .iter()
        .map(|(name, counts)| (name.clone(), counts.total()))
        .collect()
}
