// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! YOLO 标签格式
//!
//! 每行一个目标: `class_id x_center y_center width height`,
//! 空间字段按图片宽高归一化到 [0, 1], 写出时保留 6 位小数.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelRecord {
    pub class_id: usize,
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl LabelRecord {
    pub fn new(class_id: usize, cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self {
            class_id,
            cx,
            cy,
            w,
            h,
        }
    }

    /// 角点格式 (xmin, ymin, xmax, ymax) → 归一化中心格式
    pub fn from_corners(
        class_id: usize,
        (xmin, ymin, xmax, ymax): (f64, f64, f64, f64),
        img_w: f64,
        img_h: f64,
    ) -> Self {
        Self {
            class_id,
            cx: (xmin + xmax) / 2.0 / img_w,
            cy: (ymin + ymax) / 2.0 / img_h,
            w: (xmax - xmin) / img_w,
            h: (ymax - ymin) / img_h,
        }
    }

    /// 归一化中心格式 → 像素角点 (xmin, ymin, xmax, ymax)
    pub fn to_corners(&self, img_w: f64, img_h: f64) -> (f64, f64, f64, f64) {
        let cx = self.cx * img_w;
        let cy = self.cy * img_h;
        let w = self.w * img_w;
        let h = self.h * img_h;
        (cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    /// 解析一行标签
    pub fn parse(line: &str) -> Result<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 5 {
            bail!(
                "expected 5 fields `class x y w h`, found {} in '{}'",
                tokens.len(),
                line.trim()
            );
        }

        let class_id = tokens[0]
            .parse::<usize>()
            .with_context(|| format!("invalid class id '{}'", tokens[0]))?;
        let mut values = [0f64; 4];
        for (value, token) in values.iter_mut().zip(&tokens[1..]) {
            *value = token
                .parse::<f64>()
                .with_context(|| format!("invalid coordinate '{token}'"))?;
        }
        let [cx, cy, w, h] = values;

        Ok(Self::new(class_id, cx, cy, w, h))
    }
}

impl fmt::Display for LabelRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.cx, self.cy, self.w, self.h
        )
    }
}

/// 读取标签文件, 忽略空行
pub fn read_label_file(path: &Path) -> Result<Vec<LabelRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read label file {}", path.display()))?;

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            LabelRecord::parse(line)
                .with_context(|| format!("{}:{}", path.display(), i + 1))
        })
        .collect()
}

/// 写标签文件
///
/// `trailing_newline` 为 false 时行之间以 `\n` 连接, 末行无换行.
pub fn write_label_file(path: &Path, records: &[LabelRecord], trailing_newline: bool) -> Result<()> {
    let mut text = records
        .iter()
        .map(LabelRecord::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    if trailing_newline && !records.is_empty() {
        text.push('\n');
    }
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

/// 去掉最后一个扩展名
pub fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(i) => &name[..i],
    }
}

/// 图片对应的标签路径: `<label_dir>/<stem>.txt`
pub fn label_path_for(image_name: &str, label_dir: &Path) -> PathBuf {
    label_dir.join(format!("{}.txt", file_stem(image_name)))
}
