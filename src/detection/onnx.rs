// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 ONNX 检测模型
// 包含: 模型加载、预处理、推理、后处理

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use super::{Detection, Detector};
use crate::config::ModelArgs;
use crate::non_max_suppression;

/// 填充像素值 (与导出时的 letterbox 一致)
const PAD_VALUE: f32 = 144.0 / 255.0;

pub struct OnnxModel {
    session: Session,
    path: PathBuf,
    imgsz: u32,
    conf: f32,
    iou: f32,
    max_det: usize,
}

impl OnnxModel {
    pub fn new(args: &ModelArgs) -> Result<Self> {
        if !args.model.is_file() {
            bail!("model file not found: {}", args.model.display());
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(&args.model)
            .with_context(|| format!("failed to load {}", args.model.display()))?;

        Ok(Self {
            session,
            path: args.model.clone(),
            imgsz: args.imgsz,
            conf: args.conf_ratio(),
            iou: args.iou_ratio(),
            max_det: args.max_det(),
        })
    }

    pub fn preprocess(&self, image: &DynamicImage) -> (Array4<f32>, f32) {
        letterbox(image, self.imgsz)
    }

    pub fn postprocess(&self, dims: &[usize], data: &[f32], ratio: f32) -> Result<Vec<Detection>> {
        let mut detections = decode_output(dims, data, ratio, self.conf)?;
        non_max_suppression(&mut detections, 0.0, self.iou);
        detections.truncate(self.max_det);
        Ok(detections)
    }
}

fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// 等比缩放到 size×size 的左上角, 其余区域填充; 返回 NCHW 张量与缩放比例
pub fn letterbox(image: &DynamicImage, size: u32) -> (Array4<f32>, f32) {
    let (w0, h0) = image.dimensions();
    let (ratio, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, size as f32, size as f32);
    let resized = image
        .resize_exact(
            (w_new as u32).max(1),
            (h_new as u32).max(1),
            image::imageops::FilterType::Triangle,
        )
        .to_rgb8();

    let side = size as usize;
    let mut xs = Array4::from_elem((1, 3, side, side), PAD_VALUE);
    for (x, y, rgb) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        if x >= side || y >= side {
            continue;
        }
        let [r, g, b] = rgb.0;
        xs[[0, 0, y, x]] = (r as f32) / 255.0;
        xs[[0, 1, y, x]] = (g as f32) / 255.0;
        xs[[0, 2, y, x]] = (b as f32) / 255.0;
    }

    (xs, ratio)
}

/// 解码 YOLOv8 检测输出 `[1, 4 + nc, N]` (或转置的 `[1, N, 4 + nc]`)
///
/// 每个候选取得分最高的类别, 低于 `conf` 的丢弃, 坐标除以 `ratio` 还原到输入图片.
pub fn decode_output(dims: &[usize], data: &[f32], ratio: f32, conf: f32) -> Result<Vec<Detection>> {
    if dims.len() != 3 || dims[0] != 1 {
        bail!("unexpected output shape {:?}, expected [1, 4 + nc, N]", dims);
    }
    // 候选数通常远大于通道数
    let (channels, anchors, transposed) = if dims[1] > dims[2] && dims[2] >= 5 {
        (dims[2], dims[1], true)
    } else {
        (dims[1], dims[2], false)
    };
    if channels < 5 {
        bail!("output has {} channels, expected at least 5", channels);
    }
    if data.len() != channels * anchors {
        bail!(
            "output holds {} values, shape {:?} needs {}",
            data.len(),
            dims,
            channels * anchors
        );
    }

    let at = |c: usize, i: usize| {
        if transposed {
            data[i * channels + c]
        } else {
            data[c * anchors + i]
        }
    };

    let mut detections = Vec::new();
    for i in 0..anchors {
        let (class_id, score) = (4..channels)
            .map(|c| (c - 4, at(c, i)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if score < conf {
            continue;
        }

        detections.push(Detection {
            x: at(0, i) / ratio,
            y: at(1, i) / ratio,
            width: at(2, i) / ratio,
            height: at(3, i) / ratio,
            confidence: score,
            class: String::new(),
            class_id,
        });
    }

    Ok(detections)
}

impl Detector for OnnxModel {
    fn predict(&mut self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let t_pre = std::time::Instant::now();
        let (xs, ratio) = self.preprocess(image);
        let input = Tensor::from_array(xs)?;

        let (dims, data) = {
            let outputs = self
                .session
                .run(ort::inputs!["images" => input])
                .context("onnx inference failed")?;
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .context("failed to extract output tensor")?;
            let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
            (dims, data.to_vec())
        };
        tracing::debug!(elapsed = ?t_pre.elapsed(), "onnx forward");

        self.postprocess(&dims, &data, ratio)
    }

    fn summary(&self) -> String {
        format!(
            "onnx {} (imgsz {}, conf {:.2}, iou {:.2}, max_det {})",
            self.path.display(),
            self.imgsz,
            self.conf,
            self.iou,
            self.max_det
        )
    }
}
