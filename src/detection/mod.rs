// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测系统 (Detection System)
///
/// 目标检测本身由外部完成, 这里只做统一封装:
/// - HostedModel: 托管推理接口 (每张图一次 HTTP 请求)
/// - OnnxModel:   本地 YOLOv8 ONNX 模型 (ONNX Runtime)
/// - tta:         水平翻转测试时增强 + NMS 合并
pub mod hosted;
pub mod onnx;
pub mod tta;

pub use hosted::HostedModel;
pub use onnx::OnnxModel;
pub use tta::tta_predict;

use anyhow::Result;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::config::{Backend, ModelArgs};
use crate::{Bbox, HasBbox};

/// 检测记录: 中心点格式, 像素坐标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub class_id: usize,
}

impl Detection {
    pub fn new(x: f32, y: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
            class: String::new(),
            class_id: 0,
        }
    }
}

impl HasBbox for Detection {
    fn bbox(&self) -> Bbox {
        Bbox::from_center(self.x, self.y, self.width, self.height, self.confidence)
    }
}

/// 统一的检测器接口
///
/// ## 核心流程
/// ```text
/// 图片 → predict → Vec<Detection> (坐标相对输入图片)
/// ```
pub trait Detector {
    /// 对一张图片做检测
    fn predict(&mut self, image: &DynamicImage) -> Result<Vec<Detection>>;

    /// 检测器信息 (用于启动时打印)
    fn summary(&self) -> String;
}

/// 根据参数创建检测器
pub fn build_detector(args: &ModelArgs) -> Result<Box<dyn Detector>> {
    let detector: Box<dyn Detector> = match args.backend {
        Backend::Hosted => Box::new(HostedModel::new(args)?),
        Backend::Onnx => Box::new(OnnxModel::new(args)?),
    };
    println!("📦 检测器: {}", detector.summary());
    Ok(detector)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// 测试用检测器: 原图与翻转图分别返回固定结果
    pub struct FixedDetector {
        pub original: Vec<Detection>,
        pub flipped: Vec<Detection>,
        pub calls: usize,
    }

    impl FixedDetector {
        pub fn new(original: Vec<Detection>) -> Self {
            Self {
                original,
                flipped: Vec::new(),
                calls: 0,
            }
        }
    }

    impl Detector for FixedDetector {
        fn predict(&mut self, _image: &DynamicImage) -> Result<Vec<Detection>> {
            self.calls += 1;
            // 奇数次调用为原图, 偶数次为翻转图 (TTA 的调用顺序)
            if self.calls % 2 == 1 || self.flipped.is_empty() {
                Ok(self.original.clone())
            } else {
                Ok(self.flipped.clone())
            }
        }

        fn summary(&self) -> String {
            "fixed".to_string()
        }
    }
}
