// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 命令行参数 - 每个可执行文件一个 Args, 检测器参数共享 `ModelArgs`

use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};

/// 默认最大检测数 (计数)
pub const DEFAULT_MAX_DET: usize = 300;

/// 评估时的最大检测数
pub const EVAL_MAX_DET: usize = 1000;

/// 检测后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// 托管推理接口 (每张图一次 HTTP 请求)
    Hosted,
    /// 本地 ONNX 模型 (ONNX Runtime)
    Onnx,
}

/// 检测器参数
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// 检测后端
    #[arg(long, value_enum, default_value_t = Backend::Hosted)]
    pub backend: Backend,

    /// 托管接口 API key
    #[arg(long, env = "ROBOFLOW_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// 托管接口地址
    #[arg(long, default_value = "https://detect.roboflow.com")]
    pub api_url: String,

    /// 托管项目名
    #[arg(long, default_value = "crowd-density-ou3ne")]
    pub project: String,

    /// 托管项目版本
    #[arg(long, default_value_t = 1)]
    pub model_version: u32,

    /// ONNX 模型路径 (--backend onnx)
    #[arg(long, default_value = "yolov8n.onnx")]
    pub model: PathBuf,

    /// ONNX 输入尺寸
    #[arg(long, default_value_t = 640)]
    pub imgsz: u32,

    /// 置信度阈值 (百分比, 0-100)
    #[arg(long, default_value_t = 10.0)]
    pub conf: f32,

    /// NMS 重叠阈值 (百分比, 0-100)
    #[arg(long, default_value_t = 30.0)]
    pub overlap: f32,

    /// 每张图最大检测数
    #[arg(long)]
    pub max_det: Option<usize>,

    /// HTTP 请求超时 (秒)
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,
}

impl ModelArgs {
    /// 未显式指定 `--max-det` 时使用给定默认值
    pub fn with_default_max_det(mut self, max_det: usize) -> Self {
        self.max_det.get_or_insert(max_det);
        self
    }

    pub fn max_det(&self) -> usize {
        self.max_det.unwrap_or(DEFAULT_MAX_DET)
    }

    /// 置信度 (0-1)
    pub fn conf_ratio(&self) -> f32 {
        self.conf / 100.0
    }

    /// IoU 阈值 (0-1)
    pub fn iou_ratio(&self) -> f32 {
        self.overlap / 100.0
    }
}

/// 分区人数统计
#[derive(Parser, Debug)]
#[command(author, version, about = "2×2 分区人数统计 (可选水平翻转 TTA)", long_about = None)]
pub struct CountArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// 输入图片目录
    #[arg(short, long, default_value = "Data/valid")]
    pub input: PathBuf,

    /// 输出 JSON (默认 v1_counts.json, TTA 时 v2_counts_tta.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 推理前缩放比例
    #[arg(long, default_value_t = 0.5)]
    pub resize: f32,

    /// 启用水平翻转 TTA
    #[arg(long)]
    pub tta: bool,
}

impl CountArgs {
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None if self.tta => PathBuf::from("v2_counts_tta.json"),
            None => PathBuf::from("v1_counts.json"),
        }
    }
}

/// CSV 标注转 YOLO 标签
#[derive(Parser, Debug)]
#[command(author, version, about = "CSV 标注 → YOLO 标签文件", long_about = None)]
pub struct ConvertArgs {
    /// 数据集根目录 (包含各 split 子目录)
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// 需要转换的 split
    #[arg(long, value_delimiter = ',', default_values = ["train", "valid", "test"])]
    pub splits: Vec<String>,

    /// 每个 split 下的 CSV 文件名
    #[arg(long, default_value = "_annotations.csv")]
    pub csv_name: String,

    /// 标签输出根目录 (相对 root)
    #[arg(long, default_value = "labels")]
    pub labels_dir: PathBuf,

    /// 追加类别映射, 形如 NAME=ID, 可重复
    #[arg(long = "class", value_parser = parse_class_mapping)]
    pub classes: Vec<(String, usize)>,
}

fn parse_class_mapping(raw: &str) -> Result<(String, usize), String> {
    let (name, id) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=ID, got '{raw}'"))?;
    let id = id
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("invalid class id '{id}'"))?;
    Ok((name.to_string(), id))
}

/// 离线数据增强
#[derive(Parser, Debug)]
#[command(author, version, about = "图片 + YOLO 标签离线增强", long_about = None)]
pub struct AugmentArgs {
    /// 源图片目录
    #[arg(long, default_value = "images/train")]
    pub images: PathBuf,

    /// 源标签目录
    #[arg(long, default_value = "labels/train")]
    pub labels: PathBuf,

    /// 输出图片目录
    #[arg(long, default_value = "aug_images")]
    pub out_images: PathBuf,

    /// 输出标签目录
    #[arg(long, default_value = "aug_labels")]
    pub out_labels: PathBuf,

    /// 每张图生成的变体数
    #[arg(short, long, default_value_t = 3)]
    pub variants: usize,

    /// 随机种子 (可复现)
    #[arg(long)]
    pub seed: Option<u64>,
}

/// 训练启动器
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "配置并启动 YOLO 训练", long_about = None)]
pub struct TrainArgs {
    /// 数据集配置
    #[arg(long, default_value = "dataset.yaml")]
    pub data: PathBuf,

    /// 预训练权重
    #[arg(short, long, default_value = "yolov8n.pt")]
    pub model: String,

    #[arg(long, default_value_t = 100)]
    pub epochs: u32,

    #[arg(long, default_value_t = 640)]
    pub imgsz: u32,

    #[arg(long, default_value_t = 16)]
    pub batch: u32,

    /// 输出根目录
    #[arg(long, default_value = "runs")]
    pub project: String,

    /// 本次运行目录名
    #[arg(long, default_value = "tb_run")]
    pub name: String,

    /// 运行目录名追加时间戳
    #[arg(long)]
    pub timestamp: bool,

    /// 训练器可执行文件
    #[arg(long, default_value = "yolo")]
    pub yolo: String,

    /// 不开启 TensorBoard 日志
    #[arg(long)]
    pub no_tensorboard: bool,

    /// 根据 images/<split> 目录生成数据集配置
    #[arg(long)]
    pub write_data: bool,

    /// 生成配置时的数据集根目录
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,

    /// 生成配置时的类别名
    #[arg(long, value_delimiter = ',', default_values = ["person"])]
    pub names: Vec<String>,

    /// 只打印命令, 不执行
    #[arg(long)]
    pub dry_run: bool,
}

/// 计数误差评估
#[derive(Parser, Debug)]
#[command(author, version, about = "计数绝对误差评估", long_about = None)]
pub struct EvalArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// 图片目录
    #[arg(short, long, default_value = "images/val")]
    pub images: PathBuf,

    /// 真值 JSON: {"<image>": <count>}
    #[arg(long, conflicts_with = "labels", required_unless_present = "labels")]
    pub ground_truth: Option<PathBuf>,

    /// 真值标签目录 (每个标签文件的行数即人数)
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// 直接评估已有的分区计数 JSON, 不再调用检测器
    #[arg(long)]
    pub counts: Option<PathBuf>,

    /// 推理前缩放比例
    #[arg(long, default_value_t = 1.0)]
    pub resize: f32,

    /// 启用水平翻转 TTA
    #[arg(long)]
    pub tta: bool,

    /// 保存评估报告 JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
