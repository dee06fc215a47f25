// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 离线数据增强
//!
//! 每张训练图生成若干随机变体, 同步变换 YOLO 标签框. 默认流水线:
//!
//! ```text
//! OneOf(亮度对比度 | 色相饱和度明度, p=0.5)
//!   → 水平翻转 (p=0.5)
//!   → 旋转 ±15° 黑边 (p=0.5)
//!   → 随机缩放 ±20% (p=0.5)
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{imageops, Pixel, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::labels::{file_stem, label_path_for, read_label_file, write_label_file, LabelRecord};
use crate::utils::{ensure_dir, file_name};

/// 图片 + 归一化标签
#[derive(Debug, Clone)]
pub struct Sample {
    pub image: RgbImage,
    pub labels: Vec<LabelRecord>,
}

/// 单个增强变换
pub trait Augmentation {
    /// 触发概率
    fn probability(&self) -> f64;

    /// 无条件执行变换
    fn transform(&self, sample: Sample, rng: &mut StdRng) -> Sample;

    /// 按概率执行
    fn apply(&self, sample: Sample, rng: &mut StdRng) -> Sample {
        if rng.gen::<f64>() < self.probability() {
            self.transform(sample, rng)
        } else {
            sample
        }
    }
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// 亮度/对比度: v * alpha + beta
pub struct RandomBrightnessContrast {
    pub brightness_limit: f32,
    pub contrast_limit: f32,
    pub p: f64,
}

impl Augmentation for RandomBrightnessContrast {
    fn probability(&self) -> f64 {
        self.p
    }

    fn transform(&self, mut sample: Sample, rng: &mut StdRng) -> Sample {
        let alpha = 1.0 + rng.gen_range(-self.contrast_limit..=self.contrast_limit);
        let beta = 255.0 * rng.gen_range(-self.brightness_limit..=self.brightness_limit);
        for px in sample.image.pixels_mut() {
            px.apply(|v| clamp_u8(v as f32 * alpha + beta));
        }
        sample
    }
}

/// 色相/饱和度/明度偏移, 色相单位与 OpenCV 一致 (1 = 2°)
///
/// 只有色相在 HSV 空间旋转. 饱和度按亮度向灰度缩放, 明度为 RGB 整体加减,
/// 与 albumentations 在 HSV 的 S/V 通道上做加法的结果不完全一致.
pub struct HueSaturationValue {
    pub hue_shift_limit: i32,
    pub sat_shift_limit: i32,
    pub val_shift_limit: i32,
    pub p: f64,
}

impl Augmentation for HueSaturationValue {
    fn probability(&self) -> f64 {
        self.p
    }

    fn transform(&self, sample: Sample, rng: &mut StdRng) -> Sample {
        let hue = rng.gen_range(-self.hue_shift_limit..=self.hue_shift_limit);
        let sat = rng.gen_range(-self.sat_shift_limit..=self.sat_shift_limit);
        let val = rng.gen_range(-self.val_shift_limit..=self.val_shift_limit);

        let mut image = imageops::huerotate(&sample.image, hue * 2);

        // 饱和度: 向灰度插值 / 远离灰度
        let factor = 1.0 + sat as f32 / 255.0;
        for px in image.pixels_mut() {
            let gray = px.to_luma().0[0] as f32;
            px.apply(|v| clamp_u8(gray + (v as f32 - gray) * factor));
        }

        let image = imageops::brighten(&image, val);
        Sample {
            image,
            labels: sample.labels,
        }
    }
}

/// 水平翻转: cx ← 1 - cx
pub struct HorizontalFlip {
    pub p: f64,
}

impl Augmentation for HorizontalFlip {
    fn probability(&self) -> f64 {
        self.p
    }

    fn transform(&self, mut sample: Sample, _rng: &mut StdRng) -> Sample {
        imageops::flip_horizontal_in_place(&mut sample.image);
        for label in sample.labels.iter_mut() {
            label.cx = 1.0 - label.cx;
        }
        sample
    }
}

/// 绕中心旋转, 画布尺寸不变, 空白处填黑
pub struct Rotate {
    /// 最大角度 (度)
    pub limit: f64,
    pub p: f64,
}

impl Augmentation for Rotate {
    fn probability(&self) -> f64 {
        self.p
    }

    fn transform(&self, sample: Sample, rng: &mut StdRng) -> Sample {
        let theta = rng.gen_range(-self.limit..=self.limit).to_radians();
        let (w, h) = sample.image.dimensions();
        let image = rotate_about_center(
            &sample.image,
            theta as f32,
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
        );
        Sample {
            image,
            labels: rotate_labels(&sample.labels, w, h, theta),
        }
    }
}

/// 标签框随图片旋转 `theta` 弧度 (图像坐标系, y 向下, 正角度顺时针)
///
/// 新框为旋转后四个角点的外接框, 裁剪到图片范围; 面积为 0 的框丢弃.
pub fn rotate_labels(labels: &[LabelRecord], w: u32, h: u32, theta: f64) -> Vec<LabelRecord> {
    let (w, h) = (w as f64, h as f64);
    let (cx, cy) = (w / 2.0, h / 2.0);
    let (sin, cos) = theta.sin_cos();

    labels
        .iter()
        .filter_map(|label| {
            let (x1, y1, x2, y2) = label.to_corners(w, h);
            let corners = [(x1, y1), (x2, y1), (x2, y2), (x1, y2)].map(|(x, y)| {
                let (dx, dy) = (x - cx, y - cy);
                (cx + dx * cos - dy * sin, cy + dx * sin + dy * cos)
            });

            let xmin = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min).max(0.0);
            let ymin = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min).max(0.0);
            let xmax = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max).min(w);
            let ymax = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max).min(h);
            if xmax <= xmin || ymax <= ymin {
                return None;
            }

            Some(LabelRecord::from_corners(
                label.class_id,
                (xmin, ymin, xmax, ymax),
                w,
                h,
            ))
        })
        .collect()
}

/// 随机等比缩放, 归一化标签不变
pub struct RandomScale {
    pub limit: f64,
    pub p: f64,
}

impl Augmentation for RandomScale {
    fn probability(&self) -> f64 {
        self.p
    }

    fn transform(&self, mut sample: Sample, rng: &mut StdRng) -> Sample {
        let factor = 1.0 + rng.gen_range(-self.limit..=self.limit);
        let (w, h) = sample.image.dimensions();
        let nw = ((w as f64 * factor).round() as u32).max(1);
        let nh = ((h as f64 * factor).round() as u32).max(1);
        sample.image = imageops::resize(&sample.image, nw, nh, imageops::FilterType::Triangle);
        sample
    }
}

/// 按概率从若干变换中等概率选一个执行
pub struct OneOf {
    pub transforms: Vec<Box<dyn Augmentation>>,
    pub p: f64,
}

impl Augmentation for OneOf {
    fn probability(&self) -> f64 {
        self.p
    }

    fn transform(&self, sample: Sample, rng: &mut StdRng) -> Sample {
        if self.transforms.is_empty() {
            return sample;
        }
        let i = rng.gen_range(0..self.transforms.len());
        self.transforms[i].transform(sample, rng)
    }
}

/// 顺序执行的增强流水线
pub struct Compose {
    pub transforms: Vec<Box<dyn Augmentation>>,
}

impl Compose {
    pub fn new(transforms: Vec<Box<dyn Augmentation>>) -> Self {
        Self { transforms }
    }

    /// 人群计数训练用的默认流水线
    pub fn crowd_default() -> Self {
        Self::new(vec![
            Box::new(OneOf {
                transforms: vec![
                    Box::new(RandomBrightnessContrast {
                        brightness_limit: 0.2,
                        contrast_limit: 0.2,
                        p: 0.5,
                    }),
                    Box::new(HueSaturationValue {
                        hue_shift_limit: 20,
                        sat_shift_limit: 30,
                        val_shift_limit: 20,
                        p: 0.5,
                    }),
                ],
                p: 0.5,
            }),
            Box::new(HorizontalFlip { p: 0.5 }),
            Box::new(Rotate { limit: 15.0, p: 0.5 }),
            Box::new(RandomScale { limit: 0.2, p: 0.5 }),
        ])
    }

    pub fn run(&self, mut sample: Sample, rng: &mut StdRng) -> Sample {
        for t in &self.transforms {
            sample = t.apply(sample, rng);
        }
        sample
    }
}

/// 增强任务配置
#[derive(Debug, Clone)]
pub struct AugmentOptions {
    pub images: PathBuf,
    pub labels: PathBuf,
    pub out_images: PathBuf,
    pub out_labels: PathBuf,
    pub variants: usize,
    pub seed: Option<u64>,
}

/// 增强结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AugmentSummary {
    pub images: usize,
    pub skipped: usize,
    pub written: usize,
}

fn is_supported_image(path: &Path) -> bool {
    let name = file_name(path).to_lowercase();
    path.is_file() && (name.ends_with(".jpg") || name.ends_with(".png"))
}

/// 对源目录下的每张 .jpg/.png 生成 `variants` 个变体
pub fn augment_directory(options: &AugmentOptions, pipeline: &Compose) -> Result<AugmentSummary> {
    ensure_dir(&options.out_images)?;
    ensure_dir(&options.out_labels)?;

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut sources: Vec<PathBuf> = std::fs::read_dir(&options.images)
        .with_context(|| format!("failed to list {}", options.images.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_supported_image(path))
        .collect();
    sources.sort();

    let mut summary = AugmentSummary::default();
    for path in sources {
        let name = file_name(&path);
        let labels = read_label_file(&label_path_for(&name, &options.labels))?;
        let image = match image::open(&path) {
            Ok(image) => image.to_rgb8(),
            Err(e) => {
                tracing::warn!(image = %name, error = %e, "skipping unreadable image");
                summary.skipped += 1;
                continue;
            }
        };

        let stem = file_stem(&name);
        for i in 0..options.variants {
            let sample = pipeline.run(
                Sample {
                    image: image.clone(),
                    labels: labels.clone(),
                },
                &mut rng,
            );

            let img_out = options.out_images.join(format!("{stem}_aug{i}.jpg"));
            sample
                .image
                .save(&img_out)
                .with_context(|| format!("failed to write {}", img_out.display()))?;
            let lbl_out = options.out_labels.join(format!("{stem}_aug{i}.txt"));
            write_label_file(&lbl_out, &sample.labels, true)?;
            summary.written += 1;
        }

        tracing::info!(image = %name, variants = options.variants, "augmented");
        summary.images += 1;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(w: u32, h: u32, labels: Vec<LabelRecord>) -> Sample {
        Sample {
            image: RgbImage::from_pixel(w, h, Rgb([100, 150, 200])),
            labels,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_flip_mirrors_labels() {
        let mut rng = StdRng::seed_from_u64(0);
        let out = HorizontalFlip { p: 1.0 }.apply(
            sample(10, 10, vec![LabelRecord::new(0, 0.2, 0.3, 0.1, 0.1)]),
            &mut rng,
        );
        assert!(close(out.labels[0].cx, 0.8));
        assert!(close(out.labels[0].cy, 0.3));
    }

    #[test]
    fn test_probability_zero_is_identity() {
        let mut rng = StdRng::seed_from_u64(1);
        let labels = vec![LabelRecord::new(0, 0.2, 0.3, 0.1, 0.1)];
        let out = HorizontalFlip { p: 0.0 }.apply(sample(10, 10, labels.clone()), &mut rng);
        assert_eq!(out.labels, labels);
    }

    #[test]
    fn test_rotate_labels_quarter_turn() {
        // x 20..30, y 40..60 → 顺时针 90°: x' = 100 - y, y' = x
        let labels = vec![LabelRecord::new(0, 0.25, 0.5, 0.1, 0.2)];
        let out = rotate_labels(&labels, 100, 100, std::f64::consts::FRAC_PI_2);
        assert_eq!(out.len(), 1);
        assert!(close(out[0].cx, 0.5));
        assert!(close(out[0].cy, 0.25));
        assert!(close(out[0].w, 0.2));
        assert!(close(out[0].h, 0.1));
    }

    #[test]
    fn test_rotate_labels_zero_angle_is_identity() {
        let labels = vec![LabelRecord::new(3, 0.4, 0.6, 0.2, 0.3)];
        let out = rotate_labels(&labels, 64, 48, 0.0);
        assert!(close(out[0].cx, 0.4));
        assert!(close(out[0].cy, 0.6));
        assert!(close(out[0].w, 0.2));
        assert!(close(out[0].h, 0.3));
        assert_eq!(out[0].class_id, 3);
    }

    #[test]
    fn test_rotate_labels_clips_and_drops() {
        // 贴着左上角的框旋转后部分出界, 被裁剪
        let labels = vec![LabelRecord::new(0, 0.05, 0.05, 0.1, 0.1)];
        let out = rotate_labels(&labels, 100, 100, 10f64.to_radians());
        assert_eq!(out.len(), 1);
        let (x1, y1, x2, y2) = out[0].to_corners(100., 100.);
        assert!(x1 >= -1e-9 && y1 >= -1e-9 && x2 <= 100.0 && y2 <= 100.0);

        // 完全出界的框被丢弃
        let outside = vec![LabelRecord::new(0, 1.5, 1.5, 0.1, 0.1)];
        assert!(rotate_labels(&outside, 100, 100, 0.1).is_empty());
    }

    #[test]
    fn test_scale_keeps_labels() {
        let mut rng = StdRng::seed_from_u64(2);
        let labels = vec![LabelRecord::new(0, 0.5, 0.5, 0.2, 0.2)];
        let out = RandomScale { limit: 0.2, p: 1.0 }.apply(sample(100, 50, labels.clone()), &mut rng);
        let (w, h) = out.image.dimensions();
        assert!((80..=120).contains(&w));
        assert!((40..=60).contains(&h));
        assert_eq!(out.labels, labels);
    }

    #[test]
    fn test_photometric_keeps_geometry() {
        let mut rng = StdRng::seed_from_u64(3);
        let labels = vec![LabelRecord::new(0, 0.5, 0.5, 0.2, 0.2)];
        for t in [
            Box::new(RandomBrightnessContrast {
                brightness_limit: 0.2,
                contrast_limit: 0.2,
                p: 1.0,
            }) as Box<dyn Augmentation>,
            Box::new(HueSaturationValue {
                hue_shift_limit: 20,
                sat_shift_limit: 30,
                val_shift_limit: 20,
                p: 1.0,
            }),
        ] {
            let out = t.apply(sample(16, 8, labels.clone()), &mut rng);
            assert_eq!(out.image.dimensions(), (16, 8));
            assert_eq!(out.labels, labels);
        }
    }

    #[test]
    fn test_hsv_keeps_gray_pixels_gray() {
        // 饱和度只作用于偏离灰度的部分, 明度为整体加减
        let mut rng = StdRng::seed_from_u64(4);
        let hsv = HueSaturationValue {
            hue_shift_limit: 20,
            sat_shift_limit: 30,
            val_shift_limit: 20,
            p: 1.0,
        };
        for _ in 0..10 {
            let out = hsv.apply(
                Sample {
                    image: RgbImage::from_pixel(4, 4, Rgb([100, 100, 100])),
                    labels: Vec::new(),
                },
                &mut rng,
            );
            let [r, g, b] = out.image.get_pixel(0, 0).0;
            assert!(r.abs_diff(g) <= 2 && g.abs_diff(b) <= 2);
            assert!((78..=122).contains(&r));
        }
    }

    #[test]
    fn test_augment_directory_writes_variants() {
        let root = tempfile::tempdir().unwrap();
        let images = root.path().join("images");
        let labels = root.path().join("labels");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::create_dir_all(&labels).unwrap();

        RgbImage::from_pixel(32, 32, Rgb([10, 20, 30]))
            .save(images.join("a.png"))
            .unwrap();
        std::fs::write(labels.join("a.txt"), "0 0.5 0.5 0.25 0.25\n").unwrap();
        std::fs::write(images.join("notes.md"), "ignored").unwrap();

        let options = AugmentOptions {
            images,
            labels,
            out_images: root.path().join("aug_images"),
            out_labels: root.path().join("aug_labels"),
            variants: 3,
            seed: Some(7),
        };
        let summary = augment_directory(&options, &Compose::crowd_default()).unwrap();
        assert_eq!(
            summary,
            AugmentSummary {
                images: 1,
                skipped: 0,
                written: 3
            }
        );
        for i in 0..3 {
            assert!(options.out_images.join(format!("a_aug{i}.jpg")).is_file());
            let text =
                std::fs::read_to_string(options.out_labels.join(format!("a_aug{i}.txt"))).unwrap();
            assert!(text.ends_with('\n'));
            assert_eq!(text.lines().count(), 1);
        }
    }

    #[test]
    fn test_augment_directory_missing_label_fails() {
        let root = tempfile::tempdir().unwrap();
        let images = root.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        RgbImage::new(8, 8).save(images.join("b.jpg")).unwrap();

        let options = AugmentOptions {
            images,
            labels: root.path().join("labels"),
            out_images: root.path().join("out_i"),
            out_labels: root.path().join("out_l"),
            variants: 1,
            seed: Some(0),
        };
        assert!(augment_directory(&options, &Compose::crowd_default()).is_err());
    }
}
