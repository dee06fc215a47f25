// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 离线数据增强: 每张训练图生成若干变体, 标签同步变换
use clap::Parser;
use crowd_zones::augment::{augment_directory, AugmentOptions, Compose};
use crowd_zones::config::AugmentArgs;
use crowd_zones::utils::init_logging;

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = AugmentArgs::parse();

    let options = AugmentOptions {
        images: args.images,
        labels: args.labels,
        out_images: args.out_images,
        out_labels: args.out_labels,
        variants: args.variants,
        seed: args.seed,
    };
    if let Some(seed) = options.seed {
        println!("🎲 随机种子: {}", seed);
    }

    let summary = augment_directory(&options, &Compose::crowd_default())?;
    if summary.skipped > 0 {
        println!("⚠️ 跳过 {} 张无法读取的图片", summary.skipped);
    }
    println!(
        "✅ {} 张源图, 生成 {} 个变体 → {}",
        summary.images,
        summary.written,
        options.out_images.display()
    );
    Ok(())
}
