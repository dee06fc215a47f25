// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 分区人数统计
///
/// 对目录下每张图片做检测 (可选水平翻转 TTA), 按 2×2 分区计数并写出 JSON.
use clap::Parser;
use crowd_zones::build_detector;
use crowd_zones::config::CountArgs;
use crowd_zones::counting::{count_directory, write_report, CountOptions};
use crowd_zones::utils::init_logging;

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = CountArgs::parse();
    let output = args.output_path();

    println!("🚀 分区计数启动");
    println!("📹 输入目录: {}", args.input.display());
    if args.tta {
        println!("🔁 TTA: 原图 + 水平翻转");
    }

    let mut detector = build_detector(&args.model)?;
    let options = CountOptions {
        resize: args.resize,
        tta: args.tta,
        overlap: args.model.overlap,
    };

    let t = std::time::Instant::now();
    let report = count_directory(&mut *detector, &args.input, &options)?;
    write_report(&output, &report)?;

    println!(
        "✅ {} 张图片, 耗时 {:.1?}, 结果已写入 {}",
        report.len(),
        t.elapsed(),
        output.display()
    );
    Ok(())
}
