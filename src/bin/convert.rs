// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// CSV 标注 → YOLO 标签
///
/// 每个 split 读取 `<root>/<split>/_annotations.csv`,
/// 为每张图片写出 `<root>/labels/<split>/<stem>.txt`.
use clap::Parser;
use crowd_zones::config::ConvertArgs;
use crowd_zones::convert::{convert_all, ClassMap, ConvertOptions};
use crowd_zones::utils::init_logging;

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = ConvertArgs::parse();

    let options = ConvertOptions {
        root: args.root,
        csv_name: args.csv_name,
        labels_dir: args.labels_dir,
    };
    let class_map = ClassMap::with_extra(args.classes);

    println!("📂 数据集: {}", options.root.display());
    let total = convert_all(&options, &args.splits, &class_map)?;
    println!("✅ 共写出 {} 个标签文件", total);
    Ok(())
}
