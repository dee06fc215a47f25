// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 训练启动器
///
/// 组装 `yolo detect train ...` 命令并等待结束, 默认开启 TensorBoard 日志.
use clap::Parser;
use crowd_zones::config::TrainArgs;
use crowd_zones::train::{write_dataset_yaml, TrainPlan};
use crowd_zones::utils::init_logging;

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = TrainArgs::parse();

    if args.write_data {
        let splits = write_dataset_yaml(&args.data, &args.data_root, &args.names)?;
        println!("📝 数据集配置: {} ({})", args.data.display(), splits.join(", "));
    }

    let plan = TrainPlan::from_args(&args)?;
    if args.dry_run {
        for cmd in plan.commands() {
            println!("{cmd}");
        }
        return Ok(());
    }

    plan.run()?;
    println!("✅ 训练完成, 结果目录: {}", plan.run_dir.display());
    if plan.settings.is_some() {
        println!("📈 tensorboard --logdir {}", plan.run_dir.display());
    }
    Ok(())
}
