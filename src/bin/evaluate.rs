// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 计数误差评估
///
/// 真值来自 JSON 或标签目录; 预测来自检测器或已有的分区计数 JSON.
use clap::Parser;
use crowd_zones::build_detector;
use crowd_zones::config::{EvalArgs, EVAL_MAX_DET};
use crowd_zones::counting::{read_report, CountOptions};
use crowd_zones::evaluate::{
    counts_from_report, ground_truth_from_json, ground_truth_from_labels, predict_counts,
    EvalReport,
};
use crowd_zones::utils::init_logging;

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = EvalArgs::parse();

    let gt = match (&args.ground_truth, &args.labels) {
        (Some(path), _) => ground_truth_from_json(path)?,
        (None, Some(labels)) => ground_truth_from_labels(labels, &args.images)?,
        (None, None) => anyhow::bail!("either --ground-truth or --labels is required"),
    };
    println!("📋 真值: {} 张图片", gt.len());

    let predicted = match &args.counts {
        Some(path) => counts_from_report(&read_report(path)?),
        None => {
            let model = args.model.clone().with_default_max_det(EVAL_MAX_DET);
            let mut detector = build_detector(&model)?;
            let options = CountOptions {
                resize: args.resize,
                tta: args.tta,
                overlap: model.overlap,
            };
            predict_counts(&mut *detector, &args.images, &gt, &options)?
        }
    };

    let report = EvalReport::from_counts(&gt, &predicted)?;
    println!("Final total count error on validation: {}", report.total_abs_error);
    println!("📊 平均绝对误差: {:.3}", report.mean_abs_error);

    if let Some(output) = &args.output {
        report.save(output)?;
        println!("💾 报告已写入 {}", output.display());
    }
    Ok(())
}
