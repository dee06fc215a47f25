// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 训练启动器
//!
//! 训练本身交给外部 `yolo` 命令行, 这里只负责组装参数、生成数据集配置并等待退出.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};

use crate::config::TrainArgs;
use crate::utils::gen_time_string;

/// 一条外部命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TrainCommand {
    pub fn run(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .with_context(|| format!("failed to launch '{}'", self.program))?;
        if !status.success() {
            bail!("'{}' exited with {}", self, status);
        }
        Ok(())
    }
}

impl std::fmt::Display for TrainCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// 训练计划: 可选的 TensorBoard 设置 + 训练命令
#[derive(Debug, Clone)]
pub struct TrainPlan {
    pub settings: Option<TrainCommand>,
    pub train: TrainCommand,
    pub run_dir: PathBuf,
}

impl TrainPlan {
    /// 数据集配置必须已存在
    pub fn from_args(args: &TrainArgs) -> Result<Self> {
        if !args.data.is_file() {
            bail!(
                "dataset config not found: {} (use --write-data to generate one)",
                args.data.display()
            );
        }

        let name = if args.timestamp {
            format!("{}_{}", args.name, gen_time_string("-"))
        } else {
            args.name.clone()
        };

        let settings = (!args.no_tensorboard).then(|| TrainCommand {
            program: args.yolo.clone(),
            args: vec!["settings".into(), "tensorboard=True".into()],
        });

        let train = TrainCommand {
            program: args.yolo.clone(),
            args: vec![
                "detect".into(),
                "train".into(),
                format!("data={}", args.data.display()),
                format!("model={}", args.model),
                format!("epochs={}", args.epochs),
                format!("imgsz={}", args.imgsz),
                format!("batch={}", args.batch),
                format!("project={}", args.project),
                format!("name={name}"),
            ],
        };

        Ok(Self {
            settings,
            train,
            run_dir: Path::new(&args.project).join(&name),
        })
    }

    pub fn commands(&self) -> impl Iterator<Item = &TrainCommand> {
        self.settings.iter().chain(std::iter::once(&self.train))
    }

    pub fn run(&self) -> Result<()> {
        for cmd in self.commands() {
            println!("🚀 {cmd}");
            cmd.run()?;
        }
        Ok(())
    }
}

/// YAML 单引号字符串, 内部单引号写两次
fn yaml_single_quoted(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// 按 `images/<split>` 布局生成数据集配置, 返回写入的 split 列表
///
/// train 与 val 必须存在, test 目录存在时才写入.
pub fn write_dataset_yaml(path: &Path, root: &Path, names: &[String]) -> Result<Vec<&'static str>> {
    if names.is_empty() {
        bail!("at least one class name is required");
    }

    let mut splits = Vec::new();
    for split in ["train", "val", "test"] {
        let dir = root.join("images").join(split);
        if dir.is_dir() {
            splits.push(split);
        } else if split != "test" {
            bail!("missing image directory {}", dir.display());
        }
    }

    let mut yaml = String::new();
    writeln!(yaml, "path: {}", yaml_single_quoted(&root.display().to_string()))?;
    for split in &splits {
        writeln!(yaml, "{split}: images/{split}")?;
    }
    writeln!(yaml, "names:")?;
    for (i, name) in names.iter().enumerate() {
        writeln!(yaml, "  {i}: {}", yaml_single_quoted(name))?;
    }

    std::fs::write(path, yaml).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(splits)
}
