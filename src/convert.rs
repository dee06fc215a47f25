// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! CSV 标注 → YOLO 标签
//!
//! 输入: `<root>/<split>/_annotations.csv`, 每行一个目标框 (角点格式)
//! 输出: `<root>/labels/<split>/<stem>.txt`, 每张图一个标签文件

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use phf::phf_map;
use serde::Deserialize;

use crate::labels::{label_path_for, write_label_file, LabelRecord};

/// 内置类别映射 (CSV 类别字符串 → 类别 ID)
static CLASS_MAP: phf::Map<&'static str, usize> = phf_map! {
    "people_counterv0 - v1 2023-05-18 6-22pm" => 0,
};

/// 类别查找表: 内置映射 + 命令行追加映射
#[derive(Debug, Clone, Default)]
pub struct ClassMap {
    extra: HashMap<String, usize>,
}

impl ClassMap {
    pub fn with_extra(extra: impl IntoIterator<Item = (String, usize)>) -> Self {
        Self {
            extra: extra.into_iter().collect(),
        }
    }

    /// 未知类别是致命错误
    pub fn lookup(&self, class: &str) -> Result<usize> {
        self.extra
            .get(class)
            .or_else(|| CLASS_MAP.get(class))
            .copied()
            .ok_or_else(|| anyhow!("unknown class '{class}' (add it with --class NAME=ID)"))
    }
}

/// CSV 中的一行
#[derive(Debug, Clone, Deserialize)]
pub struct CsvRow {
    pub filename: String,
    pub width: f64,
    pub height: f64,
    pub class: String,
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

/// 读取标注 CSV
pub fn read_rows(csv_path: &Path) -> Result<Vec<CsvRow>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;

    reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(i, row)| {
            // 表头占第 1 行
            row.with_context(|| format!("{}: malformed row {}", csv_path.display(), i + 2))
        })
        .collect()
}

/// 按文件名分组; 组按首次出现排序, 组内保持输入顺序
pub fn group_rows(rows: Vec<CsvRow>) -> Vec<(String, Vec<CsvRow>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<CsvRow>)> = Vec::new();

    for row in rows {
        match index.get(&row.filename) {
            Some(&i) => groups[i].1.push(row),
            None => {
                index.insert(row.filename.clone(), groups.len());
                groups.push((row.filename.clone(), vec![row]));
            }
        }
    }

    groups
}

/// 一张图的所有行 → 标签记录; 图片宽高取该组第一行
pub fn rows_to_labels(rows: &[CsvRow], class_map: &ClassMap) -> Result<Vec<LabelRecord>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let (w, h) = (first.width, first.height);

    rows.iter()
        .map(|r| {
            let class_id = class_map.lookup(&r.class)?;
            Ok(LabelRecord::from_corners(
                class_id,
                (r.xmin, r.ymin, r.xmax, r.ymax),
                w,
                h,
            ))
        })
        .collect()
}

/// 删除目录下旧的 .txt 标签
fn clear_stale_labels(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}

/// 转换选项
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub root: PathBuf,
    pub csv_name: String,
    pub labels_dir: PathBuf,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            csv_name: "_annotations.csv".to_string(),
            labels_dir: PathBuf::from("labels"),
        }
    }
}

/// 转换一个 split, 返回写出的标签文件数
pub fn convert_split(options: &ConvertOptions, split: &str, class_map: &ClassMap) -> Result<usize> {
    let csv_path = options.root.join(split).join(&options.csv_name);
    let out_dir = options.root.join(&options.labels_dir).join(split);

    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    clear_stale_labels(&out_dir)?;

    let groups = group_rows(read_rows(&csv_path)?);
    for (filename, rows) in &groups {
        let records = rows_to_labels(rows, class_map)
            .with_context(|| format!("{}: {}", csv_path.display(), filename))?;
        write_label_file(&label_path_for(filename, &out_dir), &records, false)?;
    }

    tracing::debug!(split, files = groups.len(), "split converted");
    Ok(groups.len())
}

/// 依次转换所有 split
pub fn convert_all(options: &ConvertOptions, splits: &[String], class_map: &ClassMap) -> Result<usize> {
    let mut total = 0;
    for split in splits {
        let n = convert_split(options, split, class_map)?;
        println!("[{split}] wrote {n} label files.");
        total += n;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASS: &str = "people_counterv0 - v1 2023-05-18 6-22pm";

    fn row(filename: &str, xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> CsvRow {
        CsvRow {
            filename: filename.to_string(),
            width: 100.,
            height: 100.,
            class: CLASS.to_string(),
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    #[test]
    fn test_class_lookup() {
        let map = ClassMap::default();
        assert_eq!(map.lookup(CLASS).unwrap(), 0);
        assert!(map.lookup("person").is_err());

        let map = ClassMap::with_extra([("person".to_string(), 3)]);
        assert_eq!(map.lookup("person").unwrap(), 3);
        assert_eq!(map.lookup(CLASS).unwrap(), 0);
    }

    #[test]
    fn test_group_rows_preserves_order() {
        let groups = group_rows(vec![
            row("b.jpg", 0., 0., 1., 1.),
            row("a.jpg", 0., 0., 2., 2.),
            row("b.jpg", 0., 0., 3., 3.),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "b.jpg");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1[1].xmax, 3.);
        assert_eq!(groups[1].0, "a.jpg");
    }

    #[test]
    fn test_rows_to_labels_unknown_class_fails() {
        let mut r = row("a.jpg", 10., 10., 30., 30.);
        r.class = "dog".to_string();
        assert!(rows_to_labels(&[r], &ClassMap::default()).is_err());
    }

    #[test]
    fn test_convert_split_writes_one_file_per_image() {
        let root = tempfile::tempdir().unwrap();
        let split_dir = root.path().join("train");
        fs::create_dir_all(&split_dir).unwrap();
        fs::write(
            split_dir.join("_annotations.csv"),
            format!(
                "filename,width,height,class,xmin,ymin,xmax,ymax\n\
                 a.jpg,100,100,{CLASS},10,10,30,30\n\
                 b.jpg,200,100,{CLASS},0,0,100,50\n\
                 a.jpg,100,100,{CLASS},50,50,70,90\n"
            ),
        )
        .unwrap();

        // 旧标签会被清理
        let out_dir = root.path().join("labels").join("train");
        fs::create_dir_all(&out_dir).unwrap();
        fs::write(out_dir.join("stale.txt"), "0 0.5 0.5 0.1 0.1").unwrap();

        let options = ConvertOptions {
            root: root.path().to_path_buf(),
            ..Default::default()
        };
        let n = convert_split(&options, "train", &ClassMap::default()).unwrap();
        assert_eq!(n, 2);

        let mut names: Vec<_> = fs::read_dir(&out_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        let a = fs::read_to_string(out_dir.join("a.txt")).unwrap();
        assert_eq!(
            a,
            "0 0.200000 0.200000 0.200000 0.200000\n0 0.600000 0.700000 0.200000 0.400000"
        );
        let b = fs::read_to_string(out_dir.join("b.txt")).unwrap();
        assert_eq!(b, "0 0.250000 0.250000 0.500000 0.500000");
    }

    #[test]
    fn test_convert_split_missing_csv_fails() {
        let root = tempfile::tempdir().unwrap();
        let options = ConvertOptions {
            root: root.path().to_path_buf(),
            ..Default::default()
        };
        assert!(convert_split(&options, "valid", &ClassMap::default()).is_err());
    }
}
