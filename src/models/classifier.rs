// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 动作分类器 (ONNX)
// 输入: [1, D] 标准化关键点特征
// 输出: 第一个张量输出, 可以是类别名称、类别序号/类别值, 或各类别分数

use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array;
use tracing::info;

use crate::{Args, Embedding, OrtBackend, OrtConfig, OrtOutput};

/// 读取类别名称文件, 每行一个, 忽略空行
pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read labels {}", path.display()))?;
    let labels: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    if labels.is_empty() {
        bail!("Label file {} is empty", path.display());
    }
    Ok(labels)
}

/// 分类器整数输出的含义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ClassEncoding {
    /// 0 起始的类别序号, 对应类别文件中的第几行
    #[default]
    Index,
    /// 训练时的类别值本身 (skl2onnx 默认导出), 按文本与类别文件中的行匹配
    Value,
}

/// 模型输出 → 类别名称
///
/// 只看第一个输出:
/// - 字符串: 即类别名称, 必须出现在类别文件中
/// - 单个数值: 按 `encoding` 解释; 只有一个类别时视为该类别的分数
/// - 多个数值: 视为各类别分数 (顺序同类别文件), 取最大值
pub fn decode_prediction(
    ys: &[OrtOutput],
    labels: &[String],
    encoding: ClassEncoding,
) -> Result<String> {
    let y = ys.first().context("Classifier produced no tensor output")?;

    let class = match y {
        OrtOutput::Text(names) => {
            let name = names.first().context("Classifier output is empty")?;
            return labels
                .iter()
                .find(|l| *l == name)
                .cloned()
                .with_context(|| format!("Classifier returned unknown label {:?}", name));
        }
        OrtOutput::Int(values) => match values.len() {
            1 => values.iter().copied().next().unwrap_or_default(),
            n => return pick_top1(values.iter().map(|v| *v as f32).collect(), n, labels),
        },
        OrtOutput::Float(values) => match values.len() {
            0 => bail!("Classifier output is empty"),
            1 if labels.len() == 1 => return Ok(labels[0].clone()),
            1 => {
                let v = values.iter().copied().next().unwrap_or_default();
                if !v.is_finite() || v.fract() != 0.0 {
                    bail!("Classifier returned invalid label index {}", v);
                }
                v as i64
            }
            n => return pick_top1(values.iter().copied().collect(), n, labels),
        },
    };

    match encoding {
        ClassEncoding::Index => usize::try_from(class)
            .ok()
            .and_then(|i| labels.get(i))
            .cloned()
            .with_context(|| {
                format!("Label index {} out of range ({} labels)", class, labels.len())
            }),
        ClassEncoding::Value => {
            let text = class.to_string();
            labels
                .iter()
                .find(|l| **l == text)
                .cloned()
                .with_context(|| format!("Classifier returned unknown class value {}", class))
        }
    }
}

fn pick_top1(scores: Vec<f32>, n: usize, labels: &[String]) -> Result<String> {
    if n == 0 {
        bail!("Classifier output is empty");
    }
    if n != labels.len() {
        bail!(
            "Classifier returned {} scores but {} labels are configured",
            n,
            labels.len()
        );
    }
    let index = Embedding::new(scores)
        .top1()
        .map(|(id, _)| id)
        .unwrap_or_default();
    Ok(labels[index].clone())
}

pub struct OnnxWorkoutClassifier {
    engine: OrtBackend,
    labels: Vec<String>,
    encoding: ClassEncoding,
}

impl OnnxWorkoutClassifier {
    pub fn new(engine: OrtBackend, labels: Vec<String>, encoding: ClassEncoding) -> Self {
        Self {
            engine,
            labels,
            encoding,
        }
    }

    pub fn from_args(args: &Args) -> Result<Self> {
        let labels = load_labels(&args.labels)?;
        let engine = OrtBackend::build(OrtConfig {
            f: args.classifier_model.clone(),
            ep: args.ep(),
            intra_threads: args.intra_threads,
        })
        .context("Failed to build workout classifier")?;
        info!(
            "🏷️ 动作类别 ({}, {:?}): {:?}",
            labels.len(),
            args.class_encoding,
            labels
        );
        Ok(Self::new(engine, labels, args.class_encoding))
    }
}

impl super::WorkoutClassifier for OnnxWorkoutClassifier {
    fn predict(&mut self, features: &[f32]) -> Result<String> {
        let xs = Array::from_shape_vec((1, features.len()), features.to_vec())?.into_dyn();
        let ys = self.engine.run(xs)?;
        decode_prediction(&ys, &self.labels, self.encoding)
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}
