// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 特征标准化 (与 sklearn StandardScaler 等价)
// 参数文件格式: {"mean": [...], "scale": [...]}

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl StandardScaler {
    pub fn from_parts(mean: Vec<f32>, scale: Vec<f32>) -> Result<Self> {
        if mean.len() != scale.len() {
            bail!(
                "Scaler mean/scale length mismatch: {} vs {}",
                mean.len(),
                scale.len()
            );
        }
        if mean.is_empty() {
            bail!("Scaler has no features");
        }
        // 方差为 0 的特征不缩放
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s })
            .collect();
        Ok(Self { mean, scale })
    }

    /// 从 JSON 文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scaler {}", path.display()))?;
        let raw: StandardScaler = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse scaler {}", path.display()))?;
        Self::from_parts(raw.mean, raw.scale)
    }

    /// 恒等变换, 用于未做标准化训练的分类器
    pub fn identity(dim: usize) -> Self {
        Self {
            mean: vec![0.0; dim],
            scale: vec![1.0; dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, xs: &[f32]) -> Result<Vec<f32>> {
        if xs.len() != self.dim() {
            bail!(
                "Feature length {} does not match scaler dimension {}",
                xs.len(),
                self.dim()
            );
        }
        Ok(xs
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }
}
