// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端
// 姿态模型与动作分类器共用

use std::path::PathBuf;

use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

/// 推理设备 (Execution Provider)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

/// 张量输出, 按元素类型区分
#[derive(Debug, Clone, PartialEq)]
pub enum OrtOutput {
    Float(Array<f32, IxDyn>),
    Int(Array<i64, IxDyn>),
    Text(Vec<String>),
}

impl OrtOutput {
    /// 数值输出转 f32, 字符串输出返回 `None`
    pub fn into_f32(self) -> Option<Array<f32, IxDyn>> {
        match self {
            OrtOutput::Float(y) => Some(y),
            OrtOutput::Int(y) => Some(y.mapv(|v| v as f32)),
            OrtOutput::Text(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OrtOutput::Float(y) => y.len(),
            OrtOutput::Int(y) => y.len(),
            OrtOutput::Text(y) => y.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: PathBuf,
    pub ep: OrtEP,
    pub intra_threads: usize,
}

pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    inputs: Vec<String>,
    outputs: Vec<String>,
    path: PathBuf,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads.max(1))?;

        // 指定的 GPU 不可用时 ONNX Runtime 会回退到 CPU
        let builder = match config.ep {
            OrtEP::CPU => builder,
            OrtEP::CUDA(device_id) => builder.with_execution_providers([
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])?,
            OrtEP::Trt(device_id) => builder.with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])?,
        };

        let session = builder
            .commit_from_file(&config.f)
            .with_context(|| format!("Failed to load ONNX model {}", config.f.display()))?;

        let inputs: Vec<String> = session.inputs.iter().map(|x| x.name.clone()).collect();
        let outputs: Vec<String> = session.outputs.iter().map(|x| x.name.clone()).collect();
        if inputs.is_empty() {
            anyhow::bail!("ONNX model {} declares no inputs", config.f.display());
        }

        info!(
            "📦 模型加载完成: {} | EP: {:?} | 输入: {:?} | 输出: {:?}",
            config.f.display(),
            config.ep,
            inputs,
            outputs
        );

        Ok(Self {
            session,
            ep: config.ep,
            inputs,
            outputs,
            path: config.f,
        })
    }

    /// 推理: 张量送入第一个输入, 按模型声明的顺序返回输出
    ///
    /// 非张量输出 (如 skl2onnx 导出的概率 map 序列) 被跳过
    pub fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Vec<OrtOutput>> {
        let input = Tensor::from_array(xs)?;
        let outputs = self
            .session
            .run(ort::inputs![self.inputs[0].as_str() => input])
            .with_context(|| format!("Inference failed: {}", self.path.display()))?;

        let mut ys = Vec::with_capacity(self.outputs.len());
        for name in self.outputs.iter() {
            let value = &outputs[name.as_str()];
            if let Ok(y) = value.try_extract_array::<f32>() {
                ys.push(OrtOutput::Float(y.to_owned()));
            } else if let Ok(y) = value.try_extract_array::<i64>() {
                ys.push(OrtOutput::Int(y.to_owned()));
            } else if let Ok((_, y)) = value.try_extract_strings() {
                ys.push(OrtOutput::Text(y));
            } else {
                debug!("跳过非张量输出: {}", name);
            }
        }
        Ok(ys)
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}
