//! 单帧识别流水线 (进程级共享)

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{bail, Context, Result};
use image::{DynamicImage, GenericImageView};

use super::features::extract_keypoints;
use crate::models::{
    OnnxWorkoutClassifier, PoseEstimator, StandardScaler, WorkoutClassifier, YOLOv8Pose,
};
use crate::Args;

/// 姿态估计 → 特征 → 标准化 → 分类
///
/// 模型启动时加载一次, 之后只读; clone 只复制句柄。
/// ONNX Runtime 推理需要独占 session, 并发请求在各模型的锁上排队。
/// 推理不修改模型状态, 某个请求 panic 后锁中毒也照常取用
#[derive(Clone)]
pub struct WorkoutPipeline {
    pose: Arc<Mutex<Box<dyn PoseEstimator>>>,
    scaler: Arc<StandardScaler>,
    classifier: Arc<Mutex<Box<dyn WorkoutClassifier>>>,
    labels: Arc<Vec<String>>,
    nk: usize,
}

impl WorkoutPipeline {
    pub fn new(
        pose: Box<dyn PoseEstimator>,
        scaler: StandardScaler,
        classifier: Box<dyn WorkoutClassifier>,
    ) -> Result<Self> {
        let nk = pose.num_keypoints();
        if scaler.dim() != nk * 3 {
            bail!(
                "Scaler expects {} features but the pose model yields {} ({} keypoints × 3)",
                scaler.dim(),
                nk * 3,
                nk
            );
        }
        let labels = classifier.labels().to_vec();
        if labels.is_empty() {
            bail!("Classifier has no labels");
        }

        Ok(Self {
            pose: Arc::new(Mutex::new(pose)),
            scaler: Arc::new(scaler),
            classifier: Arc::new(Mutex::new(classifier)),
            labels: Arc::new(labels),
            nk,
        })
    }

    /// 按服务配置加载全部模型
    pub fn from_args(args: &Args) -> Result<Self> {
        let pose = YOLOv8Pose::from_args(args)?;
        pose.summary();
        let scaler = StandardScaler::load(&args.scaler)?;
        let classifier = OnnxWorkoutClassifier::from_args(args)?;
        Self::new(Box::new(pose), scaler, Box::new(classifier))
    }

    /// 单帧分类, 返回值必然属于 `labels()`
    pub fn classify(&self, image: &DynamicImage) -> Result<String> {
        let (width, height) = image.dimensions();

        let pose = {
            let mut model = self.pose.lock().unwrap_or_else(PoisonError::into_inner);
            model.estimate(image).context("Pose estimation failed")?
        };

        let features = extract_keypoints(pose.as_ref(), width, height, self.nk);
        let features = self.scaler.transform(&features)?;

        let label = {
            let mut model = self.classifier.lock().unwrap_or_else(PoisonError::into_inner);
            model.predict(&features).context("Classification failed")?
        };

        if !self.labels.contains(&label) {
            bail!("Classifier returned unknown label {:?}", label);
        }
        Ok(label)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}
