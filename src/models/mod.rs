/// 模型统一接口与实现
///
/// # 架构说明
///
/// 每一帧的识别分三步, 每一步对应一个模型:
/// - **YOLOv8Pose**: 人体姿态估计, 输出关键点 (`yolov8_pose.rs`)
/// - **StandardScaler**: 关键点特征标准化 (`scaler.rs`)
/// - **OnnxWorkoutClassifier**: 动作分类 (`classifier.rs`)
///
/// 姿态估计和分类通过 trait 抽象, 测试中可替换为桩实现
///
/// ```text
/// 原始图片 → PoseEstimator → 关键点 → StandardScaler → WorkoutClassifier → 动作标签
/// ```
use anyhow::Result;
use image::DynamicImage;

use crate::Pose;

/// 姿态估计接口
pub trait PoseEstimator: Send {
    /// 返回置信度最高的人体姿态, 画面中无人时返回 `None`
    fn estimate(&mut self, image: &DynamicImage) -> Result<Option<Pose>>;

    /// 每个人体的关键点数量
    fn num_keypoints(&self) -> usize;
}

/// 动作分类接口
pub trait WorkoutClassifier: Send {
    /// 对标准化后的特征向量分类, 返回值必然属于 `labels()`
    fn predict(&mut self, features: &[f32]) -> Result<String>;

    fn labels(&self) -> &[String];
}

pub mod classifier;
pub mod scaler;
pub mod yolov8_pose;

// Re-exports
pub use classifier::{decode_prediction, load_labels, ClassEncoding, OnnxWorkoutClassifier};
pub use scaler::StandardScaler;
pub use yolov8_pose::{decode_poses, YOLOv8Pose, YOLOv8PoseConfig};
