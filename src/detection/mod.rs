/// 动作识别系统 (Workout Detection)
///
/// 每帧流水线: 姿态估计 → 关键点特征 → 标准化 → 分类
/// - features: 关键点 → 特征向量
/// - pipeline: 进程级共享的三段流水线
/// - timeline: 按秒聚合的动作记录
/// - session:  单次请求的状态 (帧计数、当前标签)
pub mod features;
pub mod pipeline;
pub mod session;
pub mod timeline;

pub use features::extract_keypoints;
pub use pipeline::WorkoutPipeline;
pub use session::{detect_frame, detect_video, WorkoutSession, WorkoutSummary};
pub use timeline::{SecondSummary, WorkoutTimeline};
