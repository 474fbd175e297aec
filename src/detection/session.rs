//! 单次请求的识别状态

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info};

use super::pipeline::WorkoutPipeline;
use super::timeline::{SecondSummary, WorkoutTimeline};
use crate::input::VideoDecoder;

/// 请求结束时的识别结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutSummary {
    pub workout_type: String,
    pub frames: u64,
    pub per_second: Vec<SecondSummary>,
}

/// 每个请求新建一个, 请求之间不共享
///
/// 当前标签初始为默认标签, 每识别一帧即被覆盖 (最后一帧为准)
pub struct WorkoutSession {
    current: String,
    frames: u64,
    timeline: WorkoutTimeline,
}

impl WorkoutSession {
    pub fn new(default_label: impl Into<String>, fallback_fps: f64) -> Self {
        Self {
            current: default_label.into(),
            frames: 0,
            timeline: WorkoutTimeline::new(fallback_fps),
        }
    }

    pub fn observe(&mut self, label: String, frame_index: u64, timestamp: Option<f64>) {
        self.timeline.push(frame_index, timestamp, &label);
        self.current = label;
        self.frames += 1;
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn finish(self) -> WorkoutSummary {
        let per_second = self.timeline.finish();
        debug!("按秒统计: {:?}", per_second);
        WorkoutSummary {
            workout_type: self.current,
            frames: self.frames,
            per_second,
        }
    }
}

/// 单张图片识别
pub fn detect_frame(
    pipeline: &WorkoutPipeline,
    image: &DynamicImage,
    default_label: &str,
) -> Result<WorkoutSummary> {
    let mut session = WorkoutSession::new(default_label, 1.0);
    let label = pipeline.classify(image)?;
    session.observe(label, 0, Some(0.0));
    Ok(session.finish())
}

/// 视频逐帧识别, 返回最后一帧的标签
///
/// 任意一帧出错即中止整个视频, 不返回部分结果
pub fn detect_video(
    pipeline: &WorkoutPipeline,
    decoder: &dyn VideoDecoder,
    path: &Path,
    default_label: &str,
    fallback_fps: f64,
) -> Result<WorkoutSummary> {
    let start = Instant::now();
    let mut session = WorkoutSession::new(default_label, fallback_fps);

    let stats = decoder.decode(path, &mut |frame| {
        let index = frame.index;
        let timestamp = frame.timestamp;
        let image = DynamicImage::ImageRgb8(frame.image);
        let label = pipeline
            .classify(&image)
            .with_context(|| format!("Failed to classify frame {}", index))?;
        debug!("帧 #{} ({:?}s): {}", index, timestamp, label);
        session.observe(label, index, timestamp);
        Ok(())
    })?;

    let summary = session.finish();
    info!(
        "🎬 视频识别完成: {} 帧 (丢弃 {}) | 结果: {} | 耗时 {:.1}ms",
        summary.frames,
        stats.dropped_frames,
        summary.workout_type,
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::pipeline::tests::{gray_image, stub_pipeline};
    use crate::input::{DecodeStats, DecodedFrame};
    use anyhow::bail;

    /// 桩解码器: 按给定亮度序列产生帧, 可在指定帧后报错
    struct SequenceDecoder {
        values: Vec<u8>,
        fail_after: Option<usize>,
    }

    impl VideoDecoder for SequenceDecoder {
        fn decode(
            &self,
            _path: &Path,
            sink: &mut dyn FnMut(DecodedFrame) -> Result<()>,
        ) -> Result<DecodeStats> {
            let mut stats = DecodeStats::default();
            for (i, v) in self.values.iter().enumerate() {
                if self.fail_after == Some(i) {
                    bail!("corrupt packet at frame {}", i);
                }
                sink(DecodedFrame {
                    index: i as u64,
                    timestamp: None,
                    image: gray_image(*v).into_rgb8(),
                })?;
                stats.total_frames += 1;
            }
            Ok(stats)
        }
    }

    #[test]
    fn test_session_starts_with_default() {
        let session = WorkoutSession::new("None", 30.0);
        assert_eq!(session.current(), "None");
        let summary = session.finish();
        assert_eq!(summary.workout_type, "None");
        assert_eq!(summary.frames, 0);
        assert!(summary.per_second.is_empty());
    }

    #[test]
    fn test_last_frame_wins() {
        let pipeline = stub_pipeline();
        let decoder = SequenceDecoder {
            values: vec![230, 230, 230, 40],
            fail_after: None,
        };
        let summary = detect_video(&pipeline, &decoder, Path::new("x.mp4"), "None", 30.0).unwrap();
        assert_eq!(summary.workout_type, "pushup");
        assert_eq!(summary.frames, 4);
        // 同一秒内 squat 占多数, 但返回值不受影响
        assert_eq!(summary.per_second[0].workout_type, "squat");
    }

    #[test]
    fn test_empty_video_returns_default() {
        let pipeline = stub_pipeline();
        let decoder = SequenceDecoder {
            values: vec![],
            fail_after: None,
        };
        let summary = detect_video(&pipeline, &decoder, Path::new("x.mp4"), "None", 30.0).unwrap();
        assert_eq!(summary.workout_type, "None");
    }

    #[test]
    fn test_decode_error_aborts() {
        let pipeline = stub_pipeline();
        let decoder = SequenceDecoder {
            values: vec![230, 40, 230],
            fail_after: Some(2),
        };
        assert!(detect_video(&pipeline, &decoder, Path::new("x.mp4"), "None", 30.0).is_err());
    }

    #[test]
    fn test_detect_frame() {
        let pipeline = stub_pipeline();
        let summary = detect_frame(&pipeline, &gray_image(230), "None").unwrap();
        assert_eq!(summary.workout_type, "squat");
        assert_eq!(summary.frames, 1);
    }
}
