//! 按秒聚合的动作记录

use serde::Serialize;

/// 某一秒内的主要动作
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecondSummary {
    pub second: u64,
    pub workout_type: String,
    pub frames: usize,
}

/// 逐帧标签 → 每秒一条记录
///
/// 帧优先使用解码器给出的时间戳, 缺失时按 `fallback_fps` 由帧序号推算。
/// 每秒取出现次数最多的标签, 次数相同取该秒内最后出现的
#[derive(Debug, Clone)]
pub struct WorkoutTimeline {
    fallback_fps: f64,
    current: Option<u64>,
    // (标签, 次数, 最后出现的位置)
    counts: Vec<(String, usize, usize)>,
    frames_in_second: usize,
    seconds: Vec<SecondSummary>,
}

impl WorkoutTimeline {
    pub fn new(fallback_fps: f64) -> Self {
        let fallback_fps = if fallback_fps.is_finite() && fallback_fps > 0.0 {
            fallback_fps
        } else {
            30.0
        };
        Self {
            fallback_fps,
            current: None,
            counts: Vec::new(),
            frames_in_second: 0,
            seconds: Vec::new(),
        }
    }

    pub fn second_of(&self, frame_index: u64, timestamp: Option<f64>) -> u64 {
        match timestamp {
            Some(t) if t.is_finite() => t.max(0.0).floor() as u64,
            _ => (frame_index as f64 / self.fallback_fps).floor() as u64,
        }
    }

    pub fn push(&mut self, frame_index: u64, timestamp: Option<f64>, label: &str) {
        let second = self.second_of(frame_index, timestamp);
        if self.current.is_some_and(|s| s != second) {
            self.close();
        }
        self.current = Some(second);

        let position = self.frames_in_second;
        self.frames_in_second += 1;
        match self.counts.iter_mut().find(|(l, _, _)| l == label) {
            Some(entry) => {
                entry.1 += 1;
                entry.2 = position;
            }
            None => self.counts.push((label.to_string(), 1, position)),
        }
    }

    fn close(&mut self) {
        let Some(second) = self.current.take() else {
            return;
        };
        if let Some((label, _, _)) = self
            .counts
            .iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)))
        {
            self.seconds.push(SecondSummary {
                second,
                workout_type: label.clone(),
                frames: self.frames_in_second,
            });
        }
        self.counts.clear();
        self.frames_in_second = 0;
    }

    pub fn finish(mut self) -> Vec<SecondSummary> {
        self.close();
        self.seconds
    }
}
