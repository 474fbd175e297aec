/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use tracing::{debug, warn};

use super::{DecodeStats, DecodedFrame};

const MAX_DIMENSION: i32 = 8192;
const AV_NOPTS_VALUE: i64 = i64::MIN;

/// 解码统计, 解码线程写入, 调用方读取
#[derive(Debug, Default)]
pub struct FrameCounters {
    total: AtomicU64,
    dropped: AtomicU64,
}

impl FrameCounters {
    pub fn snapshot(&self) -> DecodeStats {
        DecodeStats {
            total_frames: self.total.load(Ordering::Relaxed),
            dropped_frames: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// FFmpeg解码过滤器: 视频文件 → RGB帧 (要求上游 format=rgb24)
#[derive(Clone)]
pub struct DecodeFilter {
    tx: Sender<DecodedFrame>,
    counters: Arc<FrameCounters>,
}

impl DecodeFilter {
    pub fn new(tx: Sender<DecodedFrame>, counters: Arc<FrameCounters>) -> Self {
        Self { tx, counters }
    }

    fn drop_frame(&self, index: u64, reason: &str) -> Result<Option<Frame>, String> {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        if index < 10 {
            warn!("⚠️ 丢弃帧 #{}: {}", index, reason);
        }
        Ok(None)
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        debug!("解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        let index = self.counters.total.fetch_add(1, Ordering::Relaxed);

        unsafe {
            // 基本检查：空帧或损坏帧
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                return self.drop_frame(index, "空帧/损坏帧");
            }

            let raw = &*frame.as_ptr();
            let (w, h) = (raw.width, raw.height);
            if w <= 0 || h <= 0 || w > MAX_DIMENSION || h > MAX_DIMENSION {
                return self.drop_frame(index, &format!("非法分辨率 {}x{}", w, h));
            }

            // RGB24 单平面
            let data = raw.data[0];
            let stride = raw.linesize[0];
            let row_bytes = w as usize * 3;
            if data.is_null() || stride < 0 || (stride as usize) < row_bytes {
                return self.drop_frame(index, &format!("步长异常 stride={}", stride));
            }

            let mut buffer = Vec::with_capacity(row_bytes * h as usize);
            for row in 0..h as usize {
                let src = std::slice::from_raw_parts(data.add(row * stride as usize), row_bytes);
                buffer.extend_from_slice(src);
            }
            let Some(image) = RgbImage::from_raw(w as u32, h as u32, buffer) else {
                return self.drop_frame(index, "RGB图像转换失败");
            };

            let pts = if raw.best_effort_timestamp != AV_NOPTS_VALUE {
                raw.best_effort_timestamp
            } else {
                raw.pts
            };
            let tb = raw.time_base;
            let timestamp = if pts != AV_NOPTS_VALUE && tb.num > 0 && tb.den > 0 {
                Some(pts as f64 * tb.num as f64 / tb.den as f64)
            } else {
                None
            };

            // 接收端已关闭 (识别出错), 返回错误让 FFmpeg 停止解码
            self.tx
                .send(DecodedFrame {
                    index,
                    timestamp,
                    image,
                })
                .map_err(|_| "Frame receiver closed".to_string())?;
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        let stats = self.counters.snapshot();
        debug!(
            "解码线程退出: 总帧 {} | 丢弃 {}",
            stats.total_frames, stats.dropped_frames
        );
    }
}
