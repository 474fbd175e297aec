/// 视频文件解码器
/// Video file decoder with software decoding only
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext};
use image::DynamicImage;
use tracing::debug;

use super::decode_filter::{DecodeFilter, FrameCounters};
use super::DecodedFrame;

/// 解码统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub total_frames: u64,
    pub dropped_frames: u64,
}

/// 视频解码接口
pub trait VideoDecoder: Send + Sync {
    /// 按解码顺序逐帧回调 `sink`; `sink` 返回错误时停止解码并原样返回该错误
    fn decode(
        &self,
        path: &Path,
        sink: &mut dyn FnMut(DecodedFrame) -> Result<()>,
    ) -> Result<DecodeStats>;
}

/// FFmpeg 解码器: 解码线程 → 有界队列 → 调用方线程
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    queue_size: usize,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new(8)
    }
}

impl FfmpegDecoder {
    pub fn new(queue_size: usize) -> Self {
        Self {
            queue_size: queue_size.max(1),
        }
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn decode(
        &self,
        path: &Path,
        sink: &mut dyn FnMut(DecodedFrame) -> Result<()>,
    ) -> Result<DecodeStats> {
        if !path.is_file() {
            bail!("Video file not found: {}", path.display());
        }

        let (tx, rx) = crossbeam_channel::bounded::<DecodedFrame>(self.queue_size);
        let counters = Arc::new(FrameCounters::default());
        let filter = DecodeFilter::new(tx, counters.clone());
        let url = path.to_string_lossy().into_owned();

        // 解码线程结束时 FFmpeg 上下文连同发送端一起释放, 队列随之关闭
        let handle = std::thread::Builder::new()
            .name("video-decoder".to_string())
            .spawn(move || software_decode(&url, filter))
            .context("Failed to spawn decoder thread")?;

        let mut sink_result = Ok(());
        for frame in rx.iter() {
            if let Err(e) = sink(frame) {
                sink_result = Err(e);
                break;
            }
        }
        drop(rx);

        let decode_result = handle
            .join()
            .map_err(|_| anyhow!("Decoder thread panicked"))?;
        sink_result?;
        decode_result?;

        let stats = counters.snapshot();
        debug!("解码完成: {:?}", stats);
        Ok(stats)
    }
}

/// CPU软件解码, 输出 RGB24
fn software_decode(url: &str, filter: DecodeFilter) -> Result<()> {
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("decode", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(url)
        .filter_desc("format=rgb24")
        .output(out)
        .build()
        .map_err(|e| anyhow!("Failed to open video {}: {}", url, e))?;

    let sch = ctx
        .start()
        .map_err(|e| anyhow!("Failed to start decoding {}: {}", url, e))?;
    sch.wait()
        .map_err(|e| anyhow!("Video decoding failed: {}", e))?;
    Ok(())
}

/// 单张图片解码, 按内容识别格式
pub fn decode_image(path: &Path) -> Result<DynamicImage> {
    let image = image::ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("Failed to decode image {}", path.display()))?;
    Ok(image)
}
