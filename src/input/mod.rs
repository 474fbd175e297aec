/// 输入系统 (Input System)
///
/// 上传文件先落盘为临时文件, 再交给解码器
/// - StagedUpload: 请求级临时文件, 离开作用域即删除
/// - Decoder:      视频逐帧解码 (FFmpeg)
/// - Filter:       FFmpeg 帧 → RgbImage
pub mod decode_filter;
pub mod decoder;
pub mod upload;

use image::RgbImage;

pub use decode_filter::DecodeFilter;
pub use decoder::{decode_image, DecodeStats, FfmpegDecoder, VideoDecoder};
pub use upload::StagedUpload;

/// 解码帧 (解码线程 → 识别线程)
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    pub index: u64,        // 帧序号 (含被丢弃的帧)
    pub timestamp: Option<f64>, // 展示时间 (秒)
    pub image: RgbImage,
}
