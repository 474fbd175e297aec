/// 服务配置参数 (命令行 + 环境变量)
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use crate::{ClassEncoding, OrtEP};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "健身动作识别服务 - Workout detection API", long_about = None)]
pub struct Args {
    /// 监听地址
    #[arg(long, env = "WORKOUT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// 监听端口
    #[arg(short, long, env = "WORKOUT_PORT", default_value_t = 8000)]
    pub port: u16,

    /// YOLOv8-pose ONNX 模型
    #[arg(long, env = "WORKOUT_POSE_MODEL", default_value = "models/yolov8n-pose.onnx")]
    pub pose_model: PathBuf,

    /// 动作分类器 ONNX 模型
    #[arg(long, env = "WORKOUT_CLASSIFIER_MODEL", default_value = "models/workout_classifier.onnx")]
    pub classifier_model: PathBuf,

    /// 特征标准化参数 (JSON: mean / scale)
    #[arg(long, env = "WORKOUT_SCALER", default_value = "models/scaler.json")]
    pub scaler: PathBuf,

    /// 类别名称, 每行一个
    #[arg(long, env = "WORKOUT_LABELS", default_value = "models/workout_labels.txt")]
    pub labels: PathBuf,

    /// 分类器整数输出的含义: index (类别文件行号) 或 value (训练时的类别值)
    #[arg(
        long,
        env = "WORKOUT_CLASS_ENCODING",
        value_enum,
        default_value_t = ClassEncoding::Index
    )]
    pub class_encoding: ClassEncoding,

    /// 未识别到动作时返回的标签
    #[arg(long, env = "WORKOUT_DEFAULT_LABEL", default_value = "None")]
    pub default_label: String,

    /// 人体检测置信度阈值
    #[arg(long, env = "WORKOUT_CONF", default_value_t = 0.25)]
    pub conf: f32,

    /// 关键点置信度阈值
    #[arg(long, env = "WORKOUT_KCONF", default_value_t = 0.5)]
    pub kconf: f32,

    /// NMS IoU 阈值
    #[arg(long, env = "WORKOUT_IOU", default_value_t = 0.45)]
    pub iou: f32,

    /// 姿态模型输入尺寸
    #[arg(long, env = "WORKOUT_IMGSZ", default_value_t = 640)]
    pub imgsz: u32,

    /// 关键点数量
    #[arg(long, env = "WORKOUT_NK", default_value_t = 17)]
    pub nk: u32,

    /// 姿态模型类别数
    #[arg(long, env = "WORKOUT_NC", default_value_t = 1)]
    pub nc: u32,

    #[arg(long, env = "WORKOUT_CUDA")]
    pub cuda: bool,

    #[arg(long, env = "WORKOUT_TRT")]
    pub trt: bool,

    #[arg(long, env = "WORKOUT_DEVICE_ID", default_value_t = 0)]
    pub device_id: i32,

    /// ONNX Runtime 算子内线程数
    #[arg(long, env = "WORKOUT_INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// 单次上传大小上限 (MB)
    #[arg(long, env = "WORKOUT_MAX_UPLOAD_MB", default_value_t = 256)]
    pub max_upload_mb: usize,

    /// 上传文件暂存目录, 默认使用系统临时目录
    #[arg(long, env = "WORKOUT_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// 视频帧缺少时间戳时按此帧率划分秒
    #[arg(long, env = "WORKOUT_FALLBACK_FPS", default_value_t = 30.0)]
    pub fallback_fps: f64,

    /// 日志级别 (RUST_LOG 优先)
    #[arg(long, env = "WORKOUT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// 日志目录, 设置后按天轮转写入文件
    #[arg(long, env = "WORKOUT_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("--conf", self.conf), ("--kconf", self.kconf), ("--iou", self.iou)] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{name} must be within [0, 1], got {value}");
            }
        }
        if self.imgsz == 0 {
            bail!("--imgsz must be positive");
        }
        if self.nk == 0 {
            bail!("--nk must be positive");
        }
        if self.nc == 0 {
            bail!("--nc must be positive");
        }
        if self.max_upload_mb == 0 {
            bail!("--max-upload-mb must be positive");
        }
        if !(self.fallback_fps.is_finite() && self.fallback_fps > 0.0) {
            bail!("--fallback-fps must be a positive number");
        }
        if self.cuda && self.trt {
            bail!("--cuda and --trt are mutually exclusive");
        }
        Ok(())
    }

    pub fn ep(&self) -> OrtEP {
        if self.trt {
            OrtEP::Trt(self.device_id)
        } else if self.cuda {
            OrtEP::CUDA(self.device_id)
        } else {
            OrtEP::CPU
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let args = Args::try_parse_from(["workout-server"]).unwrap();
        assert_eq!(args.port, 8000);
        assert_eq!(args.default_label, "None");
        assert_eq!(args.bind_addr(), "0.0.0.0:8000");
        assert_eq!(args.ep(), OrtEP::CPU);
        args.validate().unwrap();
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let args = Args::try_parse_from(["workout-server", "--conf", "1.5"]).unwrap();
        let err = args.validate().unwrap_err();
        assert!(err.to_string().contains("--conf"));
    }

    #[test]
    fn test_cuda_and_trt_exclusive() {
        let args = Args::try_parse_from(["workout-server", "--cuda", "--trt"]).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_class_encoding_flag() {
        let args = Args::try_parse_from(["workout-server"]).unwrap();
        assert_eq!(args.class_encoding, ClassEncoding::Index);
        let args = Args::try_parse_from(["workout-server", "--class-encoding", "value"]).unwrap();
        assert_eq!(args.class_encoding, ClassEncoding::Value);
    }

    #[test]
    fn test_trt_selects_device() {
        let args = Args::try_parse_from(["workout-server", "--trt", "--device-id", "1"]).unwrap();
        assert_eq!(args.ep(), OrtEP::Trt(1));
    }
}
