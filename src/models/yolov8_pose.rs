// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8-pose 姿态估计模型
// 包含: 模型加载、预处理、推理、后处理

use anyhow::{bail, Context, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::{s, Array, ArrayView2, Axis, Ix2, IxDyn};
use tracing::info;

use crate::{non_max_suppression, Args, Bbox, OrtBackend, OrtConfig, OrtOutput, Point2, Pose};

const CXYWH_OFFSET: usize = 4;
const KPT_STEP: usize = 3;
const PAD_VALUE: f32 = 144.0 / 255.0;

/// YOLOv8-pose 配置
#[derive(Debug, Clone)]
pub struct YOLOv8PoseConfig {
    pub nc: usize,
    pub nk: usize,
    pub conf: f32,
    pub kconf: f32,
    pub iou: f32,
    pub width: u32,
    pub height: u32,
}

impl Default for YOLOv8PoseConfig {
    fn default() -> Self {
        Self {
            nc: 1,  // 仅 person
            nk: 17, // COCO 关键点
            conf: 0.25,
            kconf: 0.5,
            iou: 0.45,
            width: 640,
            height: 640,
        }
    }
}

impl From<&Args> for YOLOv8PoseConfig {
    fn from(args: &Args) -> Self {
        Self {
            nc: args.nc as usize,
            nk: args.nk as usize,
            conf: args.conf,
            kconf: args.kconf,
            iou: args.iou,
            width: args.imgsz,
            height: args.imgsz,
        }
    }
}

impl YOLOv8PoseConfig {
    /// 每个候选框的输出通道数: cxcywh + 类别分数 + 关键点
    pub fn channels(&self) -> usize {
        CXYWH_OFFSET + self.nc + KPT_STEP * self.nk
    }
}

/// YOLOv8-pose 完整模型结构
pub struct YOLOv8Pose {
    engine: OrtBackend,
    config: YOLOv8PoseConfig,
}

impl YOLOv8Pose {
    pub fn new(engine: OrtBackend, config: YOLOv8PoseConfig) -> Self {
        Self { engine, config }
    }

    /// 从服务配置加载模型
    pub fn from_args(args: &Args) -> Result<Self> {
        let engine = OrtBackend::build(OrtConfig {
            f: args.pose_model.clone(),
            ep: args.ep(),
            intra_threads: args.intra_threads,
        })
        .context("Failed to build pose model")?;
        Ok(Self::new(engine, YOLOv8PoseConfig::from(args)))
    }

    fn scale_wh(&self, w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
        let r = (w1 / w0).min(h1 / h0);
        (r, (w0 * r).round(), (h0 * r).round())
    }

    /// 预处理: 等比缩放贴左上角, 其余区域填充灰色, 输出 NCHW
    pub fn preprocess(&self, x: &DynamicImage) -> Result<Array<f32, IxDyn>> {
        let (w0, h0) = x.dimensions();
        if w0 == 0 || h0 == 0 {
            bail!("Empty image: {}x{}", w0, h0);
        }

        let (width, height) = (self.config.width as usize, self.config.height as usize);
        let mut ys = Array::from_elem((1, 3, height, width), PAD_VALUE).into_dyn();

        let (_, w_new, h_new) = self.scale_wh(
            w0 as f32,
            h0 as f32,
            self.config.width as f32,
            self.config.height as f32,
        );
        let img = x
            .resize_exact(
                (w_new as u32).max(1),
                (h_new as u32).max(1),
                image::imageops::FilterType::Triangle,
            )
            .into_rgb8();

        for (x, y, rgb) in img.enumerate_pixels() {
            let x = x as usize;
            let y = y as usize;
            if x >= width || y >= height {
                continue;
            }
            let [r, g, b] = rgb.0;
            ys[[0, 0, y, x]] = (r as f32) / 255.0;
            ys[[0, 1, y, x]] = (g as f32) / 255.0;
            ys[[0, 2, y, x]] = (b as f32) / 255.0;
        }

        Ok(ys)
    }

    /// 完整推理流程: preprocess → run → postprocess
    pub fn run(&mut self, x: &DynamicImage) -> Result<Vec<Pose>> {
        let xs = self.preprocess(x)?;
        let preds = self
            .engine
            .run(xs)?
            .into_iter()
            .next()
            .and_then(OrtOutput::into_f32)
            .context("Pose model produced no numeric tensor output")?;

        if preds.ndim() != 3 || preds.shape()[0] == 0 {
            bail!("Unexpected pose output shape {:?}", preds.shape());
        }
        if preds.shape()[1] != self.config.channels() {
            bail!(
                "Pose output has {} channels, expected {} (nc={}, nk={})",
                preds.shape()[1],
                self.config.channels(),
                self.config.nc,
                self.config.nk
            );
        }

        let anchor = preds
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .context("Pose output is not 2D per batch")?;
        let (w0, h0) = x.dimensions();
        Ok(decode_poses(anchor, &self.config, w0 as f32, h0 as f32))
    }

    pub fn summary(&self) {
        info!(
            "🦴 姿态模型: {} | EP: {:?} | 输入: {}x{} | nc: {}, nk: {}, conf: {}, kconf: {}, iou: {}",
            self.engine.path().display(),
            self.engine.ep(),
            self.config.width,
            self.config.height,
            self.config.nc,
            self.config.nk,
            self.config.conf,
            self.config.kconf,
            self.config.iou,
        );
    }
}

impl super::PoseEstimator for YOLOv8Pose {
    fn estimate(&mut self, image: &DynamicImage) -> Result<Option<Pose>> {
        // NMS 之后按置信度降序, 第一个即最可信的人
        Ok(self.run(image)?.into_iter().next())
    }

    fn num_keypoints(&self) -> usize {
        self.config.nk
    }
}

/// 后处理: 原始输出 `[channels, anchors]` → 原图坐标下的姿态, 按置信度降序
pub fn decode_poses(
    preds: ArrayView2<f32>,
    config: &YOLOv8PoseConfig,
    width_original: f32,
    height_original: f32,
) -> Vec<Pose> {
    let ratio = (config.width as f32 / width_original).min(config.height as f32 / height_original);
    let kpt_offset = CXYWH_OFFSET + config.nc;

    let mut data: Vec<(Bbox, Vec<Point2>)> = Vec::new();
    for pred in preds.axis_iter(Axis(1)) {
        let bbox = pred.slice(s![0..CXYWH_OFFSET]);
        let clss = pred.slice(s![CXYWH_OFFSET..kpt_offset]);
        let kpts = pred.slice(s![kpt_offset..kpt_offset + KPT_STEP * config.nk]);

        let Some((id, confidence)) = clss
            .iter()
            .copied()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };

        if confidence < config.conf {
            continue;
        }

        let cx = bbox[0] / ratio;
        let cy = bbox[1] / ratio;
        let w = bbox[2] / ratio;
        let h = bbox[3] / ratio;
        let x = cx - w / 2.;
        let y = cy - h / 2.;
        let y_bbox = Bbox::new(
            x.max(0.0f32).min(width_original),
            y.max(0.0f32).min(height_original),
            w,
            h,
            id,
            confidence,
        );

        let mut y_kpts = Vec::with_capacity(config.nk);
        for i in 0..config.nk {
            let kx = kpts[KPT_STEP * i] / ratio;
            let ky = kpts[KPT_STEP * i + 1] / ratio;
            let kconf = kpts[KPT_STEP * i + 2];
            if kconf < config.kconf {
                y_kpts.push(Point2::default());
            } else {
                y_kpts.push(Point2::new_with_conf(
                    kx.max(0.0f32).min(width_original),
                    ky.max(0.0f32).min(height_original),
                    kconf,
                ));
            }
        }

        data.push((y_bbox, y_kpts));
    }

    non_max_suppression(&mut data, config.iou);

    data.into_iter()
        .map(|(bbox, keypoints)| Pose { bbox, keypoints })
        .collect()
}
