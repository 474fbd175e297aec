//! 路由处理函数

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{AppError, AppState};
use crate::detection::{detect_frame, detect_video, SecondSummary, WorkoutSummary};
use crate::input::{decode_image, StagedUpload};

pub const FRAME_READ_ERROR: &str = "Failed to read image";

#[derive(Debug, Default, Deserialize)]
pub struct VideoQuery {
    /// 附带按秒统计
    #[serde(default)]
    pub timeline: bool,
}

#[derive(Debug, Serialize)]
pub struct WorkoutResponse {
    pub workout_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_second: Option<Vec<SecondSummary>>,
}

struct Upload {
    file_name: Option<String>,
    bytes: Bytes,
}

async fn read_field(multipart: &mut Multipart, name: &'static str) -> Result<Upload, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(name) {
            let file_name = field.file_name().map(str::to_owned);
            let bytes = field.bytes().await?;
            return Ok(Upload { file_name, bytes });
        }
    }
    Err(AppError::MissingField(name))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "API is running" }))
}

pub async fn process_video(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<WorkoutResponse>, AppError> {
    let upload = read_field(&mut multipart?, "video").await?;
    let start = Instant::now();
    let size = upload.bytes.len();

    // 解码与推理是 CPU 密集的同步任务, 放到阻塞线程池
    let summary = tokio::task::spawn_blocking(move || -> anyhow::Result<WorkoutSummary> {
        let staged = StagedUpload::stage(
            &upload.bytes,
            upload.file_name.as_deref(),
            state.temp_dir.as_deref(),
        )?;
        detect_video(
            &state.pipeline,
            state.decoder.as_ref(),
            staged.path(),
            &state.default_label,
            state.fallback_fps,
        )
    })
    .await??;

    info!(
        "POST /process-video | {} 字节 | {} 帧 | {} | {:.1}ms",
        size,
        summary.frames,
        summary.workout_type,
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(Json(WorkoutResponse {
        workout_type: summary.workout_type,
        per_second: query.timeline.then_some(summary.per_second),
    }))
}

pub async fn process_frame(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let upload = read_field(&mut multipart?, "frame").await?;
    let start = Instant::now();

    let summary = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<WorkoutSummary>> {
        let staged = StagedUpload::stage(
            &upload.bytes,
            upload.file_name.as_deref(),
            state.temp_dir.as_deref(),
        )?;
        let image = match decode_image(staged.path()) {
            Ok(image) => image,
            Err(e) => {
                warn!("⚠️ 图片解码失败: {:#}", e);
                return Ok(None);
            }
        };
        detect_frame(&state.pipeline, &image, &state.default_label).map(Some)
    })
    .await??;

    let Some(summary) = summary else {
        return Ok(Json(json!({ "error": FRAME_READ_ERROR })).into_response());
    };

    info!(
        "POST /process-frame | {} | {:.1}ms",
        summary.workout_type,
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(Json(WorkoutResponse {
        workout_type: summary.workout_type,
        per_second: None,
    })
    .into_response())
}
