/// HTTP 服务 (Server)
///
/// - handlers: 四个路由的处理函数
/// - error:    错误 → HTTP 响应
///
/// 模型在启动时加载一次, 所有请求共享同一个 `WorkoutPipeline`;
/// 每个请求有自己的识别状态和临时文件
pub mod error;
pub mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::detection::WorkoutPipeline;
use crate::input::{FfmpegDecoder, VideoDecoder};
use crate::Args;

pub use error::AppError;

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub pipeline: WorkoutPipeline,
    pub decoder: Arc<dyn VideoDecoder>,
    pub default_label: String,
    pub temp_dir: Option<PathBuf>,
    pub fallback_fps: f64,
}

impl AppState {
    pub fn new(pipeline: WorkoutPipeline, decoder: Arc<dyn VideoDecoder>, args: &Args) -> Self {
        Self {
            pipeline,
            decoder,
            default_label: args.default_label.clone(),
            temp_dir: args.temp_dir.clone(),
            fallback_fps: args.fallback_fps,
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/process-video", post(handlers::process_video))
        .route("/process-frame", post(handlers::process_frame))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 加载模型并启动服务, Ctrl-C 后优雅退出
pub async fn serve(args: Args) -> Result<()> {
    args.validate()?;

    if let Some(dir) = &args.temp_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create temp dir {}", dir.display()))?;
    }

    let pipeline = tokio::task::spawn_blocking({
        let args = args.clone();
        move || WorkoutPipeline::from_args(&args)
    })
    .await??;
    info!("✅ 模型加载完成, 类别: {:?}", pipeline.labels());

    let state = AppState::new(pipeline, Arc::new(FfmpegDecoder::default()), &args);
    let app = router(state, args.max_upload_bytes());

    let listener = tokio::net::TcpListener::bind(args.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", args.bind_addr()))?;
    info!("🚀 服务启动: http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("⚠️ 无法监听 Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("收到退出信号, 等待进行中的请求完成...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::pipeline::tests::{gray_image, stub_pipeline};
    use crate::input::{DecodeStats, DecodedFrame};
    use anyhow::bail;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::io::{Cursor, Write};
    use std::path::Path;
    use tower::ServiceExt;

    const BOUNDARY: &str = "workout-test-boundary";

    /// 桩解码器: 文件中每个字节对应一帧的亮度, 0xFF 表示坏帧
    struct BytePerFrameDecoder;

    impl VideoDecoder for BytePerFrameDecoder {
        fn decode(
            &self,
            path: &Path,
            sink: &mut dyn FnMut(DecodedFrame) -> anyhow::Result<()>,
        ) -> anyhow::Result<DecodeStats> {
            let bytes = std::fs::read(path)?;
            let mut stats = DecodeStats::default();
            for (i, v) in bytes.into_iter().enumerate() {
                if v == 0xFF {
                    bail!("corrupt frame {}", i);
                }
                sink(DecodedFrame {
                    index: i as u64,
                    timestamp: None,
                    image: gray_image(v).into_rgb8(),
                })?;
                stats.total_frames += 1;
            }
            Ok(stats)
        }
    }

    fn state(temp_dir: Option<PathBuf>) -> AppState {
        AppState {
            pipeline: stub_pipeline(),
            decoder: Arc::new(BytePerFrameDecoder),
            default_label: "None".into(),
            temp_dir,
            fallback_fps: 2.0,
        }
    }

    fn app(temp_dir: Option<PathBuf>) -> Router {
        router(state(temp_dir), 1024 * 1024)
    }

    fn multipart(uri: &str, field: &str, file_name: &str, payload: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        write!(
            body,
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .unwrap();
        body.extend_from_slice(payload);
        write!(body, "\r\n--{BOUNDARY}--\r\n").unwrap();

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn png(value: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        gray_image(value)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn is_empty_dir(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_health_and_root() {
        let (status, body) = send(app(None), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "healthy" }));

        let (status, body) = send(app(None), get_req("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "API is running" }));
    }

    #[tokio::test]
    async fn test_cors_is_permissive() {
        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://example.com")
            .body(Body::empty())
            .unwrap();
        let resp = app(None).oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_process_frame() {
        let (status, body) = send(
            app(None),
            multipart("/process-frame", "frame", "frame.png", &png(230)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "workout_type": "squat" }));
    }

    #[tokio::test]
    async fn test_process_frame_without_person() {
        let (status, body) = send(
            app(None),
            multipart("/process-frame", "frame", "frame.png", &png(0)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "workout_type": "rest" }));
    }

    #[tokio::test]
    async fn test_process_frame_unreadable_image() {
        let (status, body) = send(
            app(None),
            multipart("/process-frame", "frame", "frame.jpg", b"definitely not a jpeg"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "error": "Failed to read image" }));

        let (status, body) =
            send(app(None), multipart("/process-frame", "frame", "empty.png", b"")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "error": "Failed to read image" }));
    }

    #[tokio::test]
    async fn test_process_video_last_frame_wins() {
        let (status, body) = send(
            app(None),
            multipart("/process-video", "video", "clip.mp4", &[40, 40, 230]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "workout_type": "squat" }));

        let (_, body) = send(
            app(None),
            multipart("/process-video", "video", "clip.mp4", &[230, 230, 40]),
        )
        .await;
        assert_eq!(body, json!({ "workout_type": "pushup" }));
    }

    #[tokio::test]
    async fn test_process_video_without_frames() {
        let (status, body) =
            send(app(None), multipart("/process-video", "video", "clip.mp4", b"")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "workout_type": "None" }));
    }

    #[tokio::test]
    async fn test_process_video_timeline() {
        // fallback_fps = 2: 每两帧为一秒
        let (status, body) = send(
            app(None),
            multipart(
                "/process-video?timeline=true",
                "video",
                "clip.mp4",
                &[230, 230, 40, 0],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["workout_type"], "rest");
        let seconds = body["per_second"].as_array().unwrap();
        assert_eq!(seconds.len(), 2);
        assert_eq!(seconds[0]["workout_type"], "squat");
        assert_eq!(seconds[0]["frames"], 2);
        // 平局取后出现的标签
        assert_eq!(seconds[1]["workout_type"], "rest");
    }

    #[tokio::test]
    async fn test_temp_files_removed() {
        let dir = tempfile::tempdir().unwrap();

        let (status, _) = send(
            app(Some(dir.path().to_path_buf())),
            multipart("/process-video", "video", "clip.mp4", &[230, 40]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(is_empty_dir(dir.path()));

        let (status, body) = send(
            app(Some(dir.path().to_path_buf())),
            multipart("/process-video", "video", "clip.mp4", &[230, 0xFF, 40]),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("corrupt frame"));
        assert!(is_empty_dir(dir.path()));

        let (_, body) = send(
            app(Some(dir.path().to_path_buf())),
            multipart("/process-frame", "frame", "frame.png", b"garbage"),
        )
        .await;
        assert_eq!(body, json!({ "error": "Failed to read image" }));
        assert!(is_empty_dir(dir.path()));
    }

    #[tokio::test]
    async fn test_missing_field() {
        let (status, body) = send(
            app(None),
            multipart("/process-video", "file", "clip.mp4", &[230]),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body, json!({ "error": "missing multipart field `video`" }));

        let (status, _) = send(
            app(None),
            multipart("/process-frame", "video", "frame.png", &png(230)),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_malformed_multipart() {
        let req = Request::builder()
            .method("POST")
            .uri("/process-video")
            .header(header::CONTENT_TYPE, "multipart/form-data")
            .body(Body::from("no boundary here"))
            .unwrap();
        let (status, body) = send(app(None), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_independent() {
        let app = app(None);
        let (a, b) = tokio::join!(
            send(
                app.clone(),
                multipart("/process-video", "video", "a.mp4", &[40, 40, 40, 230]),
            ),
            send(
                app.clone(),
                multipart("/process-video", "video", "b.mp4", &[230, 230, 230, 40]),
            ),
        );
        assert_eq!(a.1, json!({ "workout_type": "squat" }));
        assert_eq!(b.1, json!({ "workout_type": "pushup" }));
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let app = router(state(None), 16);
        let resp = app
            .oneshot(multipart("/process-video", "video", "clip.mp4", &[40; 64]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
