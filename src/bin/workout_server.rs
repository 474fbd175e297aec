/// Workout Detection API - 健身动作识别服务
///
/// 上传视频或单帧图片, 返回识别出的健身动作
///
/// 主程序入口 - 直接运行: cargo run --bin workout-server --release
use clap::Parser;
use mimalloc::MiMalloc;
use workout_detector::{logger, server, Args};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // guard 持有到 main 结束, 保证文件日志落盘
    let _guard = logger::init(&args.log_level, args.log_dir.as_deref())?;
    tracing::info!("⚙️ 配置: {:?}", args);

    server::serve(args).await
}
