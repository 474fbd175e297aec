//! 日志初始化
//!
//! 控制台始终输出; 指定日志目录时同时按天轮转写入文件

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "workout-server.log";

/// 构造过滤器, `RUST_LOG` 优先于命令行级别
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level {:?}", level)),
    }
}

/// 安装全局 subscriber
///
/// 返回的 guard 需要保持到进程退出, 否则文件日志可能丢失尾部
pub fn init(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(level)?;
    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ));

    let (writer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log dir {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (BoxMakeWriter::new(std::io::stdout.and(non_blocking)), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_timer(timer)
        .with_target(false)
        .with_ansi(log_dir.is_none())
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    if let Some(dir) = log_dir {
        tracing::info!("📝 日志文件位置: {}", dir.join(LOG_FILE).display());
    }
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_rejected() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(env_filter("info").is_ok());
            assert!(env_filter("workout_detector=debug,warn").is_ok());
            assert!(env_filter("[[[").is_err());
        }
    }
}
