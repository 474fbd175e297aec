//! 请求级上传暂存

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// 上传内容写入临时文件, drop 时删除 (成功、出错、panic 均如此)
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    /// 写入临时文件, 后缀沿用上传文件名的扩展名, 便于解码器识别容器格式
    pub fn stage(bytes: &[u8], file_name: Option<&str>, dir: Option<&Path>) -> Result<Self> {
        let suffix = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();

        let mut builder = tempfile::Builder::new();
        builder.prefix("upload-").suffix(&suffix);
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("Failed to create temporary file")?;

        file.write_all(bytes)
            .and_then(|_| file.flush())
            .context("Failed to write upload to temporary file")?;

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
