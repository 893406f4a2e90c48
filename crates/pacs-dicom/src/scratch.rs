//! 临时文件目录管理
//!
//! 压测开始和结束时清理生成器留下的文件，包括中断写入留下的 `.partial` 文件。

use crate::generator::{PARTIAL_EXTENSION, RECORD_EXTENSION};
use pacs_core::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 临时文件目录
#[derive(Debug, Clone)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// 准备临时目录，不存在时自动创建
    pub fn prepare<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;
        debug!("临时目录就绪: {:?}", path);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 删除目录下所有生成的记录文件，返回删除数量
    ///
    /// 其他文件保持不动。
    pub fn purge(&self) -> Result<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if !path.is_file() || !Self::is_generated(&path) {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                // 并发清理时文件可能已被删除
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("删除临时文件失败: {:?}, 错误: {}", path, e);
                    return Err(e.into());
                }
            }
        }

        info!("临时目录清理完成: {:?}, 删除 {} 个文件", self.path, removed);
        Ok(removed)
    }

    fn is_generated(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some(ext) if ext == RECORD_EXTENSION || ext == PARTIAL_EXTENSION
        )
    }
}
