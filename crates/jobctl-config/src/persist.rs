//! Atomic file replacement for small process-wide state files.

use jobctl_core::JobctlResult;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Writes `contents` to `path` so that concurrent readers observe either the
/// old file or the new one, never a partial write.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> JobctlResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let temp_path = temp_path_for(path);
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    debug!(path = %path.display(), bytes = contents.len(), "Replaced file");
    Ok(())
}

// The PID keeps two processes writing the same file from sharing a temp file.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(format!(".tmp.{}", std::process::id()));
    path.with_file_name(name)
}
