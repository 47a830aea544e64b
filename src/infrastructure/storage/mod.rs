mod fs;
#[cfg(test)]
mod memory;

pub use fs::*;
#[cfg(test)]
pub use memory::*;

use std::path;

use anyhow::Result;
use tokio::fs as tokio_fs;
use uuid::Uuid;

/// Writes through a sibling temp file and a rename so readers never see a
/// partially written document.
pub async fn write_atomic(target: &path::Path, body: &str) -> Result<()> {
    let parent = target.parent().unwrap_or_else(|| return path::Path::new("."));
    if !parent.exists() {
        tokio_fs::create_dir_all(parent).await?;
    }

    let file_name = target
        .file_name()
        .map(|e| return e.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp = parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

    tokio_fs::write(&temp, body).await?;
    if let Err(err) = tokio_fs::rename(&temp, target).await {
        let _ = tokio_fs::remove_file(&temp).await;
        return Err(err.into());
    }

    return Ok(());
}
