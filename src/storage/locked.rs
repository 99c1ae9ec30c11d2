use std::{io::ErrorKind, path::Path};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};

/// Reads a whole file under a shared lock. A missing file reads as `None`.
pub async fn read_shared(path: &Path) -> Result<Option<String>> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    file.lock_shared()?;
    let mut content = String::new();
    let result = file.read_to_string(&mut content).await;
    file.unlock_async().await?;
    result?;
    Ok(Some(content))
}

/// Read-modify-write of a whole file under an exclusive lock. `update` receives the current
/// content (empty for a new file) and returns the new content together with its own result.
pub async fn rewrite_exclusive<R>(
    path: &Path,
    update: impl FnOnce(String) -> Result<(String, R)>,
) -> Result<R> {
    let mut file = File::options()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .await?;

    // Semi-safe acquire-release for a file
    file.lock_exclusive()?;
    let result = rewrite_with_file(&mut file, update).await;
    file.unlock_async().await?;
    result
}

async fn rewrite_with_file<R>(
    file: &mut File,
    update: impl FnOnce(String) -> Result<(String, R)>,
) -> Result<R> {
    let mut content = String::new();
    file.read_to_string(&mut content).await?;

    let (updated, result) = update(content)?;

    file.rewind().await?;
    file.set_len(0).await?;
    file.write_all(updated.as_bytes()).await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(result)
}
