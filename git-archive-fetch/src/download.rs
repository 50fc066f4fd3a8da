//! Response → file plumbing shared by both providers.
//!
//! Key (stable for a snapshot): SHA256("{provider}:{base}:{owner}/{repo}@{ref}")
//! Layout: <work_dir>/archives/<provider>-<hash16>.tar.gz

use std::path::{Path, PathBuf};

use reqwest::Response;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::errors::{FetchResult, ProviderError};
use crate::git_providers::types::ArchiveRequest;

/// Computes the deterministic archive location for a request.
pub fn archive_path(work_dir: &Path, req: &ArchiveRequest) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(req.snapshot_key());
    let digest = format!("{:x}", hasher.finalize());
    work_dir
        .join("archives")
        .join(format!("{}-{}.tar.gz", req.kind.prefix(), &digest[..16]))
}

/// Turns a non-success response into a provider error, honoring `Retry-After`.
pub(crate) fn check_status(resp: Response) -> FetchResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let retry_after_secs = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    Err(ProviderError::from_status(status.as_u16(), retry_after_secs).into())
}

/// Streams the body into `dest` through a `.part` file and renames on success.
pub(crate) async fn stream_to_file(mut resp: Response, dest: &Path) -> FetchResult<u64> {
    if let Some(dir) = dest.parent() {
        fs::create_dir_all(dir).await?;
    }
    let partial = dest.with_extension("part");
    let mut file = fs::File::create(&partial).await?;

    let mut written: u64 = 0;
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    fs::rename(&partial, dest).await?;
    debug!("archive written: path={}, bytes={}", dest.display(), written);
    Ok(written)
}
