//! Runtime artifact fetch and cache
//!
//! The interpreter ships as a shared library hosted at a fixed URL. It is
//! downloaded once into a local cache directory and loaded from there; later
//! bootstraps reuse the cached copy without touching the network.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::runtime::{NativeRuntime, PythonRuntime, RuntimeLoadError};

/// Fetch the configured artifact and initialize the native runtime.
pub(crate) async fn bootstrap(config: &Config) -> Result<Arc<dyn PythonRuntime>, RuntimeLoadError> {
    let path = fetch(&config.artifact_url, config.cache_dir.as_deref()).await?;
    let runtime = NativeRuntime::load(&path).await?;
    Ok(Arc::new(runtime))
}

/// Download the artifact at `url` into the cache, returning its local path.
///
/// A file already present in the cache is reused as-is; stores are staged
/// and renamed into place, so a cached file is always a complete download.
#[instrument(skip(cache_dir))]
pub async fn fetch(url: &str, cache_dir: Option<&Path>) -> Result<PathBuf, RuntimeLoadError> {
    let dir = match cache_dir {
        Some(dir) => dir.to_path_buf(),
        None => dirs::cache_dir()
            .ok_or(RuntimeLoadError::NoCacheDir)?
            .join("pygrade"),
    };
    let dest = dir.join(artifact_file_name(url));

    if fs::try_exists(&dest).await.unwrap_or(false) {
        debug!(path = %dest.display(), "using cached runtime artifact");
        return Ok(dest);
    }

    info!(url, "fetching runtime artifact");
    let response = reqwest::get(url)
        .await
        .map_err(|source| RuntimeLoadError::Fetch {
            url: url.to_string(),
            source,
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(RuntimeLoadError::FetchStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|source| RuntimeLoadError::Fetch {
            url: url.to_string(),
            source,
        })?;

    fs::create_dir_all(&dir)
        .await
        .map_err(|source| RuntimeLoadError::Store {
            path: dir.clone(),
            source,
        })?;
    store(&dest, &bytes).await?;

    debug!(path = %dest.display(), len = bytes.len(), "stored runtime artifact");
    Ok(dest)
}

/// Write the artifact so `dest` only ever holds a complete copy.
///
/// The bytes go to a staging sibling first and are renamed into place. A
/// write that dies part-way leaves nothing at `dest`, so the cache check in
/// [`fetch`] can never hit a truncated artifact; the next bootstrap simply
/// downloads again.
async fn store(dest: &Path, bytes: &[u8]) -> Result<(), RuntimeLoadError> {
    let staging = dest.with_extension("partial");
    if let Err(source) = fs::write(&staging, bytes).await {
        let _ = fs::remove_file(&staging).await;
        return Err(RuntimeLoadError::Store {
            path: dest.to_path_buf(),
            source,
        });
    }
    fs::rename(&staging, dest)
        .await
        .map_err(|source| RuntimeLoadError::Store {
            path: dest.to_path_buf(),
            source,
        })
}

/// Local file name for an artifact URL.
fn artifact_file_name(url: &str) -> &str {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("runtime.so")
}
