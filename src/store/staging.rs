//! In-progress writes into the asset store
//!
//! Bytes land in `<root>/.staging/<uuid>.part` while being hashed. Nothing is
//! visible to readers until [`StagedUpload::commit`] renames the metadata file
//! into place.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::domain::model::{Asset, AssetId, NewAsset};
use crate::error::{ClipiaError, ClipiaResult};
use crate::store::{AssetStore, COPY_CHUNK};

/// An upload being streamed into staging
pub struct StagedUpload {
    store: AssetStore,
    file: Option<File>,
    path: PathBuf,
    hasher: Sha256,
    size: u64,
    limit: Option<u64>,
    new: NewAsset,
    committed: bool,
}

impl StagedUpload {
    fn staging_path(store: &AssetStore) -> PathBuf {
        store
            .staging_dir()
            .join(format!("{}.part", AssetId::generate()))
    }

    pub(crate) async fn create(
        store: AssetStore,
        new: NewAsset,
        limit: Option<u64>,
    ) -> ClipiaResult<Self> {
        let path = Self::staging_path(&store);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        debug!("Staging {} upload at {}", new.kind, path.display());

        Ok(Self {
            store,
            file: Some(file),
            path,
            hasher: Sha256::new(),
            size: 0,
            limit,
            new,
            committed: false,
        })
    }

    /// Move an existing file into staging and hash it in place.
    ///
    /// Gives `new` back when the file cannot be renamed, e.g. across filesystems.
    pub(crate) async fn adopt(
        store: AssetStore,
        new: NewAsset,
        source: &Path,
    ) -> ClipiaResult<Result<Self, NewAsset>> {
        let path = Self::staging_path(&store);
        if let Err(e) = fs::rename(source, &path).await {
            debug!("Cannot move {} into staging: {}", source.display(), e);
            return Ok(Err(new));
        }
        debug!("Adopted {} as staged {} at {}", source.display(), new.kind, path.display());

        let mut upload = Self {
            store,
            file: None,
            path,
            hasher: Sha256::new(),
            size: 0,
            limit: None,
            new,
            committed: false,
        };
        let mut file = File::open(&upload.path).await?;
        let mut buffer = vec![0u8; COPY_CHUNK];
        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            upload.hasher.update(&buffer[..read]);
            upload.size += read as u64;
        }
        upload.file = Some(file);
        Ok(Ok(upload))
    }

    /// Bytes written so far
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Append a chunk, enforcing the size limit as bytes arrive
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> ClipiaResult<()> {
        let next = self.size + chunk.len() as u64;
        if let Some(limit) = self.limit {
            if next > limit {
                return Err(ClipiaError::validation(format!(
                    "File exceeds the maximum upload size of {} bytes",
                    limit
                )));
            }
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| ClipiaError::processing("staged upload already closed"))?;
        file.write_all(chunk).await?;
        self.hasher.update(chunk);
        self.size = next;
        Ok(())
    }

    /// Make the upload durable and visible under a fresh id
    pub async fn commit(self) -> ClipiaResult<Asset> {
        self.commit_as(AssetId::generate()).await
    }

    pub(crate) async fn commit_as(mut self, id: AssetId) -> ClipiaResult<Asset> {
        if self.size == 0 {
            return Err(ClipiaError::validation("Uploaded file is empty"));
        }

        let mut file = self
            .file
            .take()
            .ok_or_else(|| ClipiaError::processing("staged upload already closed"))?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let asset = Asset {
            id,
            kind: self.new.kind,
            original_name: self.new.original_name.clone(),
            size_bytes: self.size,
            content_type: self.new.content_type.clone(),
            extension: self.new.extension.clone(),
            sha256: hex::encode(self.hasher.clone().finalize()),
            derived_from: self.new.derived_from.clone(),
            created_at: chrono::Utc::now(),
        };

        let data_path = self.store.data_path(&asset);
        fs::rename(&self.path, &data_path).await?;
        // from here the staging file is gone; Drop must not touch it
        self.committed = true;

        if let Err(e) = write_metadata(&self.store, &asset).await {
            warn!("Metadata write failed for {}, removing data file: {}", asset.id, e);
            remove_logged(&data_path).await;
            return Err(e);
        }
        sync_dir(data_path.parent()).await;

        Ok(asset)
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if !self.committed {
            self.file.take();
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove staging file {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

/// Write `<id>.json` via staging and rename it into the kind directory
async fn write_metadata(store: &AssetStore, asset: &Asset) -> ClipiaResult<()> {
    let json = serde_json::to_vec_pretty(asset)
        .map_err(|e| ClipiaError::processing(format!("Failed to encode metadata: {}", e)))?;
    let temp = store.staging_dir().join(format!("{}.json.part", asset.id));
    let written = async {
        write_synced(&temp, &json).await?;
        fs::rename(&temp, store.metadata_path(asset.kind, &asset.id)).await?;
        Ok::<(), ClipiaError>(())
    }
    .await;
    if written.is_err() {
        remove_logged(&temp).await;
    }
    written
}

/// Best-effort cleanup of a file that may or may not exist
async fn remove_logged(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Write a whole file and fsync it
pub(crate) async fn write_synced(path: &Path, bytes: &[u8]) -> ClipiaResult<()> {
    let mut file = File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

/// Persist directory entries after a rename. Not every platform allows it.
pub(crate) async fn sync_dir(dir: Option<&Path>) {
    let Some(dir) = dir else { return };
    match File::open(dir).await {
        Ok(handle) => {
            if let Err(e) = handle.sync_all().await {
                debug!("Directory sync skipped for {}: {}", dir.display(), e);
            }
        }
        Err(e) => debug!("Directory sync skipped for {}: {}", dir.display(), e),
    }
}
