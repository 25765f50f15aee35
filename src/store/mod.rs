//! Asset store: durable, write-once media storage keyed by asset id
//!
//! Layout under the root:
//!
//! ```text
//! videos/<id>.<ext>   videos/<id>.json
//! images/<id>.<ext>   images/<id>.json
//! .staging/           in-progress writes
//! ```
//!
//! The `<id>.json` rename is the commit point. An asset whose metadata file is
//! missing does not exist as far as readers are concerned.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::model::{Asset, AssetId, AssetKind, NewAsset};
use crate::domain::rules::AcceptedMedia;
use crate::error::{ClipiaError, ClipiaResult};
use crate::utils::path::sanitize_display_name;

mod staging;

pub use staging::StagedUpload;
pub(crate) use staging::{sync_dir, write_synced};

const STAGING_DIR: &str = ".staging";
pub(crate) const COPY_CHUNK: usize = 64 * 1024;

struct StoreInner {
    root: PathBuf,
    max_upload_bytes: u64,
    accepted: AcceptedMedia,
}

/// Handle to the asset store. Cheap to clone.
#[derive(Clone)]
pub struct AssetStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStore")
            .field("root", &self.inner.root)
            .field("max_upload_bytes", &self.inner.max_upload_bytes)
            .finish()
    }
}

impl AssetStore {
    /// Open (and create if needed) a store rooted at `root`
    pub async fn open(
        root: impl Into<PathBuf>,
        max_upload_bytes: u64,
        accepted: AcceptedMedia,
    ) -> ClipiaResult<Self> {
        let root = root.into();
        for kind in AssetKind::ALL {
            fs::create_dir_all(root.join(kind.dir_name())).await?;
        }
        fs::create_dir_all(root.join(STAGING_DIR)).await?;
        info!("Asset store opened at {}", root.display());

        Ok(Self {
            inner: Arc::new(StoreInner {
                root,
                max_upload_bytes,
                accepted,
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.inner.max_upload_bytes
    }

    pub(crate) fn staging_dir(&self) -> PathBuf {
        self.inner.root.join(STAGING_DIR)
    }

    pub(crate) fn data_path(&self, asset: &Asset) -> PathBuf {
        self.inner
            .root
            .join(asset.kind.dir_name())
            .join(asset.file_name())
    }

    pub(crate) fn metadata_path(&self, kind: AssetKind, id: &AssetId) -> PathBuf {
        self.inner
            .root
            .join(kind.dir_name())
            .join(format!("{}.json", id))
    }

    /// Validate a raw id from a client. Anything off the allow-list is simply not found.
    pub fn resolve(raw: &str) -> ClipiaResult<AssetId> {
        AssetId::parse(raw).ok_or_else(|| ClipiaError::not_found(raw))
    }

    /// Start a streamed client upload, checking name and type up front
    pub async fn begin_upload(
        &self,
        kind: AssetKind,
        original_name: &str,
        content_type: Option<&str>,
    ) -> ClipiaResult<StagedUpload> {
        let display_name = sanitize_display_name(original_name);
        let (content_type, extension) =
            self.inner.accepted.resolve(kind, content_type, &display_name)?;
        let new = NewAsset {
            kind,
            original_name: display_name,
            content_type,
            extension,
            derived_from: None,
        };
        StagedUpload::create(self.clone(), new, Some(self.inner.max_upload_bytes)).await
    }

    /// Store a complete buffer as a new asset
    pub async fn put(
        &self,
        bytes: &[u8],
        kind: AssetKind,
        original_name: &str,
        content_type: Option<&str>,
    ) -> ClipiaResult<Asset> {
        if bytes.len() as u64 > self.inner.max_upload_bytes {
            return Err(ClipiaError::validation(format!(
                "File exceeds the maximum upload size of {} bytes",
                self.inner.max_upload_bytes
            )));
        }
        let mut upload = self.begin_upload(kind, original_name, content_type).await?;
        upload.write_chunk(bytes).await?;
        let asset = upload.commit().await?;
        info!(asset_id = %asset.id, kind = %asset.kind, size = asset.size_bytes, "Asset stored");
        Ok(asset)
    }

    /// Register a file produced by the engine.
    ///
    /// The file is moved into the store when it sits on the same filesystem,
    /// and copied otherwise. Either way `path` is no longer needed afterwards.
    pub async fn ingest_file(&self, path: &Path, new: NewAsset) -> ClipiaResult<Asset> {
        let upload = match StagedUpload::adopt(self.clone(), new, path).await? {
            Ok(upload) => upload,
            Err(new) => self.copy_into_staging(path, new).await?,
        };
        let asset = upload.commit().await?;
        info!(
            asset_id = %asset.id,
            derived_from = ?asset.derived_from.as_ref().map(AssetId::as_str),
            "Derived asset stored"
        );
        Ok(asset)
    }

    async fn copy_into_staging(&self, path: &Path, new: NewAsset) -> ClipiaResult<StagedUpload> {
        let mut source = fs::File::open(path).await?;
        let mut upload = StagedUpload::create(self.clone(), new, None).await?;
        let mut buffer = vec![0u8; COPY_CHUNK];
        loop {
            let read = source.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            upload.write_chunk(&buffer[..read]).await?;
        }
        Ok(upload)
    }

    /// Metadata of a committed asset
    pub async fn metadata(&self, id: &AssetId) -> ClipiaResult<Asset> {
        for kind in AssetKind::ALL {
            match fs::read(self.metadata_path(kind, id)).await {
                Ok(bytes) => {
                    return serde_json::from_slice(&bytes).map_err(|e| {
                        warn!("Corrupt metadata for {}: {}", id, e);
                        ClipiaError::Storage(std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            e,
                        ))
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ClipiaError::not_found(id.as_str()))
    }

    pub async fn exists(&self, id: &AssetId) -> bool {
        for kind in AssetKind::ALL {
            if fs::try_exists(self.metadata_path(kind, id))
                .await
                .unwrap_or(false)
            {
                return true;
            }
        }
        false
    }

    /// Metadata plus the on-disk data path
    pub async fn path_of(&self, id: &AssetId) -> ClipiaResult<(Asset, PathBuf)> {
        let asset = self.metadata(id).await?;
        let path = self.data_path(&asset);
        Ok((asset, path))
    }

    /// Metadata plus an open handle on the bytes
    pub async fn get(&self, id: &AssetId) -> ClipiaResult<(Asset, fs::File)> {
        let (asset, path) = self.path_of(id).await?;
        let file = fs::File::open(&path).await.map_err(|e| {
            warn!("Committed asset {} has no readable data: {}", id, e);
            ClipiaError::Storage(e)
        })?;
        Ok((asset, file))
    }

    /// Read an asset fully into memory
    pub async fn read_all(&self, id: &AssetId) -> ClipiaResult<(Asset, Vec<u8>)> {
        let (asset, mut file) = self.get(id).await?;
        let mut bytes = Vec::with_capacity(asset.size_bytes as usize);
        file.read_to_end(&mut bytes).await?;
        Ok((asset, bytes))
    }

    /// All committed assets, oldest first
    pub async fn list(&self) -> ClipiaResult<Vec<Asset>> {
        let root = self.inner.root.clone();
        let mut assets = tokio::task::spawn_blocking(move || scan_metadata(&root))
            .await
            .map_err(|e| ClipiaError::processing(format!("store scan task failed: {}", e)))??;
        assets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(assets)
    }

    pub async fn count(&self) -> ClipiaResult<usize> {
        Ok(self.list().await?.len())
    }

    /// Remove abandoned staging files and data files that never got metadata
    pub async fn sweep_stale(&self, older_than: Duration) -> ClipiaResult<usize> {
        let root = self.inner.root.clone();
        let removed = tokio::task::spawn_blocking(move || sweep(&root, older_than))
            .await
            .map_err(|e| ClipiaError::processing(format!("store sweep task failed: {}", e)))??;
        if removed > 0 {
            info!("Swept {} stale files from the asset store", removed);
        }
        Ok(removed)
    }
}

fn scan_metadata(root: &Path) -> ClipiaResult<Vec<Asset>> {
    let mut assets = Vec::new();
    for kind in AssetKind::ALL {
        let dir = root.join(kind.dir_name());
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                ClipiaError::Storage(std::io::Error::new(std::io::ErrorKind::Other, e))
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read(path)
                .ok()
                .and_then(|bytes| serde_json::from_slice::<Asset>(&bytes).ok())
            {
                Some(asset) => assets.push(asset),
                None => warn!("Skipping unreadable metadata {}", path.display()),
            }
        }
    }
    Ok(assets)
}

fn is_older_than(path: &Path, age: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map_or(false, |elapsed| elapsed >= age)
}

fn sweep(root: &Path, older_than: Duration) -> ClipiaResult<usize> {
    let mut removed = 0;

    for entry in WalkDir::new(root.join(STAGING_DIR)).min_depth(1).max_depth(1) {
        let Ok(entry) = entry else { continue };
        if entry.file_type().is_file() && is_older_than(entry.path(), older_than) {
            debug!("Removing stale staging file {}", entry.path().display());
            if std::fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
    }

    for kind in AssetKind::ALL {
        for entry in WalkDir::new(root.join(kind.dir_name())).min_depth(1).max_depth(1) {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) == Some("json") {
                continue;
            }
            let orphan = path
                .file_stem()
                .map(|stem| !path.with_file_name(format!("{}.json", stem.to_string_lossy())).exists())
                .unwrap_or(false);
            if orphan && is_older_than(path, older_than) {
                debug!("Removing uncommitted data file {}", path.display());
                if std::fs::remove_file(path).is_ok() {
                    removed += 1;
                }
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use sha2::Digest;
    use tempfile::TempDir;

    async fn store(dir: &TempDir, limit: u64) -> AssetStore {
        AssetStore::open(dir.path(), limit, AcceptedMedia::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1024).await;

        let payload = b"not really a video but bytes are bytes".to_vec();
        let asset = store
            .put(&payload, AssetKind::Video, "My Clip.mp4", Some("video/mp4"))
            .await
            .unwrap();

        assert_eq!(asset.size_bytes, payload.len() as u64);
        assert_eq!(asset.extension, "mp4");
        assert_eq!(asset.original_name, "My Clip.mp4");
        assert_eq!(asset.sha256.len(), 64);

        let (fetched, bytes) = store.read_all(&asset.id).await.unwrap();
        assert_eq!(fetched, asset);
        assert_eq!(bytes, payload);
        assert!(store.exists(&asset.id).await);
    }

    #[tokio::test]
    async fn test_put_rejects_oversized_and_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 8).await;

        let err = store
            .put(b"0123456789", AssetKind::Video, "a.mp4", Some("video/mp4"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(std::fs::read_dir(store.staging_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_put_rejects_unaccepted_type() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1024).await;

        let err = store
            .put(b"MZ", AssetKind::Video, "setup.exe", Some("application/x-msdownload"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1024).await;

        let err = store
            .put(b"", AssetKind::Image, "blank.png", Some("image/png"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dropped_upload_cleans_staging() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1024).await;

        let mut upload = store
            .begin_upload(AssetKind::Video, "partial.mp4", Some("video/mp4"))
            .await
            .unwrap();
        upload.write_chunk(b"half of it").await.unwrap();
        assert_eq!(std::fs::read_dir(store.staging_dir()).unwrap().count(), 1);
        drop(upload);

        assert_eq!(std::fs::read_dir(store.staging_dir()).unwrap().count(), 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1024).await;

        assert_eq!(
            AssetStore::resolve("nonexistent-id").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        let missing = AssetId::generate();
        assert_eq!(store.get(&missing).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert!(!store.exists(&missing).await);
    }

    #[tokio::test]
    async fn test_ingest_file_records_derivation() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 4).await;

        let source = store
            .put(b"src", AssetKind::Video, "a.mp4", Some("video/mp4"))
            .await
            .unwrap();

        let produced = dir.path().join("produced.mp4");
        std::fs::write(&produced, b"derived output larger than the upload limit").unwrap();

        let derived = store
            .ingest_file(
                &produced,
                NewAsset {
                    kind: AssetKind::Video,
                    original_name: "a_trimmed.mp4".to_string(),
                    content_type: "video/mp4".to_string(),
                    extension: "mp4".to_string(),
                    derived_from: Some(source.id.clone()),
                },
            )
            .await
            .unwrap();

        assert_eq!(derived.derived_from, Some(source.id.clone()));
        assert_ne!(derived.id, source.id);
        assert!(!produced.exists());
        assert_eq!(std::fs::read_dir(store.staging_dir()).unwrap().count(), 0);

        let (_, bytes) = store.read_all(&derived.id).await.unwrap();
        assert_eq!(bytes, b"derived output larger than the upload limit");
        assert_eq!(derived.size_bytes, bytes.len() as u64);
        assert_eq!(derived.sha256, hex::encode(sha2::Sha256::digest(&bytes)));

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_metadata_write_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1024).await;

        let id = AssetId::generate();
        let blocker = store.metadata_path(AssetKind::Video, &id);
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("occupied"), b"x").unwrap();

        let mut upload = store
            .begin_upload(AssetKind::Video, "clip.mp4", Some("video/mp4"))
            .await
            .unwrap();
        upload.write_chunk(b"frames").await.unwrap();
        assert!(upload.commit_as(id.clone()).await.is_err());

        assert_eq!(std::fs::read_dir(store.staging_dir()).unwrap().count(), 0);
        let video_dir = dir.path().join(AssetKind::Video.dir_name());
        let leftover: Vec<_> = std::fs::read_dir(&video_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| *path != blocker)
            .collect();
        assert!(leftover.is_empty(), "unexpected files: {:?}", leftover);
    }

    #[tokio::test]
    async fn test_sweep_removes_orphans_only() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, 1024).await;

        let kept = store
            .put(b"keep", AssetKind::Video, "keep.mp4", Some("video/mp4"))
            .await
            .unwrap();
        std::fs::write(store.staging_dir().join("abandoned.part"), b"x").unwrap();
        std::fs::write(dir.path().join("videos").join("orphan.mp4"), b"x").unwrap();

        let removed = store.sweep_stale(Duration::ZERO).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.exists(&kept.id).await);
        assert!(store.data_path(&kept).exists());
    }
}
