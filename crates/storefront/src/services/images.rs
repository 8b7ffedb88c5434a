//! Remote image import.
//!
//! Attaches a remote image to a catalog record as its thumbnail. Each source
//! URL is downloaded at most once: later imports of the same URL reuse the
//! stored media item, and records that already have a thumbnail are left
//! alone.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use catalog_bridge_core::{CatalogRecordId, MediaId, parse_image_url};

use crate::db::{CatalogStore, MediaLibrary, RepositoryError};
use crate::models::{MediaItem, NewMediaItem};

/// Largest image accepted for import.
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Path prefix imported files are served under.
pub const MEDIA_URL_PREFIX: &str = "/media";

/// Errors that can occur while importing an image.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("record id must be positive (got {0})")]
    InvalidRecordId(CatalogRecordId),

    #[error("image url is not an absolute http(s) URL: {0}")]
    InvalidUrl(String),

    #[error("catalog record {0} not found")]
    RecordNotFound(CatalogRecordId),

    #[error("download failed: {0}")]
    Download(String),

    #[error("not an image (content type '{0}')")]
    NotAnImage(String),

    #[error("image body is empty")]
    EmptyBody,

    #[error("image exceeds {MAX_IMAGE_BYTES} bytes")]
    TooLarge,

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// What an import did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The record already had a thumbnail; nothing was downloaded.
    AlreadyPresent(MediaId),
    /// Media previously downloaded from the same URL was attached.
    Reused(MediaId),
    /// The image was downloaded, stored and attached.
    Downloaded(MediaId),
}

impl ImportOutcome {
    /// The media item now attached to the record.
    #[must_use]
    pub const fn media_id(self) -> MediaId {
        match self {
            Self::AlreadyPresent(id) | Self::Reused(id) | Self::Downloaded(id) => id,
        }
    }
}

/// A downloaded image body.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Downloads image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage, ImportError>;
}

/// [`ImageFetcher`] over HTTP.
///
/// Bodies are read chunk by chunk and abandoned as soon as they pass the size
/// limit, whether or not the server sent a `Content-Length`.
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    /// Create a fetcher with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(timeout: Duration, max_redirects: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .build()?;
        Ok(Self {
            client,
            max_bytes: MAX_IMAGE_BYTES,
        })
    }

    /// Lower the body size limit.
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage, ImportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ImportError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::Download(format!("upstream returned {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();

        if response
            .content_length()
            .is_some_and(|len| usize::try_from(len).map_or(true, |len| len > self.max_bytes))
        {
            return Err(ImportError::TooLarge);
        }

        let mut bytes = Vec::new();
        let mut body = std::pin::pin!(response.bytes_stream());
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ImportError::Download(e.to_string()))?;
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(ImportError::TooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedImage {
            content_type,
            bytes,
        })
    }
}

/// Imports remote images into the media library.
#[derive(Clone)]
pub struct ImageImporter {
    records: Arc<dyn CatalogStore>,
    media: Arc<dyn MediaLibrary>,
    fetcher: Arc<dyn ImageFetcher>,
    media_dir: PathBuf,
}

impl ImageImporter {
    #[must_use]
    pub fn new(
        records: Arc<dyn CatalogStore>,
        media: Arc<dyn MediaLibrary>,
        fetcher: Arc<dyn ImageFetcher>,
        media_dir: PathBuf,
    ) -> Self {
        Self {
            records,
            media,
            fetcher,
            media_dir,
        }
    }

    /// Attach the image at `image_url` to a record.
    ///
    /// # Errors
    ///
    /// Returns `ImportError` for invalid input, unknown records, failed
    /// downloads, non-image bodies and storage failures.
    #[instrument(skip(self), fields(record = %record_id))]
    pub async fn import(
        &self,
        record_id: CatalogRecordId,
        image_url: &str,
    ) -> Result<ImportOutcome, ImportError> {
        if !record_id.is_assigned() {
            return Err(ImportError::InvalidRecordId(record_id));
        }
        let url = parse_image_url(image_url)
            .map_err(|_| ImportError::InvalidUrl(image_url.to_owned()))?;

        let record = self
            .records
            .get(record_id)
            .await?
            .ok_or(ImportError::RecordNotFound(record_id))?;

        if let Some(thumbnail) = record.thumbnail {
            debug!(media = %thumbnail.media_id, "Record already has a thumbnail");
            return Ok(ImportOutcome::AlreadyPresent(thumbnail.media_id));
        }

        if let Some(existing) = self.media.find_by_source_url(url.as_str()).await? {
            self.records.set_thumbnail(record_id, &existing).await?;
            debug!(media = %existing.id, "Reused media with the same source url");
            return Ok(ImportOutcome::Reused(existing.id));
        }

        let image = self.fetcher.fetch(&url).await?;
        let mime_type = validate_image(&image)?;

        let item = match self.store(&url, &mime_type, &image.bytes).await {
            Ok(item) => item,
            // Another import registered this URL first; share its media.
            Err(ImportError::Repository(RepositoryError::Conflict(_))) => {
                let existing = self
                    .media
                    .find_by_source_url(url.as_str())
                    .await?
                    .ok_or_else(|| {
                        ImportError::Repository(RepositoryError::DataCorruption(
                            "media conflict without a matching row".to_string(),
                        ))
                    })?;
                self.records.set_thumbnail(record_id, &existing).await?;
                return Ok(ImportOutcome::Reused(existing.id));
            }
            Err(e) => return Err(e),
        };

        self.records.set_thumbnail(record_id, &item).await?;
        info!(media = %item.id, bytes = item.byte_size, "Imported image");
        Ok(ImportOutcome::Downloaded(item.id))
    }

    /// Write the bytes to a temp file, register the media item, then move the
    /// file into place. The temp file is removed if any step fails.
    async fn store(
        &self,
        source: &Url,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<MediaItem, ImportError> {
        tokio::fs::create_dir_all(&self.media_dir).await?;

        let stem = Uuid::new_v4().simple().to_string();
        let file_name = format!("{stem}.{}", extension_for(mime_type));
        let temp_path = self.media_dir.join(format!(".{stem}.part"));
        let final_path = self.media_dir.join(&file_name);

        if let Err(e) = tokio::fs::write(&temp_path, bytes).await {
            remove_quietly(&temp_path).await;
            return Err(e.into());
        }

        let byte_size = i64::try_from(bytes.len()).map_err(|_| ImportError::TooLarge)?;
        let new_item = NewMediaItem {
            source_url: source.to_string(),
            public_url: format!("{MEDIA_URL_PREFIX}/{file_name}"),
            file_path: final_path.to_string_lossy().into_owned(),
            mime_type: mime_type.to_owned(),
            byte_size,
        };

        let item = match self.media.insert(&new_item).await {
            Ok(item) => item,
            Err(e) => {
                remove_quietly(&temp_path).await;
                return Err(e.into());
            }
        };

        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            remove_quietly(&temp_path).await;
            return Err(e.into());
        }

        Ok(item)
    }
}

/// Check the body is a non-empty image of acceptable size and return its
/// bare MIME type.
fn validate_image(image: &FetchedImage) -> Result<String, ImportError> {
    let mime_type = image
        .content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if !mime_type.starts_with("image/") {
        return Err(ImportError::NotAnImage(image.content_type.clone()));
    }
    if image.bytes.is_empty() {
        return Err(ImportError::EmptyBody);
    }
    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImportError::TooLarge);
    }
    Ok(mime_type)
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/svg+xml" => "svg",
        _ => "img",
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "Failed to remove temp file");
    }
}
