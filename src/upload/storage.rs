use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::AppError;
use crate::models::ListingImage;
use crate::upload::FilePart;

pub const URL_PREFIX: &str = "/uploads";

/// Image formats accepted for upload, identified from the file's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageKind::Png)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
        }
    }
}

/// Listing images on local disk, served under `/uploads`. Short-lived
/// uploads go to `temp_dir`, which must not be inside the served root.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    temp_dir: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            temp_dir: temp_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::create_dir_all(&self.temp_dir).await
    }

    /// Write one validated image and return its public reference.
    pub async fn save(&self, part: &FilePart) -> Result<ListingImage, AppError> {
        let kind = ImageKind::sniff(&part.data).ok_or_else(|| {
            AppError::BadRequest(format!("{} is not a supported image", part.filename))
        })?;

        let name = format!("{}.{}", Uuid::now_v7(), kind.extension());
        tokio::fs::write(self.root.join(&name), &part.data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store image: {e}")))?;

        Ok(ListingImage {
            url: format!("{URL_PREFIX}/{name}"),
            filename: part.filename.clone(),
        })
    }

    /// Save every part or none: files written before a failure are removed.
    pub async fn save_all(&self, parts: &[&FilePart]) -> Result<Vec<ListingImage>, AppError> {
        let mut saved = Vec::with_capacity(parts.len());
        for part in parts {
            match self.save(part).await {
                Ok(image) => saved.push(image),
                Err(e) => {
                    self.remove_all(&saved).await;
                    return Err(e);
                }
            }
        }
        Ok(saved)
    }

    /// Best effort; a missing file is not an error.
    pub async fn remove(&self, image: &ListingImage) {
        self.remove_url(&image.url).await;
    }

    pub async fn remove_url(&self, url: &str) {
        let Some(path) = self.path_for_url(url) else {
            tracing::warn!("Refusing to delete image outside upload dir: {url}");
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to delete image {}: {e}", path.display()),
        }
    }

    pub async fn remove_all(&self, images: &[ListingImage]) {
        for image in images {
            self.remove(image).await;
        }
    }

    /// Resolve `/uploads/<name>` to a path inside the store. Anything that is
    /// not a single plain file name is rejected.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(URL_PREFIX)?.strip_prefix('/')?;
        if name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\'])
        {
            return None;
        }
        Some(self.root.join(name))
    }

    /// Write an upload to the temp area for short-lived processing.
    pub async fn write_temp(&self, part: &FilePart, kind: ImageKind) -> Result<PathBuf, AppError> {
        let path = self
            .temp_dir
            .join(format!("{}.{}", Uuid::now_v7(), kind.extension()));
        tokio::fs::write(&path, &part.data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write temp upload: {e}")))?;
        Ok(path)
    }
}
