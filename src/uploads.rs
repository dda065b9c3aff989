//! Media storage on local disk.
//!
//! Uploads land in category-specific subdirectories under the configured
//! root, keyed by a generated uuid filename so original names never hit the
//! filesystem. The stored reference is the site-relative URL path
//! (`/uploads/<category>/<uuid>.<ext>`); absolutization happens at the
//! response boundary.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
const ALLOWED_VIDEO_TYPES: &[&str] = &["video/mp4", "video/mpeg", "video/quicktime"];

/// Storage category, one subdirectory each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Profiles,
    Covers,
    Posts,
    Stories,
}

impl MediaCategory {
    pub fn dir_name(self) -> &'static str {
        match self {
            MediaCategory::Profiles => "profiles",
            MediaCategory::Covers => "covers",
            MediaCategory::Posts => "posts",
            MediaCategory::Stories => "stories",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

/// Classifies a MIME type against the allowlist. Returns `None` for types
/// the server does not accept.
pub fn classify(content_type: &str) -> Option<MediaType> {
    if ALLOWED_IMAGE_TYPES.contains(&content_type) {
        Some(MediaType::Image)
    } else if ALLOWED_VIDEO_TYPES.contains(&content_type) {
        Some(MediaType::Video)
    } else {
        None
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/mpeg" => "mpeg",
        "video/quicktime" => "mov",
        _ => "bin",
    }
}

/// Result of storing one upload.
#[derive(Debug)]
pub struct StoredMedia {
    /// Site-relative URL path, e.g. `/uploads/posts/<uuid>.jpg`.
    pub url_path: String,
    pub media_type: MediaType,
}

/// File store for uploaded media.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    max_bytes: u64,
}

impl MediaStore {
    pub fn new(root: PathBuf, max_bytes: u64) -> Self {
        Self { root, max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Creates the root and all category directories.
    pub async fn init(&self) -> Result<()> {
        for category in [
            MediaCategory::Profiles,
            MediaCategory::Covers,
            MediaCategory::Posts,
            MediaCategory::Stories,
        ] {
            let dir = self.root.join(category.dir_name());
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create upload directory {dir:?}"))?;
        }
        Ok(())
    }

    /// Writes an upload to disk. The MIME type must already have passed
    /// [`classify`]; unknown types are rejected here as well.
    pub async fn store(
        &self,
        category: MediaCategory,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredMedia> {
        let media_type = classify(content_type)
            .ok_or_else(|| anyhow!("Unsupported media type: {content_type}"))?;

        if data.len() as u64 > self.max_bytes {
            return Err(anyhow!(
                "File size exceeds maximum allowed size of {} bytes",
                self.max_bytes
            ));
        }

        let filename = format!("{}.{}", Uuid::new_v4(), extension_for(content_type));
        let file_path = self.root.join(category.dir_name()).join(&filename);

        fs::write(&file_path, data)
            .await
            .with_context(|| format!("Failed to write upload to {file_path:?}"))?;

        Ok(StoredMedia {
            url_path: format!("/uploads/{}/{}", category.dir_name(), filename),
            media_type,
        })
    }

    /// Deletes a previously stored upload by its site-relative URL path.
    /// Paths that resolve outside the storage root are rejected.
    pub async fn remove(&self, url_path: &str) -> Result<()> {
        let relative = url_path
            .strip_prefix("/uploads/")
            .ok_or_else(|| anyhow!("Not an upload path: {url_path}"))?;

        let file_path = self.root.join(relative);
        let canonical_root = fs::canonicalize(&self.root)
            .await
            .with_context(|| format!("Failed to canonicalize upload root {:?}", self.root))?;
        let canonical_file = match fs::canonicalize(&file_path).await {
            Ok(path) => path,
            // Already gone; deletion is idempotent.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to canonicalize upload path {file_path:?}"))
            }
        };

        if !canonical_file.starts_with(&canonical_root) {
            return Err(anyhow!("Invalid upload path: path traversal detected"));
        }

        fs::remove_file(&canonical_file)
            .await
            .with_context(|| format!("Failed to delete upload at {canonical_file:?}"))?;
        Ok(())
    }

    #[cfg(test)]
    fn file_for(&self, url_path: &str) -> Option<PathBuf> {
        url_path
            .strip_prefix("/uploads/")
            .map(|relative| self.root.join(relative))
    }
}
