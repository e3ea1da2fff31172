//! Storage for images uploaded alongside blog posts.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::auth::ErrorKind;
use crate::uuid::uuidv7;

/// Largest single upload accepted.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_IMAGES_PER_POST: usize = 10;

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// One file from a multipart upload.
#[derive(Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedImage")
            .field("file_name", &self.file_name)
            .field("len", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Unsupported image type for {0}")]
    UnsupportedType(String),

    #[error("Image {0} is empty")]
    Empty(String),

    #[error("Image {0} exceeds {MAX_IMAGE_BYTES} bytes")]
    TooLarge(String),

    #[error("At most {MAX_IMAGES_PER_POST} images per post")]
    TooMany,

    #[error("Image storage failed: {0}")]
    Io(#[from] io::Error),
}

impl ImageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImageError::UnsupportedType(_)
            | ImageError::Empty(_)
            | ImageError::TooLarge(_)
            | ImageError::TooMany => ErrorKind::Validation,
            ImageError::Io(_) => ErrorKind::Internal,
        }
    }
}

/// Check size and type, returning the lowercased extension to store under.
pub fn check_image(image: &UploadedImage) -> Result<String, ImageError> {
    let ext = Path::new(&image.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
        .ok_or_else(|| ImageError::UnsupportedType(image.file_name.clone()))?;
    if image.data.is_empty() {
        return Err(ImageError::Empty(image.file_name.clone()));
    }
    if image.data.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge(image.file_name.clone()));
    }
    Ok(ext)
}

/// Where uploaded images end up. Returned paths are what the blog records.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn save(&self, image: &UploadedImage) -> Result<String, ImageError>;

    /// Remove a previously saved image. Unknown paths are ignored.
    async fn remove(&self, path: &str) -> Result<(), ImageError>;
}

/// Writes images into a directory under generated names.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    dir: PathBuf,
    public_prefix: String,
}

impl LocalImageStore {
    /// `public_prefix` is prepended to the file name in recorded paths,
    /// e.g. `/uploads`.
    pub fn new(dir: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if it is missing.
    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// File name inside `dir` for a recorded path, if the path is ours.
    fn file_name_of<'a>(&self, path: &'a str) -> Option<&'a str> {
        let name = path
            .strip_prefix(self.public_prefix.as_str())?
            .strip_prefix('/')?;
        let plain = !name.is_empty() && !name.contains(['/', '\\']) && name != "..";
        plain.then_some(name)
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn save(&self, image: &UploadedImage) -> Result<String, ImageError> {
        let ext = check_image(image)?;
        let name = format!("{}.{ext}", uuidv7());
        tokio::fs::write(self.dir.join(&name), &image.data).await?;
        debug!(file = %name, bytes = image.data.len(), "image stored");
        Ok(format!("{}/{name}", self.public_prefix))
    }

    async fn remove(&self, path: &str) -> Result<(), ImageError> {
        let Some(name) = self.file_name_of(path) else {
            return Ok(());
        };
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> UploadedImage {
        UploadedImage {
            file_name: name.into(),
            data: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[test]
    fn only_known_image_types_pass() {
        assert_eq!(check_image(&png("cat.PNG")).unwrap(), "png");
        assert_eq!(check_image(&png("a.b.jpeg")).unwrap(), "jpeg");
        assert!(matches!(
            check_image(&png("script.sh")),
            Err(ImageError::UnsupportedType(_))
        ));
        assert!(matches!(
            check_image(&png("noextension")),
            Err(ImageError::UnsupportedType(_))
        ));
    }

    #[test]
    fn empty_and_oversized_files_are_rejected() {
        let mut img = png("x.png");
        img.data.clear();
        assert!(matches!(check_image(&img), Err(ImageError::Empty(_))));
        img.data = vec![0; MAX_IMAGE_BYTES + 1];
        assert!(matches!(check_image(&img), Err(ImageError::TooLarge(_))));
    }

    #[tokio::test]
    async fn local_store_writes_under_generated_name_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path().join("uploads"), "/uploads/");
        store.ensure_dir().await.unwrap();

        let path = store.save(&png("../../etc/passwd.png")).await.unwrap();
        assert!(path.starts_with("/uploads/"));
        assert!(path.ends_with(".png"));
        assert!(!path.contains("passwd"));

        let name = path.trim_start_matches("/uploads/");
        let on_disk = store.dir().join(name);
        assert_eq!(tokio::fs::read(&on_disk).await.unwrap(), png("x.png").data);

        store.remove(&path).await.unwrap();
        assert!(!on_disk.exists());
        store.remove(&path).await.unwrap();
    }

    #[tokio::test]
    async fn remove_ignores_foreign_paths() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("keep.png");
        tokio::fs::write(&outside, b"x").await.unwrap();
        let store = LocalImageStore::new(dir.path().join("uploads"), "/uploads");

        store.remove("/uploads/../keep.png").await.unwrap();
        store.remove("https://cdn.example.com/keep.png").await.unwrap();
        assert!(outside.exists());
    }
}
