use async_trait::async_trait;
use dashmap::DashMap;

use crate::images::{ImageError, ImageStore, UploadedImage, check_image};
use crate::uuid::uuidv7;

/// Image store that keeps uploads in a map keyed by their recorded path.
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    files: DashMap<String, Vec<u8>>,
}

impl MemoryImageStore {
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.get(path).map(|f| f.clone())
    }

    pub fn count(&self) -> usize {
        self.files.len()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn save(&self, image: &UploadedImage) -> Result<String, ImageError> {
        let ext = check_image(image)?;
        let path = format!("/uploads/{}.{ext}", uuidv7());
        self.files.insert(path.clone(), image.data.clone());
        Ok(path)
    }

    async fn remove(&self, path: &str) -> Result<(), ImageError> {
        self.files.remove(path);
        Ok(())
    }
}
