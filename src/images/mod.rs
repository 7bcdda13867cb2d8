// Interface to the image cache subsystem. The core never touches pixel
// data; it looks up metadata by opaque id and asks a sink to persist
// cached images during long-running save operations.

use crate::error::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Metadata for one cached image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Link-only images live at an external URL and are never written
    /// to the local cache.
    pub link_only: bool,
}

/// Lookup of image metadata by id. Missing images return None.
pub trait ImageProvider {
    fn info(&self, id: &str) -> Option<ImageInfo>;
}

/// Destination for bulk image writing (local directory, data dir, archive).
pub trait ImageSink {
    fn write(&mut self, id: &str) -> Result<()>;
}

/// A provider with no images; the default for collections without covers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImages;

impl ImageProvider for NoImages {
    fn info(&self, _id: &str) -> Option<ImageInfo> {
        None
    }
}

/// In-memory image metadata, for tests and for importers that carry
/// dimensions alongside the catalog data.
#[derive(Debug, Default, Clone)]
pub struct MemoryImages {
    images: HashMap<String, ImageInfo>,
}

impl MemoryImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, width: u32, height: u32) {
        self.images.insert(
            id.to_string(),
            ImageInfo { width, height, link_only: false },
        );
    }

    pub fn insert_link_only(&mut self, id: &str) {
        self.images.insert(
            id.to_string(),
            ImageInfo { width: 0, height: 0, link_only: true },
        );
    }
}

impl ImageProvider for MemoryImages {
    fn info(&self, id: &str) -> Option<ImageInfo> {
        self.images.get(id).copied()
    }
}

/// Cooperative cancellation flag for long-running loops.
/// Checked between units of work; already-written side effects stay.
#[derive(Debug, Default, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_memory_images() {
        let mut images = MemoryImages::new();
        images.insert("cover-1", 400, 600);
        images.insert_link_only("cover-2");
        assert_eq!(images.info("cover-1").unwrap().width, 400);
        assert!(images.info("cover-2").unwrap().link_only);
        assert!(images.info("missing").is_none());
    }
}
