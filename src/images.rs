use std::path::Path;

use chrono::{DateTime, Local};
use image::DynamicImage;

use crate::device::models::{PixelType, Resolution};

/// One transferred page.
#[derive(Debug, Clone)]
pub struct AcquiredImage {
    pub raster: DynamicImage,
    pub resolution: Resolution,
    pub pixel_type: PixelType,
    pub page_index: u32,
    pub acquired_at: DateTime<Local>,
}

impl AcquiredImage {
    pub fn new(
        raster: DynamicImage,
        resolution: Resolution,
        pixel_type: PixelType,
        page_index: u32,
    ) -> Self {
        Self {
            raster,
            resolution,
            pixel_type,
            page_index,
            acquired_at: Local::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn save_png(&self, path: &Path) -> Result<(), String> {
        self.raster
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| format!("Failed to write {}: {e}", path.display()))
    }
}

/// Pages acquired in the current session, in page order. Append-only
/// while acquiring; only the caller clears it.
#[derive(Debug, Default)]
pub struct ImageCollection {
    images: Vec<AcquiredImage>,
    current: Option<usize>,
}

impl ImageCollection {
    pub fn push(&mut self, image: AcquiredImage) {
        self.images.push(image);
        self.current = Some(self.images.len() - 1);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AcquiredImage> {
        self.images.iter()
    }

    pub fn current(&self) -> Option<&AcquiredImage> {
        self.current.and_then(|idx| self.images.get(idx))
    }

    /// Move the cursor, clamping to the last image.
    pub fn select(&mut self, index: usize) -> Option<&AcquiredImage> {
        if self.images.is_empty() {
            self.current = None;
            return None;
        }
        let idx = index.min(self.images.len() - 1);
        self.current = Some(idx);
        self.images.get(idx)
    }

    pub fn clear(&mut self) {
        self.images.clear();
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn page(index: u32) -> AcquiredImage {
        AcquiredImage::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 6, Luma([200]))),
            Resolution { x: 150.0, y: 150.0 },
            PixelType::Gray,
            index,
        )
    }

    #[test]
    fn push_moves_cursor_to_newest_page() {
        let mut images = ImageCollection::default();
        assert!(images.current().is_none());

        images.push(page(0));
        images.push(page(1));

        assert_eq!(images.len(), 2);
        assert_eq!(images.current().map(|img| img.page_index), Some(1));
    }

    #[test]
    fn select_never_leaves_bounds() {
        let mut images = ImageCollection::default();
        assert!(images.select(3).is_none());
        assert!(images.current().is_none());

        images.push(page(0));
        images.push(page(1));
        let selected = images.select(10).map(|img| img.page_index);
        assert_eq!(selected, Some(1));
        assert_eq!(images.select(0).map(|img| img.page_index), Some(0));
        assert_eq!(images.current().map(|img| img.page_index), Some(0));
    }

    #[test]
    fn clear_resets_cursor() {
        let mut images = ImageCollection::default();
        images.push(page(0));
        images.clear();
        assert!(images.is_empty());
        assert!(images.current().is_none());
    }

    #[test]
    fn save_png_writes_decodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        page(0).save_png(&path).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 6);
    }
}
