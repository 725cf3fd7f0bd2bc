// Shared fixtures for integration tests
// Author: kelexine (https://github.com/kelexine)

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use pic_prompt::error::{ImageStage, PicPromptError, Result};
use pic_prompt::images::{FetchedImage, ImageFetcher};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Solid-color image of the given size, encoded as `format`.
pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 90])));
    // GIF frames are RGBA
    let img = match format {
        ImageFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => img,
    };
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encoded_image(width, height, ImageFormat::Png)
}

/// Serves a fixed set of images from memory and counts fetches per source.
#[derive(Default)]
pub struct MapFetcher {
    images: HashMap<String, FetchedImage>,
    delay: Option<Duration>,
    calls: parking_lot::Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, source: &str, bytes: Vec<u8>, mime_type: &str) -> Self {
        self.images.insert(
            source.to_string(),
            FetchedImage {
                bytes: Bytes::from(bytes),
                mime_type: mime_type.to_string(),
            },
        );
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self, source: &str) -> usize {
        self.calls.lock().get(source).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for MapFetcher {
    async fn fetch(&self, source: &str) -> Result<FetchedImage> {
        *self.calls.lock().entry(source.to_string()).or_default() += 1;
        self.total.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.images
            .get(source)
            .cloned()
            .ok_or_else(|| PicPromptError::image(source, ImageStage::Unreachable, "no such image"))
    }
}
