//! Image acquisition and normalization pipeline.
//!
//! Images are referenced by source (URL, path or `data:` URI), fetched at
//! most once through the [`ImageRegistry`], then validated and transcoded
//! per [`ImageConfig`](crate::config::ImageConfig) by [`ImageData::encode_for`].
//!
//! # Submodules
//!
//! - `data`: The image value object and its cached per-config encodings.
//! - `downloader`: The fetcher trait and the default HTTP/file/inline fetcher.
//! - `formats`: Format enumeration and magic-byte MIME detection.
//! - `registry`: Shared fetch-once cache with per-source in-flight tracking.
//! - `transcode`: Limit checks, downscaling and re-encoding.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod data;
pub mod downloader;
pub mod formats;
pub mod registry;
pub mod transcode;

pub use data::{EncodedImage, ImageData};
pub use downloader::{FetchedImage, ImageDownloader, ImageFetcher, SourceKind};
pub use formats::ImageFormat;
pub use registry::{ImageRegistry, RegistryStats};
