//! Utility functions and helpers for pic-prompt.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization and log-safe rendering of image sources.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod logging;
