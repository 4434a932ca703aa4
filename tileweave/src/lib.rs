//! TileWeave - deep-zoom tile acquisition and stitching
//!
//! This library downloads very large raster images that servers expose
//! only as grids of small tiles (manuscript viewers, IIIF image services)
//! and reassembles them into one full-resolution image.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides a simplified facade:
//!
//! ```ignore
//! use tileweave::config::EngineConfig;
//! use tileweave::engine::TileDownloadCallbacks;
//! use tileweave::service::TileEngineService;
//!
//! let service = TileEngineService::new(EngineConfig::default())?;
//!
//! // Auto-detects the adapter for the URL and stitches to the output path
//! let result = service
//!     .download(url, "page.jpg", TileDownloadCallbacks::new())
//!     .await?;
//! ```
//!
//! The pipeline underneath: an [`adapter::TileAdapter`] discovers the tile
//! grid and auth for its provider, the [`engine`] fans the grid out as
//! rate-limited concurrent downloads with bounded retry, and a
//! [`stitch::Stitcher`] composes the validated tiles into the final
//! raster.

pub mod adapter;
pub mod config;
pub mod engine;
pub mod grid;
pub mod http;
pub mod logging;
pub mod ratelimit;
pub mod service;
pub mod stitch;

/// Version of the TileWeave library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
