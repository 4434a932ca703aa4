//! Tile grid geometry
//!
//! Provides the coordinate and grid-configuration types shared by adapters,
//! the download engine, and the stitcher: linear-index ↔ coordinate
//! conversion, row-major iteration, and final/edge dimension math.

mod types;

pub use types::{GridCoordinates, TileCoordinate, TileFormat, TileGridConfig};
