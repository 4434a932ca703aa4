//! Byte-level tile validation
//!
//! Shared sniffing routines all adapters build on: magic-byte format
//! detection, header-only dimension probing, and the common validation
//! policy (hard errors for malformed bytes, warnings for implausible
//! sizes or unexpected dimensions).

use std::io::Cursor;

use image::ImageReader;

use crate::grid::TileCoordinate;

use super::types::{TileValidationMetadata, TileValidationResult};

/// Minimum plausible tile size; anything smaller is rejected outright.
pub const MIN_TILE_BYTES: usize = 100;

/// Tiles smaller than this draw a placeholder/low-quality warning.
const SMALL_TILE_WARNING_BYTES: usize = 5_000;

/// Tiles larger than this draw a warning (but are never failed).
const LARGE_TILE_WARNING_BYTES: usize = 200_000;

/// Image container detected from a tile's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedFormat {
    /// JPEG: starts FF D8, ends FF D9
    Jpeg,
    /// PNG: 89 50 4E 47 0D 0A 1A 0A
    Png,
    /// WebP: RIFF container with WEBP fourcc
    Webp,
}

/// Detects the image container from magic bytes, if any.
pub fn detect_format(bytes: &[u8]) -> Option<SniffedFormat> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(SniffedFormat::Jpeg);
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(SniffedFormat::Png);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(SniffedFormat::Webp);
    }
    None
}

/// Checks for the JPEG end-of-image marker (FF D9) at the buffer tail.
pub fn has_jpeg_trailer(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[bytes.len() - 2..] == [0xFF, 0xD9]
}

/// Decodes only the image header to read pixel dimensions.
///
/// Returns `None` when the header cannot be decoded; callers treat that as
/// "dimensions unknown", not as a validation failure.
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Validates a tile response buffer against the shared policy.
///
/// Errors (tile invalid): empty buffer, buffer under [`MIN_TILE_BYTES`],
/// unrecognized image signature, truncated JPEG. Warnings (tile still
/// valid): implausibly small or large buffers, decoded dimensions differing
/// from `expected_dimensions`.
pub fn validate_tile_bytes(
    bytes: &[u8],
    coordinate: TileCoordinate,
    expected_dimensions: Option<(u32, u32)>,
) -> TileValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if bytes.is_empty() {
        errors.push(format!("tile {}: empty response body", coordinate));
        return TileValidationResult {
            is_valid: false,
            errors,
            warnings,
            metadata: Some(TileValidationMetadata {
                observed_dimensions: None,
                expected_dimensions,
                byte_size: 0,
            }),
        };
    }

    if bytes.len() < MIN_TILE_BYTES {
        errors.push(format!(
            "tile {}: response of {} bytes is below the {} byte minimum",
            coordinate,
            bytes.len(),
            MIN_TILE_BYTES
        ));
    }

    match detect_format(bytes) {
        Some(SniffedFormat::Jpeg) => {
            if !has_jpeg_trailer(bytes) {
                errors.push(format!(
                    "tile {}: truncated JPEG (missing end-of-image marker)",
                    coordinate
                ));
            }
        }
        Some(_) => {}
        None => {
            errors.push(format!(
                "tile {}: unrecognized image signature (expected JPEG, PNG, or WebP)",
                coordinate
            ));
        }
    }

    if bytes.len() < SMALL_TILE_WARNING_BYTES {
        warnings.push(format!(
            "tile {}: small response ({} bytes), may be a placeholder",
            coordinate,
            bytes.len()
        ));
    } else if bytes.len() > LARGE_TILE_WARNING_BYTES {
        warnings.push(format!(
            "tile {}: unusually large response ({} bytes)",
            coordinate,
            bytes.len()
        ));
    }

    let observed = probe_dimensions(bytes);
    if let (Some((ow, oh)), Some((ew, eh))) = (observed, expected_dimensions) {
        if (ow, oh) != (ew, eh) {
            warnings.push(format!(
                "tile {}: unexpected dimensions {}x{}, expected {}x{}",
                coordinate, ow, oh, ew, eh
            ));
        }
    }

    TileValidationResult {
        is_valid: errors.is_empty(),
        errors,
        warnings,
        metadata: Some(TileValidationMetadata {
            observed_dimensions: observed,
            expected_dimensions,
            byte_size: bytes.len(),
        }),
    }
}
