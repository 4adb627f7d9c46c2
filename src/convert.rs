#![forbid(unsafe_code)]

//! Conversion of unfiltered scanline payloads into `RGBA8888` pixels.
//!
//! Every decode produces `RGBA8888`, whatever the stored format: grayscale
//! replicates its sample across the color channels, 16-bit channels keep
//! their high byte, indexed pixels go through the palette, and missing alpha
//! is fully opaque unless transparency data says otherwise. Transparency
//! comparisons use the full stored sample, so a 16-bit image only turns
//! transparent on an exact 16-bit match.

use alloc::vec::Vec;

use crate::chunk::{tRNS, IHDR, PLTE, PngColorType};
use crate::error::{PngError, PngResult};
use crate::pixel_formats::RGBA8888;

/// Converts one unfiltered payload (no filter type byte) to pixels.
///
/// Only byte-aligned bit depths convert; depths below 8 report
/// [`PngError::UnsupportedBitDepth`].
pub(crate) fn payload_to_rgba(
  ihdr: &IHDR, palette: Option<&PLTE>, transparency: Option<&tRNS>, payload: &[u8],
) -> PngResult<Vec<RGBA8888>> {
  let mut out: Vec<RGBA8888> = Vec::with_capacity(payload.len() / ihdr.bytes_per_pixel());
  match (ihdr.color_type, ihdr.bit_depth) {
    (PngColorType::Y, 8) => {
      for px in payload {
        let a = match transparency {
          Some(tRNS::Y { y }) if *y == u16::from(*px) => 0,
          _ => 255,
        };
        out.push(RGBA8888 { r: *px, g: *px, b: *px, a });
      }
    }
    (PngColorType::Y, 16) => {
      for px in payload.chunks_exact(2) {
        let sample = u16::from_be_bytes([px[0], px[1]]);
        let a = match transparency {
          Some(tRNS::Y { y }) if *y == sample => 0,
          _ => 255,
        };
        out.push(RGBA8888 { r: px[0], g: px[0], b: px[0], a });
      }
    }
    (PngColorType::YA, 8) => {
      for px in payload.chunks_exact(2) {
        out.push(RGBA8888 { r: px[0], g: px[0], b: px[0], a: px[1] });
      }
    }
    (PngColorType::YA, 16) => {
      for px in payload.chunks_exact(4) {
        out.push(RGBA8888 { r: px[0], g: px[0], b: px[0], a: px[2] });
      }
    }
    (PngColorType::RGB, 8) => {
      for px in payload.chunks_exact(3) {
        let a = match transparency {
          Some(tRNS::RGB { r, g, b })
            if *r == u16::from(px[0]) && *g == u16::from(px[1]) && *b == u16::from(px[2]) =>
          {
            0
          }
          _ => 255,
        };
        out.push(RGBA8888 { r: px[0], g: px[1], b: px[2], a });
      }
    }
    (PngColorType::RGB, 16) => {
      for px in payload.chunks_exact(6) {
        let stored = [
          u16::from_be_bytes([px[0], px[1]]),
          u16::from_be_bytes([px[2], px[3]]),
          u16::from_be_bytes([px[4], px[5]]),
        ];
        let a = match transparency {
          Some(tRNS::RGB { r, g, b }) if [*r, *g, *b] == stored => 0,
          _ => 255,
        };
        out.push(RGBA8888 { r: px[0], g: px[2], b: px[4], a });
      }
    }
    (PngColorType::RGBA, 8) => {
      for px in payload.chunks_exact(4) {
        out.push(RGBA8888 { r: px[0], g: px[1], b: px[2], a: px[3] });
      }
    }
    (PngColorType::RGBA, 16) => {
      for px in payload.chunks_exact(8) {
        out.push(RGBA8888 { r: px[0], g: px[2], b: px[4], a: px[6] });
      }
    }
    (PngColorType::Index, 8) => {
      let palette = palette.ok_or(PngError::MissingPalette)?;
      for px in payload {
        let index = *px as usize;
        let entry = palette.entries.get(index).copied().unwrap_or_default();
        let a = match transparency {
          Some(tRNS::Index { alphas }) => alphas.get(index).copied().unwrap_or(255),
          _ => 255,
        };
        out.push(RGBA8888 { r: entry.r, g: entry.g, b: entry.b, a });
      }
    }
    _ => return Err(PngError::UnsupportedBitDepth),
  }
  Ok(out)
}
