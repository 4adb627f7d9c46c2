#![forbid(unsafe_code)]

//! The two byte-per-channel pixel layouts this crate produces and consumes.
//!
//! Palette entries are stored as [`RGB888`], and every decoded pixel comes out
//! as an [`RGBA8888`] regardless of the image's own color type: grayscale data
//! is replicated into the three color channels, and an alpha of 255 is
//! supplied when the format (or a transparency chunk) doesn't provide one.

use bytemuck::{Pod, Zeroable};

/// An RGB color, one byte per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct RGB888 {
  pub r: u8,
  pub g: u8,
  pub b: u8,
}

/// An RGBA color, one byte per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct RGBA8888 {
  pub r: u8,
  pub g: u8,
  pub b: u8,
  pub a: u8,
}
impl RGBA8888 {
  /// A fully opaque color from the three color channels.
  #[inline]
  #[must_use]
  pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
    Self { r, g, b, a: 255 }
  }
}
impl From<RGB888> for RGBA8888 {
  #[inline]
  #[must_use]
  fn from(RGB888 { r, g, b }: RGB888) -> Self {
    Self { r, g, b, a: 255 }
  }
}
