#![forbid(unsafe_code)]

//! The Adam7 interlace schedule.
//!
//! An interlaced image is stored as seven "reduced images", each a fixed
//! sub-sampling of the full pixel grid:
//!
//! ```text
//! 1 6 4 6 2 6 4 6
//! 7 7 7 7 7 7 7 7
//! 5 6 5 6 5 6 5 6
//! 7 7 7 7 7 7 7 7
//! 3 6 4 6 3 6 4 6
//! 7 7 7 7 7 7 7 7
//! 5 6 5 6 5 6 5 6
//! 7 7 7 7 7 7 7 7
//! ```
//!
//! Together the seven passes cover every final pixel exactly once. A pass can
//! be entirely empty when the image is smaller than the pass's sampling
//! offsets, and empty passes contribute no scanlines at all to the data
//! stream.

/// One pass of the interlace schedule: a sampling factor and offset per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub struct Interlacing {
  pub x_factor: u32,
  pub y_factor: u32,
  pub x_offset: u32,
  pub y_offset: u32,
}
impl Interlacing {
  /// Maps a pass-local position to its final-image position.
  #[inline]
  #[must_use]
  pub const fn remap(self, x: u32, y: u32) -> (u32, u32) {
    (x * self.x_factor + self.x_offset, y * self.y_factor + self.y_offset)
  }
}

/// The seven passes, in the order their scanlines appear in the data stream.
pub const ADAM7: [Interlacing; 7] = [
  Interlacing { x_factor: 8, y_factor: 8, x_offset: 0, y_offset: 0 },
  Interlacing { x_factor: 8, y_factor: 8, x_offset: 4, y_offset: 0 },
  Interlacing { x_factor: 4, y_factor: 8, x_offset: 0, y_offset: 4 },
  Interlacing { x_factor: 4, y_factor: 4, x_offset: 2, y_offset: 0 },
  Interlacing { x_factor: 2, y_factor: 4, x_offset: 0, y_offset: 2 },
  Interlacing { x_factor: 2, y_factor: 2, x_offset: 1, y_offset: 0 },
  Interlacing { x_factor: 1, y_factor: 2, x_offset: 0, y_offset: 1 },
];

/// How large a block one pixel of a pass should paint until a later pass
/// refines the area, for progressive display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub struct Interpolation {
  pub span_x: u32,
  pub span_y: u32,
}

/// The interpolation span of each pass, matching [`ADAM7`] by index.
pub const ADAM7_INTERPOLATION: [Interpolation; 7] = [
  Interpolation { span_x: 8, span_y: 8 },
  Interpolation { span_x: 4, span_y: 8 },
  Interpolation { span_x: 4, span_y: 4 },
  Interpolation { span_x: 2, span_y: 4 },
  Interpolation { span_x: 2, span_y: 2 },
  Interpolation { span_x: 1, span_y: 2 },
  Interpolation { span_x: 1, span_y: 1 },
];

/// Derived geometry of one pass for a particular image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PassSizes {
  /// pixels per scanline of this pass (may be 0).
  pub pass_width: u32,
  /// scanlines in this pass (may be 0).
  pub pass_height: u32,
  /// bytes per stored scanline, including the filter type byte.
  pub bytes_per_scanline: usize,
  /// total stored bytes of this pass.
  pub pass_bytes: usize,
}

/// Computes the geometry of one pass for an image of the given dimensions.
///
/// A pass whose offset falls outside the image on either axis has a width or
/// height of 0 (and then `pass_bytes` is 0: an empty pass stores nothing, not
/// even filter type bytes).
#[inline]
#[must_use]
pub const fn pass_sizes(
  width: u32, height: u32, bytes_per_pixel: usize, interlacing: Interlacing,
) -> PassSizes {
  let Interlacing { x_factor, y_factor, x_offset, y_offset } = interlacing;
  // ceiling division in u64: the `+ factor - 1` step must not wrap for
  // declared dimensions near u32::MAX.
  let pass_width =
    (((width.saturating_sub(x_offset) as u64) + (x_factor as u64) - 1) / (x_factor as u64)) as u32;
  let pass_height =
    (((height.saturating_sub(y_offset) as u64) + (y_factor as u64) - 1) / (y_factor as u64)) as u32;
  let bytes_per_scanline = (pass_width as usize).saturating_mul(bytes_per_pixel).saturating_add(1);
  let pass_bytes = if pass_width == 0 || pass_height == 0 {
    0
  } else {
    bytes_per_scanline.saturating_mul(pass_height as usize)
  };
  PassSizes { pass_width, pass_height, bytes_per_scanline, pass_bytes }
}
