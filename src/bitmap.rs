#![forbid(unsafe_code)]

//! A heap-allocated 2-D pixel grid, used for whole-buffer decode results.

use alloc::vec::Vec;

/// Converts an `(x,y)` position within a given `width` 2D space into a linear
/// index.
#[inline]
#[must_use]
pub const fn xy_width_to_index(x: u32, y: u32, width: u32) -> usize {
  (y * width + x) as usize
}

/// A direct-color image.
///
/// `pixels` is stored row-major, top-left origin, `width * height` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub struct Bitmap<P> {
  pub width: u32,
  pub height: u32,
  pub pixels: Vec<P>,
}
impl<P> Bitmap<P> {
  /// A bitmap of the given dimensions filled with copies of `fill`.
  #[inline]
  #[must_use]
  pub fn new_with(width: u32, height: u32, fill: P) -> Self
  where
    P: Clone,
  {
    let mut pixels = Vec::new();
    pixels.resize((width as usize) * (height as usize), fill);
    Self { width, height, pixels }
  }

  /// Gets the pixel at the position, or `None` if the position is out of
  /// bounds.
  #[inline]
  #[must_use]
  pub fn get(&self, x: u32, y: u32) -> Option<&P> {
    if x < self.width && y < self.height {
      self.pixels.get(xy_width_to_index(x, y, self.width))
    } else {
      None
    }
  }

  /// Gets the pixel at the position, or `None` if the position is out of
  /// bounds.
  #[inline]
  #[must_use]
  pub fn get_mut(&mut self, x: u32, y: u32) -> Option<&mut P> {
    if x < self.width && y < self.height {
      self.pixels.get_mut(xy_width_to_index(x, y, self.width))
    } else {
      None
    }
  }
}
