#![forbid(unsafe_code)]

//! Per-scanline predictive filtering, and how to undo it.
//!
//! From the PNG spec:
//!
//! > Filters are applied to **bytes**, not to pixels, regardless of the bit
//! > depth or color type of the image.
//!
//! So a "neighbor" here is always the byte `bytes_per_pixel` positions back,
//! and for the first `bytes_per_pixel` bytes of a line that left neighbor is
//! an implied zero. The neighbor above is the byte at the same offset in the
//! previously *reconstructed* scanline of the same pass, or zero on the first
//! scanline of a pass.

use crate::error::{PngError, PngResult};

/// The five per-scanline filter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PngFilterType {
  None = 0,
  Sub = 1,
  Up = 2,
  Average = 3,
  Paeth = 4,
}
impl TryFrom<u8> for PngFilterType {
  type Error = PngError;
  #[inline]
  fn try_from(value: u8) -> PngResult<Self> {
    Ok(match value {
      0 => Self::None,
      1 => Self::Sub,
      2 => Self::Up,
      3 => Self::Average,
      4 => Self::Paeth,
      other => return Err(PngError::IllegalFilterType(other)),
    })
  }
}

/// The Paeth filter function computes a simple linear function of the three
/// neighboring bytes (left `a`, above `b`, upper left `c`) and predicts
/// whichever neighbor is closest to it.
///
/// PNG requires this to be computed without overflow, so the math is
/// done in `i32`. It also requires that the order of the tie-breaking tests
/// not be changed.
#[inline]
#[must_use]
const fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
  let a_ = a as i32;
  let b_ = b as i32;
  let c_ = c as i32;
  let p = a_ + b_ - c_;
  let pa = (p - a_).abs();
  let pb = (p - b_).abs();
  let pc = (p - c_).abs();
  if pa <= pb && pa <= pc {
    a
  } else if pb <= pc {
    b
  } else {
    c
  }
}

/// The predictor for one byte position, reading already-reconstructed
/// neighbors. Shared by both filter directions.
#[inline]
#[must_use]
fn predict(
  filter: PngFilterType, bytes_per_pixel: usize, recon: &[u8], prev: Option<&[u8]>, i: usize,
) -> u8 {
  let left = if i >= bytes_per_pixel { recon[i - bytes_per_pixel] } else { 0 };
  let up = match prev {
    Some(p) => p[i],
    None => 0,
  };
  match filter {
    PngFilterType::None => 0,
    PngFilterType::Sub => left,
    PngFilterType::Up => up,
    // widened math so the carry of `left + up` isn't lost before halving.
    PngFilterType::Average => (((left as u32) + (up as u32)) / 2) as u8,
    PngFilterType::Paeth => {
      let up_left = match prev {
        Some(p) if i >= bytes_per_pixel => p[i - bytes_per_pixel],
        _ => 0,
      };
      paeth_predictor(left, up, up_left)
    }
  }
}

/// Reconstructs one filtered scanline in place.
///
/// * `line` is the scanline payload *without* its leading filter type byte.
/// * `prev` is the previously reconstructed scanline of the same pass, or
///   `None` on the first scanline of a pass. When present it must be the same
///   length as `line`; the caller guarantees this because every scanline of a
///   pass has the same geometry.
///
/// After the call, `line` holds reconstructed bytes and becomes the `prev` of
/// the next scanline.
pub fn unfilter_scanline(
  filter: PngFilterType, bytes_per_pixel: usize, line: &mut [u8], prev: Option<&[u8]>,
) {
  debug_assert!(prev.map(|p| p.len() == line.len()).unwrap_or(true));
  if filter == PngFilterType::None {
    return;
  }
  for i in 0..line.len() {
    let value = predict(filter, bytes_per_pixel, line, prev, i);
    line[i] = line[i].wrapping_add(value);
  }
}

/// The forward direction: filters one reconstructed scanline into `dest`.
///
/// `line` and `prev` are both *reconstructed* data, `dest` receives the
/// filtered bytes. Used by the `analyze` option and by tests.
pub fn filter_scanline(
  filter: PngFilterType, bytes_per_pixel: usize, line: &[u8], prev: Option<&[u8]>, dest: &mut [u8],
) {
  debug_assert_eq!(line.len(), dest.len());
  for i in 0..line.len() {
    let value = predict(filter, bytes_per_pixel, line, prev, i);
    dest[i] = line[i].wrapping_sub(value);
  }
}
