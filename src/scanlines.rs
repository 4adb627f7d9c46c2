#![forbid(unsafe_code)]

//! Slicing the decompressed byte stream into stored scanlines.
//!
//! Decompressed output arrives in runs whose boundaries have nothing to do
//! with scanline boundaries. The assembler buffers the partial line and emits
//! each complete stored scanline (filter type byte plus payload) tagged with
//! the pass and row it belongs to, following the image's pass schedule.

use alloc::vec::Vec;

use crate::chunk::IHDR;
use crate::interlace::{pass_sizes, ADAM7};

/// One stored scanline: the filter type byte followed by the filtered pixel
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawScanline {
  /// which interlace pass this line belongs to, `None` for a non-interlaced
  /// image.
  pub pass: Option<usize>,
  /// row within the pass (or image), starting at 0.
  pub row: u32,
  /// filter type byte + payload bytes.
  pub data: Vec<u8>,
}

/// One stretch of same-sized scanlines from the schedule.
#[derive(Debug, Clone, Copy)]
struct PassPlan {
  pass: Option<usize>,
  rows: u32,
  bytes_per_scanline: usize,
}

/// Re-frames decompressed runs into scanlines.
#[derive(Debug, Clone)]
pub struct ScanlineAssembler {
  backlog: Vec<u8>,
  plan: Vec<PassPlan>,
  plan_index: usize,
  row: u32,
}
impl ScanlineAssembler {
  /// Builds the pass schedule for an image. Empty interlace passes are left
  /// out of the schedule entirely, matching their absence from the data
  /// stream.
  #[must_use]
  pub fn new(ihdr: &IHDR) -> Self {
    let mut plan = Vec::new();
    if ihdr.is_interlaced {
      for (i, interlacing) in ADAM7.into_iter().enumerate() {
        let sizes = pass_sizes(ihdr.width, ihdr.height, ihdr.bytes_per_pixel(), interlacing);
        if sizes.pass_bytes > 0 {
          plan.push(PassPlan {
            pass: Some(i),
            rows: sizes.pass_height,
            bytes_per_scanline: sizes.bytes_per_scanline,
          });
        }
      }
    } else {
      plan.push(PassPlan {
        pass: None,
        rows: ihdr.height,
        bytes_per_scanline: ihdr.bytes_per_scanline(ihdr.width),
      });
    }
    Self { backlog: Vec::new(), plan, plan_index: 0, row: 0 }
  }

  /// `true` once every scanline of every pass has been emitted. Further input
  /// is surplus and gets dropped.
  #[inline]
  #[must_use]
  pub fn is_finished(&self) -> bool {
    self.plan_index >= self.plan.len()
  }

  /// Feeds one decompressed run, emitting each scanline it completes.
  pub fn push(&mut self, data: &[u8], mut on_line: impl FnMut(RawScanline)) {
    if self.is_finished() {
      return;
    }
    self.backlog.extend_from_slice(data);
    let mut cursor = 0_usize;
    while let Some(plan) = self.plan.get(self.plan_index) {
      if self.backlog.len() - cursor < plan.bytes_per_scanline {
        break;
      }
      let line = self.backlog[cursor..cursor + plan.bytes_per_scanline].to_vec();
      cursor += plan.bytes_per_scanline;
      on_line(RawScanline { pass: plan.pass, row: self.row, data: line });
      self.row += 1;
      if self.row == plan.rows {
        self.plan_index += 1;
        self.row = 0;
      }
    }
    if self.is_finished() {
      self.backlog.clear();
    } else {
      self.backlog.drain(..cursor);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use alloc::vec;

  fn header(bytes: &[u8]) -> IHDR {
    IHDR::from_chunk_data(bytes).unwrap()
  }

  fn collect(assembler: &mut ScanlineAssembler, pieces: &[&[u8]]) -> Vec<RawScanline> {
    let mut lines = Vec::new();
    for piece in pieces {
      assembler.push(piece, |line| lines.push(line));
    }
    lines
  }

  #[test]
  fn progressive_lines_from_split_runs() {
    // 3x2 grayscale: each stored line is 1 filter byte + 3 payload bytes.
    let ihdr = header(&[0, 0, 0, 3, 0, 0, 0, 2, 8, 0, 0, 0, 0]);
    let mut assembler = ScanlineAssembler::new(&ihdr);
    let stream = [0, 1, 2, 3, 0, 4, 5, 6];
    let lines = collect(&mut assembler, &[&stream[..3], &stream[3..5], &stream[5..]]);
    assert_eq!(
      lines,
      vec![
        RawScanline { pass: None, row: 0, data: vec![0, 1, 2, 3] },
        RawScanline { pass: None, row: 1, data: vec![0, 4, 5, 6] },
      ]
    );
    assert!(assembler.is_finished());
  }

  #[test]
  fn interlaced_schedule_for_an_8x8_image() {
    let ihdr = header(&[0, 0, 0, 8, 0, 0, 0, 8, 8, 0, 0, 0, 1]);
    let mut assembler = ScanlineAssembler::new(&ihdr);
    // stored bytes per pass of an 8x8 grayscale: widths 1,1,2,2,4,4,8 and
    // heights 1,1,1,2,2,4,4.
    let total = (1 + 1) + (1 + 1) + (2 + 1) + (2 + 1) * 2 + (4 + 1) * 2 + (4 + 1) * 4 + (8 + 1) * 4;
    let stream = vec![0_u8; total];
    let lines = collect(&mut assembler, &[&stream]);
    let schedule: Vec<(Option<usize>, u32, usize)> =
      lines.iter().map(|l| (l.pass, l.row, l.data.len())).collect();
    assert_eq!(
      schedule,
      vec![
        (Some(0), 0, 2),
        (Some(1), 0, 2),
        (Some(2), 0, 3),
        (Some(3), 0, 3),
        (Some(3), 1, 3),
        (Some(4), 0, 5),
        (Some(4), 1, 5),
        (Some(5), 0, 5),
        (Some(5), 1, 5),
        (Some(5), 2, 5),
        (Some(5), 3, 5),
        (Some(6), 0, 9),
        (Some(6), 1, 9),
        (Some(6), 2, 9),
        (Some(6), 3, 9),
      ]
    );
    assert!(assembler.is_finished());
  }

  #[test]
  fn empty_passes_are_skipped() {
    // a 1x1 interlaced image has data in pass 0 only.
    let ihdr = header(&[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 1]);
    let mut assembler = ScanlineAssembler::new(&ihdr);
    let lines = collect(&mut assembler, &[&[0, 77]]);
    assert_eq!(lines, vec![RawScanline { pass: Some(0), row: 0, data: vec![0, 77] }]);
    assert!(assembler.is_finished());
  }

  #[test]
  fn surplus_bytes_are_dropped() {
    let ihdr = header(&[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]);
    let mut assembler = ScanlineAssembler::new(&ihdr);
    let lines = collect(&mut assembler, &[&[0, 5, 99, 99, 99]]);
    assert_eq!(lines.len(), 1);
    assert!(assembler.is_finished());
  }
}
