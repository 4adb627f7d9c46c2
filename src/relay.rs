#![forbid(unsafe_code)]

//! The bounded hand-off between the decode pipeline and the consumer.
//!
//! The relay is where backpressure lives: the pipeline stops being pumped
//! while the relay is full, so a slow consumer bounds how much decoded pixel
//! data can pile up. It is also where a mid-stream error is sequenced: batches
//! queued before the failure still reach the consumer, the error comes after
//! them, and nothing follows the error.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::chunk::IHDR;
use crate::error::{PngError, PngResult};
use crate::interlace::Interpolation;
use crate::pixel_formats::RGBA8888;

/// One decoded pixel at its final image position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedPixel {
  pub x: u32,
  pub y: u32,
  pub color: RGBA8888,
}

/// One scanline's worth of decoded pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBatch {
  /// the interlace pass these pixels came from, `None` when the image is not
  /// interlaced.
  pub pass: Option<usize>,
  /// for interlaced images, how large a block each pixel may be painted as
  /// until a later pass refines it.
  pub interpolation: Option<Interpolation>,
  pub pixels: Vec<PlacedPixel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayState {
  /// nothing delivered yet; waiting on the header.
  AwaitingHeader,
  /// header delivered; batches flowing.
  StreamingBody,
  /// ended (cleanly or by error); everything further is dropped.
  Closed,
}

/// Bounded batch queue between producer and consumer.
#[derive(Debug, Clone)]
pub struct BatchRelay {
  state: RelayState,
  header: Option<IHDR>,
  batches: VecDeque<PixelBatch>,
  error: Option<PngError>,
  capacity: usize,
}
impl BatchRelay {
  /// `capacity` is the most batches that can wait in the relay at once;
  /// callers should check [`is_full`](Self::is_full) before producing more.
  #[inline]
  #[must_use]
  pub fn new(capacity: usize) -> Self {
    Self {
      state: RelayState::AwaitingHeader,
      header: None,
      batches: VecDeque::new(),
      error: None,
      capacity,
    }
  }

  /// The image header, once [`start`](Self::start) has delivered it.
  #[inline]
  #[must_use]
  pub fn header(&self) -> Option<IHDR> {
    self.header
  }

  #[inline]
  #[must_use]
  pub fn is_full(&self) -> bool {
    self.batches.len() >= self.capacity
  }

  /// How many batches are waiting right now.
  #[inline]
  #[must_use]
  pub fn queued(&self) -> usize {
    self.batches.len()
  }

  #[inline]
  #[must_use]
  pub fn is_closed(&self) -> bool {
    self.state == RelayState::Closed
  }

  /// Delivers the header and opens the body.
  pub fn start(&mut self, header: IHDR) {
    debug_assert_eq!(self.state, RelayState::AwaitingHeader);
    if self.state == RelayState::AwaitingHeader {
      self.header = Some(header);
      self.state = RelayState::StreamingBody;
    }
  }

  /// Queues one batch. Batches produced before the header or after close are
  /// a producer bug and get dropped.
  pub fn data(&mut self, batch: PixelBatch) {
    debug_assert_ne!(self.state, RelayState::AwaitingHeader);
    if self.state == RelayState::StreamingBody {
      self.batches.push_back(batch);
    }
  }

  /// Ends the stream cleanly.
  pub fn end(&mut self) {
    self.state = RelayState::Closed;
  }

  /// Ends the stream with an error. The error is handed out only after the
  /// batches already queued; a second failure after close is ignored.
  pub fn fail(&mut self, error: PngError) {
    if self.state != RelayState::Closed {
      self.error = Some(error);
      self.state = RelayState::Closed;
    }
  }

  /// Takes the next queued item: a batch, then (per stream) at most one
  /// error, then `None` forever.
  pub fn pull(&mut self) -> Option<PngResult<PixelBatch>> {
    if let Some(batch) = self.batches.pop_front() {
      return Some(Ok(batch));
    }
    self.error.take().map(Err)
  }

  /// `true` when nothing is queued and the stream has closed.
  #[inline]
  #[must_use]
  pub fn is_drained(&self) -> bool {
    self.is_closed() && self.batches.is_empty() && self.error.is_none()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::chunk::IHDR;
  use alloc::vec;

  fn tiny_header() -> IHDR {
    IHDR::from_chunk_data(&[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]).unwrap()
  }

  fn batch(y: u32) -> PixelBatch {
    PixelBatch {
      pass: None,
      interpolation: None,
      pixels: vec![PlacedPixel { x: 0, y, color: RGBA8888::opaque(1, 2, 3) }],
    }
  }

  #[test]
  fn batches_come_out_in_order_then_none() {
    let mut relay = BatchRelay::new(4);
    relay.start(tiny_header());
    relay.data(batch(0));
    relay.data(batch(1));
    relay.end();
    assert_eq!(relay.pull(), Some(Ok(batch(0))));
    assert_eq!(relay.pull(), Some(Ok(batch(1))));
    assert_eq!(relay.pull(), None);
    assert!(relay.is_drained());
  }

  #[test]
  fn queued_batches_precede_a_failure() {
    let mut relay = BatchRelay::new(4);
    relay.start(tiny_header());
    relay.data(batch(0));
    relay.fail(PngError::UnexpectedEndOfInput);
    assert_eq!(relay.pull(), Some(Ok(batch(0))));
    assert_eq!(relay.pull(), Some(Err(PngError::UnexpectedEndOfInput)));
    assert_eq!(relay.pull(), None);
  }

  #[test]
  fn capacity_reports_fullness() {
    let mut relay = BatchRelay::new(2);
    relay.start(tiny_header());
    assert!(!relay.is_full());
    relay.data(batch(0));
    relay.data(batch(1));
    assert!(relay.is_full());
    let _ = relay.pull();
    assert!(!relay.is_full());
  }

  #[test]
  fn data_after_close_is_dropped() {
    let mut relay = BatchRelay::new(4);
    relay.start(tiny_header());
    relay.end();
    relay.data(batch(0));
    assert_eq!(relay.pull(), None);
  }
}
