#![forbid(unsafe_code)]

//! Incremental zlib decompression of the image data stream.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use miniz_oxide::inflate::stream::{inflate, InflateState};
use miniz_oxide::{DataFormat, MZFlush, MZStatus};

use crate::error::{PngError, PngResult};

/// How much decompressed output one inflate call can hand to the sink at a
/// time. Also the upper bound on the inflater's own buffering.
const INFLATE_BUFFER_SIZE: usize = 32 * 1024;

/// Streaming zlib decompressor for the joined `IDAT` bodies.
///
/// Input arrives in whatever pieces the framer forwards; decompressed output
/// goes to a sink closure in runs of at most [`INFLATE_BUFFER_SIZE`] bytes, so
/// neither side ever holds the whole stream.
pub struct StreamInflater {
  state: Box<InflateState>,
  buffer: Vec<u8>,
  done: bool,
  compressed_bytes: usize,
  decompressed_bytes: usize,
}
impl core::fmt::Debug for StreamInflater {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("StreamInflater")
      .field("done", &self.done)
      .field("compressed_bytes", &self.compressed_bytes)
      .field("decompressed_bytes", &self.decompressed_bytes)
      .finish_non_exhaustive()
  }
}
impl Default for StreamInflater {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}
impl StreamInflater {
  #[inline]
  #[must_use]
  pub fn new() -> Self {
    Self {
      state: InflateState::new_boxed(DataFormat::Zlib),
      buffer: vec![0; INFLATE_BUFFER_SIZE],
      done: false,
      compressed_bytes: 0,
      decompressed_bytes: 0,
    }
  }

  /// `true` once the zlib stream has ended. Input pushed after that is
  /// ignored, which also swallows any padding after the deflate data.
  #[inline]
  #[must_use]
  pub fn is_done(&self) -> bool {
    self.done
  }

  /// Total compressed bytes consumed so far.
  #[inline]
  #[must_use]
  pub fn compressed_bytes(&self) -> usize {
    self.compressed_bytes
  }

  /// Total decompressed bytes produced so far.
  #[inline]
  #[must_use]
  pub fn decompressed_bytes(&self) -> usize {
    self.decompressed_bytes
  }

  /// Decompresses one piece of input, calling `on_data` with each
  /// decompressed run.
  pub fn push(&mut self, mut input: &[u8], mut on_data: impl FnMut(&[u8])) -> PngResult<()> {
    if self.done {
      return Ok(());
    }
    self.compressed_bytes += input.len();
    loop {
      let result = inflate(&mut self.state, input, &mut self.buffer, MZFlush::None);
      match result.status {
        Ok(MZStatus::Ok) => (),
        Ok(MZStatus::StreamEnd) => self.done = true,
        _ => return Err(PngError::DecompressionFailed),
      }
      self.decompressed_bytes += result.bytes_written;
      if result.bytes_written > 0 {
        on_data(&self.buffer[..result.bytes_written]);
      }
      input = &input[result.bytes_consumed..];
      if self.done || (input.is_empty() && result.bytes_written < self.buffer.len()) {
        return Ok(());
      }
    }
  }
}
