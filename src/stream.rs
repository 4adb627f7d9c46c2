#![forbid(unsafe_code)]

//! Streaming decode: pixels come out while bytes are still going in.
//!
//! [`decode_streaming`] adapts a pull source (any iterator of byte buffers)
//! to the push-based framing/inflating pipeline and hands back a
//! [`PixelStream`]: an iterator of decoded [`PixelBatch`] values, one stored
//! scanline each. The source is only polled while the consumer is asking for
//! batches and the relay has nothing queued, so a slow consumer also slows
//! the reading side instead of forcing the whole image into memory.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::chunk::{IHDR, PngChunk};
use crate::convert::payload_to_rgba;
use crate::error::{PngError, PngResult};
use crate::filters::{unfilter_scanline, PngFilterType};
use crate::framer::{ChunkFramer, FramerEvent};
use crate::inflate::StreamInflater;
use crate::interlace::{ADAM7, ADAM7_INTERPOLATION};
use crate::relay::{BatchRelay, PixelBatch, PlacedPixel};
use crate::scanlines::{RawScanline, ScanlineAssembler};

/// How much compressed image data one pump step feeds the decompressor.
/// Keeps a whole-file source buffer from turning into the whole image at
/// once.
const IDAT_FEED_STEP: usize = 8 * 1024;

/// Knobs for a decode. `Default` is a plain full decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
  /// When set, unfilter every scanline except the first of each pass as if
  /// its filter type byte were this value (0 through 4). A diagnostic knob:
  /// the right image only comes out when the value matches what the encoder
  /// actually used.
  pub force_filter_type: Option<u8>,
  /// When set, stop an interlaced decode after this pass (0 through 6).
  /// Non-interlaced images decode fully regardless.
  pub interlace_level: Option<u8>,
  /// Re-filter and re-compress the image with each filter type and report
  /// the compressed sizes. Whole-buffer decodes only.
  pub analyze: bool,
  /// How many decoded batches may wait in the hand-off queue, must be > 0.
  pub max_buffered_batches: usize,
}
impl Default for DecodeOptions {
  #[inline]
  fn default() -> Self {
    Self {
      force_filter_type: None,
      interlace_level: None,
      analyze: false,
      max_buffered_batches: 32,
    }
  }
}
impl DecodeOptions {
  /// Checks the option values themselves, before any input is consumed.
  pub fn validate(&self) -> PngResult<()> {
    if self.force_filter_type.map(|f| f > 4).unwrap_or(false)
      || self.interlace_level.map(|level| level > 6).unwrap_or(false)
      || self.max_buffered_batches == 0
    {
      return Err(PngError::IllegalDecodeOption);
    }
    Ok(())
  }
}

/// Starts a streaming decode over a source of byte buffers.
///
/// Buffers may split the stream anywhere, down to one byte each. The call
/// polls the source just far enough to resolve the image header, then
/// returns; pixel work happens as the returned stream is iterated. Errors
/// found before the header (bad signature, bad `IHDR`, source ending early)
/// come back from this call directly.
pub fn decode_streaming<S>(
  source: S, options: &DecodeOptions,
) -> PngResult<PixelStream<S::IntoIter>>
where
  S: IntoIterator<Item = Vec<u8>>,
{
  options.validate()?;
  if options.analyze {
    // analysis needs the whole image in hand; it has no streaming shape.
    return Err(PngError::IllegalDecodeOption);
  }
  let mut stream = PixelStream {
    source: source.into_iter(),
    framer: ChunkFramer::new(),
    inflater: StreamInflater::new(),
    assembler: None,
    relay: BatchRelay::new(options.max_buffered_batches),
    chunks: Vec::new(),
    pending_input: VecDeque::new(),
    pending_runs: VecDeque::new(),
    pending_lines: VecDeque::new(),
    saw_iend: false,
    prev_line: None,
    last_pass: None,
    options: *options,
  };
  while stream.relay.header().is_none() && !stream.relay.is_closed() && !stream.relay.is_full() {
    if !stream.advance() {
      break;
    }
  }
  match stream.relay.header() {
    Some(_) => Ok(stream),
    None => Err(match stream.relay.pull() {
      Some(Err(error)) => error,
      _ => PngError::UnexpectedEndOfInput,
    }),
  }
}

/// A decode in progress: iterate it for batches of placed pixels.
///
/// Batches arrive in stored order, one per scanline. For an interlaced image
/// that is pass order, each batch carrying the interpolation span its pixels
/// may be painted with until a later pass refines them. A mid-stream error is
/// yielded as the final `Err` item, after every batch decoded before the
/// failure.
#[derive(Debug)]
pub struct PixelStream<S: Iterator<Item = Vec<u8>>> {
  source: S,
  framer: ChunkFramer,
  inflater: StreamInflater,
  assembler: Option<ScanlineAssembler>,
  relay: BatchRelay,
  chunks: Vec<PngChunk>,
  /// compressed image data pieces not yet fed to the decompressor.
  pending_input: VecDeque<Vec<u8>>,
  /// decompressed runs not yet sliced into scanlines.
  pending_runs: VecDeque<Vec<u8>>,
  /// assembled scanlines not yet decoded into batches.
  pending_lines: VecDeque<RawScanline>,
  saw_iend: bool,
  prev_line: Option<Vec<u8>>,
  last_pass: Option<Option<usize>>,
  options: DecodeOptions,
}
impl<S: Iterator<Item = Vec<u8>>> PixelStream<S> {
  /// The image header. Always present on a stream returned by
  /// [`decode_streaming`].
  #[inline]
  #[must_use]
  pub fn header(&self) -> Option<IHDR> {
    self.relay.header()
  }

  /// The non-pixel chunks seen so far, in stream order. Grows as the stream
  /// is iterated.
  #[inline]
  #[must_use]
  pub fn chunks(&self) -> &[PngChunk] {
    &self.chunks
  }

  /// Total compressed image data bytes consumed so far.
  #[inline]
  #[must_use]
  pub fn compressed_bytes(&self) -> usize {
    self.inflater.compressed_bytes()
  }

  /// Total decompressed image data bytes produced so far.
  #[inline]
  #[must_use]
  pub fn decompressed_bytes(&self) -> usize {
    self.inflater.decompressed_bytes()
  }

  /// Decoded batches currently waiting in the hand-off queue. Never exceeds
  /// [`DecodeOptions::max_buffered_batches`], however the source chooses to
  /// split its buffers.
  #[inline]
  #[must_use]
  pub fn buffered_batches(&self) -> usize {
    self.relay.queued()
  }

  /// Makes one bounded step of progress, nearest-to-the-consumer work first:
  /// pending scanlines become batches while the relay has room, then one
  /// decompressed run becomes scanlines, then one [`IDAT_FEED_STEP`] of
  /// compressed data is inflated, and only with all of that drained is the
  /// source polled for another buffer. `false` when no step is possible
  /// (relay closed, or full and waiting on the consumer).
  fn advance(&mut self) -> bool {
    if self.relay.is_closed() {
      return false;
    }
    if !self.pending_lines.is_empty() {
      while !self.relay.is_full() && !self.relay.is_closed() {
        match self.pending_lines.pop_front() {
          Some(line) => self.handle_scanline(line),
          None => break,
        }
      }
      return true;
    }
    if self.relay.is_full() {
      return false;
    }
    if let Some(run) = self.pending_runs.pop_front() {
      let mut lines = Vec::new();
      if let Some(assembler) = &mut self.assembler {
        assembler.push(&run, |line| lines.push(line));
      }
      self.pending_lines.extend(lines);
      return true;
    }
    if let Some(mut piece) = self.pending_input.pop_front() {
      if piece.len() > IDAT_FEED_STEP {
        let rest = piece.split_off(IDAT_FEED_STEP);
        self.pending_input.push_front(rest);
      }
      let mut runs = Vec::new();
      if let Err(error) = self.inflater.push(&piece, |run| runs.push(run.to_vec())) {
        self.relay.fail(error);
        return true;
      }
      self.pending_runs.extend(runs);
      return true;
    }
    if self.saw_iend {
      // the trailer was seen and the pipeline is drained; settle the stream.
      let all_lines_out = self.assembler.as_ref().map(|a| a.is_finished()).unwrap_or(false);
      if all_lines_out {
        self.relay.end();
      } else {
        self.relay.fail(PngError::UnexpectedEndOfInput);
      }
      return true;
    }
    match self.source.next() {
      Some(piece) => {
        let mut events = Vec::new();
        let pushed = self.framer.push(&piece, |ev| events.push(ev));
        // events completed before a framing error still count.
        for event in events {
          self.handle_event(event);
        }
        if let Err(error) = pushed {
          self.relay.fail(error);
        }
        true
      }
      None => {
        match self.framer.finish() {
          Ok(()) => self.relay.end(),
          Err(error) => self.relay.fail(error),
        }
        true
      }
    }
  }

  fn handle_event(&mut self, event: FramerEvent) {
    if self.relay.is_closed() {
      return;
    }
    match event {
      FramerEvent::Chunk(PngChunk::IHDR(ihdr)) => {
        self.chunks.push(PngChunk::IHDR(ihdr));
        if ihdr.bit_depth < 8 {
          // sub-byte depths parse fine but this decoder doesn't unpack them.
          self.relay.fail(PngError::UnsupportedBitDepth);
          return;
        }
        self.assembler = Some(ScanlineAssembler::new(&ihdr));
        self.relay.start(ihdr);
      }
      FramerEvent::Chunk(PngChunk::IEND) => {
        // completeness is judged later, once the pending queues drain.
        self.chunks.push(PngChunk::IEND);
        self.saw_iend = true;
      }
      FramerEvent::Chunk(other) => self.chunks.push(other),
      FramerEvent::ImageData(piece) => self.pending_input.push_back(piece),
    }
  }

  fn handle_scanline(&mut self, line: RawScanline) {
    let header = match self.relay.header() {
      Some(h) => h,
      None => return,
    };
    if self.last_pass != Some(line.pass) {
      self.last_pass = Some(line.pass);
      self.prev_line = None;
    }
    if let (Some(level), Some(pass)) = (self.options.interlace_level, line.pass) {
      if pass > (level as usize) {
        // everything past the requested pass is deliberately left undecoded.
        self.relay.end();
        return;
      }
    }
    let mut data = line.data;
    let (filter_byte, payload) = match data.split_first_mut() {
      Some(split) => split,
      None => return,
    };
    let mut filter = match PngFilterType::try_from(*filter_byte) {
      Ok(f) => f,
      Err(error) => {
        self.relay.fail(error);
        return;
      }
    };
    if line.row != 0 {
      if let Some(Ok(forced)) = self.options.force_filter_type.map(PngFilterType::try_from) {
        filter = forced;
      }
    }
    unfilter_scanline(filter, header.bytes_per_pixel(), payload, self.prev_line.as_deref());
    let converted = {
      let ctx = self.framer.parse_context();
      payload_to_rgba(&header, ctx.palette.as_ref(), ctx.transparency.as_ref(), payload)
    };
    let colors = match converted {
      Ok(colors) => colors,
      Err(error) => {
        self.relay.fail(error);
        return;
      }
    };
    let (pixels, interpolation) = match line.pass {
      None => {
        let pixels = colors
          .into_iter()
          .enumerate()
          .map(|(x, color)| PlacedPixel { x: x as u32, y: line.row, color })
          .collect();
        (pixels, None)
      }
      Some(pass) => {
        let interlacing = ADAM7[pass];
        let pixels = colors
          .into_iter()
          .enumerate()
          .map(|(i, color)| {
            let (x, y) = interlacing.remap(i as u32, line.row);
            PlacedPixel { x, y, color }
          })
          .collect();
        (pixels, Some(ADAM7_INTERPOLATION[pass]))
      }
    };
    self.prev_line = Some(payload.to_vec());
    self.relay.data(PixelBatch { pass: line.pass, interpolation, pixels });
  }
}

impl<S: Iterator<Item = Vec<u8>>> Iterator for PixelStream<S> {
  type Item = PngResult<PixelBatch>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if let Some(item) = self.relay.pull() {
        return Some(item);
      }
      if self.relay.is_drained() {
        return None;
      }
      if !self.advance() {
        return None;
      }
    }
  }
}
