#![forbid(unsafe_code)]

//! Incremental chunk framing over arbitrarily split input buffers.
//!
//! The framer is push-based: feed it whatever byte runs the source hands you,
//! in any sizes, and it emits [`FramerEvent`] values as soon as enough bytes
//! have accumulated. Known non-`IDAT` chunk bodies are re-assembled in a
//! backlog and parsed whole; `IDAT` bodies are forwarded as
//! [`FramerEvent::ImageData`] sub-pieces without ever being buffered in full,
//! and unrecognized bodies are discarded as they arrive. Memory stays flat no
//! matter how large the image data or a stray private chunk is.

use alloc::vec::Vec;

use crate::chunk::{IDAT, ParseContext, PngChunk, PngChunkType, UnknownChunk, IHDR, PNG_SIGNATURE};
use crate::error::{PngError, PngResult};

/// One thing the framer recognized in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerEvent {
  /// A complete parsed chunk. For `IDAT` this is the length marker, emitted
  /// before the body's `ImageData` pieces.
  Chunk(PngChunk),
  /// A piece of some `IDAT` chunk's body. Consecutive pieces, across `IDAT`
  /// chunk boundaries, form one continuous zlib stream.
  ImageData(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
  /// waiting on the 8 signature bytes.
  Signature,
  /// waiting on the 8 bytes of length + type tag.
  ChunkHeader,
  /// re-assembling a known non-`IDAT` body plus its 4 CRC bytes.
  ChunkBody { type_: PngChunkType, length: u32 },
  /// forwarding an `IDAT` body as it arrives.
  IdatBody { body_left: u32 },
  /// discarding an unrecognized chunk's body as it arrives, never buffering
  /// it.
  SkipBody { type_: PngChunkType, length: u32, body_left: u32 },
  /// waiting on the 4 CRC bytes after a streamed-through body.
  Trailer,
  /// saw `IEND`; all further input is ignored.
  Done,
}

/// Splits a pushed byte stream into chunks.
///
/// Holds the [`ParseContext`] for the stream, so chunk ordering rules
/// (signature first, `IHDR` first chunk, palette before indexed transparency)
/// are enforced here as the bytes arrive.
#[derive(Debug, Clone)]
pub struct ChunkFramer {
  backlog: Vec<u8>,
  state: FramerState,
  ctx: ParseContext,
}
impl Default for ChunkFramer {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}
impl ChunkFramer {
  #[inline]
  #[must_use]
  pub fn new() -> Self {
    Self { backlog: Vec::new(), state: FramerState::Signature, ctx: ParseContext::default() }
  }

  /// The stream state accumulated from the chunks seen so far.
  #[inline]
  #[must_use]
  pub fn parse_context(&self) -> &ParseContext {
    &self.ctx
  }

  /// The image header, once its chunk has been parsed.
  #[inline]
  #[must_use]
  pub fn header(&self) -> Option<IHDR> {
    self.ctx.ihdr
  }

  /// `true` after `IEND` has been seen.
  #[inline]
  #[must_use]
  pub fn is_done(&self) -> bool {
    self.state == FramerState::Done
  }

  /// Feeds more input, invoking `on_event` for everything completed by it.
  ///
  /// Errors are not recoverable: once `push` fails, the framer should not be
  /// fed again.
  pub fn push(&mut self, input: &[u8], mut on_event: impl FnMut(FramerEvent)) -> PngResult<()> {
    self.backlog.extend_from_slice(input);
    let mut cursor = 0_usize;
    loop {
      let available = self.backlog.len() - cursor;
      match self.state {
        FramerState::Signature => {
          if available < PNG_SIGNATURE.len() {
            break;
          }
          if self.backlog[cursor..cursor + 8] != PNG_SIGNATURE {
            return Err(PngError::NoPngSignature);
          }
          cursor += 8;
          self.state = FramerState::ChunkHeader;
        }
        FramerState::ChunkHeader => {
          if available < 8 {
            break;
          }
          let header: [u8; 8] =
            self.backlog[cursor..cursor + 8].try_into().unwrap_or([0; 8]);
          let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
          let type_ = PngChunkType([header[4], header[5], header[6], header[7]]);
          if self.ctx.ihdr.is_none() && type_ != PngChunkType::IHDR {
            return Err(PngError::FirstChunkNotIhdr);
          }
          if self.ctx.ihdr.is_some() && type_ == PngChunkType::IHDR {
            return Err(PngError::IhdrIllegalData);
          }
          cursor += 8;
          if type_ == PngChunkType::IDAT {
            on_event(FramerEvent::Chunk(PngChunk::IDAT(IDAT { length })));
            self.state = FramerState::IdatBody { body_left: length };
          } else if type_.is_known() {
            self.state = FramerState::ChunkBody { type_, length };
          } else {
            self.state = FramerState::SkipBody { type_, length, body_left: length };
          }
        }
        FramerState::ChunkBody { type_, length } => {
          let need = (length as usize) + 4;
          if available < need {
            break;
          }
          let chunk = {
            let body = &self.backlog[cursor..cursor + (length as usize)];
            PngChunk::parse(type_, body, &self.ctx)?
          };
          cursor += need;
          self.state = if chunk == PngChunk::IEND {
            FramerState::Done
          } else {
            FramerState::ChunkHeader
          };
          self.absorb(&chunk);
          on_event(FramerEvent::Chunk(chunk));
        }
        FramerState::IdatBody { body_left } => {
          if body_left == 0 {
            self.state = FramerState::Trailer;
            continue;
          }
          if available == 0 {
            break;
          }
          let take = available.min(body_left as usize);
          on_event(FramerEvent::ImageData(self.backlog[cursor..cursor + take].to_vec()));
          cursor += take;
          self.state = FramerState::IdatBody { body_left: body_left - (take as u32) };
        }
        FramerState::SkipBody { type_, length, body_left } => {
          if body_left == 0 {
            on_event(FramerEvent::Chunk(PngChunk::Unknown(UnknownChunk { type_, length })));
            self.state = FramerState::Trailer;
            continue;
          }
          if available == 0 {
            break;
          }
          let take = available.min(body_left as usize);
          cursor += take;
          self.state = FramerState::SkipBody { type_, length, body_left: body_left - (take as u32) };
        }
        FramerState::Trailer => {
          if available < 4 {
            break;
          }
          cursor += 4;
          self.state = FramerState::ChunkHeader;
        }
        FramerState::Done => {
          // chunks after the image trailer are not part of the image.
          cursor = self.backlog.len();
          break;
        }
      }
    }
    self.backlog.drain(..cursor);
    Ok(())
  }

  /// Declares the input over. Errors if the stream stopped before `IEND`.
  pub fn finish(&self) -> PngResult<()> {
    if self.is_done() {
      Ok(())
    } else {
      Err(PngError::UnexpectedEndOfInput)
    }
  }

  fn absorb(&mut self, chunk: &PngChunk) {
    match chunk {
      PngChunk::IHDR(ihdr) => self.ctx.ihdr = Some(*ihdr),
      PngChunk::PLTE(plte) => self.ctx.palette = Some(plte.clone()),
      PngChunk::tRNS(trns) => self.ctx.transparency = Some(trns.clone()),
      _ => (),
    }
  }
}
