#![forbid(unsafe_code)]

//! Whole-buffer decode: the entire datastream is in memory up front.
//!
//! Runs the same framing, inflating, unfiltering, and conversion stages as
//! the streaming path, just driven to completion in one call, and returns
//! the finished [`Bitmap`] along with every chunk of the stream. This is
//! also where the filter analysis lives, since re-filtering needs the whole
//! image in hand.

use alloc::vec;
use alloc::vec::Vec;

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::bitmap::Bitmap;
use crate::chunk::{IHDR, PngChunk};
use crate::convert::payload_to_rgba;
use crate::error::{PngError, PngResult};
use crate::filters::{filter_scanline, unfilter_scanline, PngFilterType};
use crate::framer::{ChunkFramer, FramerEvent};
use crate::inflate::StreamInflater;
use crate::interlace::ADAM7;
use crate::scanlines::ScanlineAssembler;
use crate::stream::DecodeOptions;
use crate::pixel_formats::RGBA8888;

/// Everything a whole-buffer decode produces.
#[derive(Debug, Clone)]
pub struct DecodedImage {
  /// the image header.
  pub header: IHDR,
  /// every chunk of the stream, in order (`IDAT` as length markers).
  pub chunks: Vec<PngChunk>,
  /// the decoded pixels. Positions left undecoded (interlace passes past
  /// [`DecodeOptions::interlace_level`]) stay zeroed.
  pub pixels: Bitmap<RGBA8888>,
  /// compressed image data bytes consumed.
  pub compressed_size: usize,
  /// decompressed image data bytes produced.
  pub decompressed_size: usize,
  /// with [`DecodeOptions::analyze`]: the zlib-compressed size of the image
  /// data when every scanline is re-filtered with one filter type, indexed
  /// by filter type 0 through 4.
  pub filter_comparison: Option<[usize; 5]>,
}

/// Decodes a complete in-memory PNG datastream.
pub fn decode_whole(bytes: &[u8], options: &DecodeOptions) -> PngResult<DecodedImage> {
  options.validate()?;

  let mut framer = ChunkFramer::new();
  let mut chunks: Vec<PngChunk> = Vec::new();
  let mut data_pieces: Vec<Vec<u8>> = Vec::new();
  framer.push(bytes, |event| match event {
    FramerEvent::Chunk(chunk) => chunks.push(chunk),
    FramerEvent::ImageData(piece) => data_pieces.push(piece),
  })?;
  framer.finish()?;
  let header = framer.header().ok_or(PngError::UnexpectedEndOfInput)?;
  if header.bit_depth < 8 {
    return Err(PngError::UnsupportedBitDepth);
  }

  let mut inflater = StreamInflater::new();
  let mut decompressed: Vec<u8> = Vec::new();
  for piece in &data_pieces {
    inflater.push(piece, |run| decompressed.extend_from_slice(run))?;
  }

  let mut assembler = ScanlineAssembler::new(&header);
  let mut lines = Vec::new();
  assembler.push(&decompressed, |line| lines.push(line));
  if !assembler.is_finished() {
    return Err(PngError::UnexpectedEndOfInput);
  }

  let ctx = framer.parse_context();
  let mut pixels = Bitmap::new_with(header.width, header.height, RGBA8888::default());
  let mut raw_rows: Vec<(Option<usize>, Vec<u8>)> = Vec::new();
  let mut prev: Option<Vec<u8>> = None;
  let mut last_pass: Option<Option<usize>> = None;
  for mut line in lines {
    if last_pass != Some(line.pass) {
      last_pass = Some(line.pass);
      prev = None;
    }
    let (filter_byte, payload) = match line.data.split_first_mut() {
      Some(split) => split,
      None => return Err(PngError::UnexpectedEndOfInput),
    };
    let mut filter = PngFilterType::try_from(*filter_byte)?;
    if line.row != 0 {
      if let Some(forced) = options.force_filter_type {
        filter = PngFilterType::try_from(forced)?;
      }
    }
    unfilter_scanline(filter, header.bytes_per_pixel(), payload, prev.as_deref());

    let past_requested_pass = matches!(
      (options.interlace_level, line.pass),
      (Some(level), Some(pass)) if pass > (level as usize)
    );
    if !past_requested_pass {
      let colors =
        payload_to_rgba(&header, ctx.palette.as_ref(), ctx.transparency.as_ref(), payload)?;
      for (i, color) in colors.into_iter().enumerate() {
        let (x, y) = match line.pass {
          None => (i as u32, line.row),
          Some(pass) => ADAM7[pass].remap(i as u32, line.row),
        };
        if let Some(px) = pixels.get_mut(x, y) {
          *px = color;
        }
      }
    }
    if options.analyze {
      raw_rows.push((line.pass, payload.to_vec()));
    }
    prev = Some(payload.to_vec());
  }

  let filter_comparison =
    if options.analyze { Some(compare_filters(&header, &raw_rows)) } else { None };

  Ok(DecodedImage {
    header,
    chunks,
    pixels,
    compressed_size: inflater.compressed_bytes(),
    decompressed_size: inflater.decompressed_bytes(),
    filter_comparison,
  })
}

/// Re-filters every scanline with each filter type in turn and compresses
/// the result, reporting the five compressed sizes.
///
/// The previous-line chain resets at pass boundaries exactly as it does when
/// decoding, so the comparison measures what an encoder committed to one
/// filter type would actually have produced.
fn compare_filters(header: &IHDR, raw_rows: &[(Option<usize>, Vec<u8>)]) -> [usize; 5] {
  let bpp = header.bytes_per_pixel();
  let mut sizes = [0_usize; 5];
  for (type_byte, size) in sizes.iter_mut().enumerate() {
    let filter = match PngFilterType::try_from(type_byte as u8) {
      Ok(f) => f,
      Err(_) => continue,
    };
    let mut stream: Vec<u8> = Vec::new();
    let mut prev: Option<&[u8]> = None;
    let mut last_pass: Option<Option<usize>> = None;
    for (pass, payload) in raw_rows {
      if last_pass != Some(*pass) {
        last_pass = Some(*pass);
        prev = None;
      }
      stream.push(type_byte as u8);
      let mut dest = vec![0_u8; payload.len()];
      filter_scanline(filter, bpp, payload, prev, &mut dest);
      stream.extend_from_slice(&dest);
      prev = Some(payload);
    }
    *size = compress_to_vec_zlib(&stream, 6).len();
  }
  sizes
}
