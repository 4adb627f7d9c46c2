#![forbid(unsafe_code)]
#![allow(non_camel_case_types)]

//! Chunk records, the image header, and chunk body parsing.
//!
//! A PNG data stream is the 8-byte signature followed by chunks of
//! `u32 big-endian length | 4-byte type tag | body | 4-byte CRC`. This module
//! holds the parsed, *owned* form of every chunk this crate understands plus
//! an [`Unknown`](PngChunk::Unknown) fallback for everything else. Owned data
//! (rather than the borrowed slices a whole-buffer parser could use) is what
//! lets the framer re-assemble chunk bodies across arbitrarily split input
//! buffers.

use alloc::string::String;
use alloc::vec::Vec;

use bytemuck::cast_slice;

use crate::error::{PngError, PngResult};
use crate::exif::{decode_exif, ExifData};
use crate::pixel_formats::RGB888;

/// The first eight bytes of a PNG datastream should match these bytes.
pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// A chunk's 4-byte type tag.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PngChunkType(pub [u8; 4]);
#[allow(nonstandard_style)]
impl PngChunkType {
  pub const IHDR: Self = Self(*b"IHDR");
  pub const PLTE: Self = Self(*b"PLTE");
  pub const IDAT: Self = Self(*b"IDAT");
  pub const IEND: Self = Self(*b"IEND");
  pub const tRNS: Self = Self(*b"tRNS");
  pub const iCCP: Self = Self(*b"iCCP");
  pub const tEXt: Self = Self(*b"tEXt");
  pub const iTXt: Self = Self(*b"iTXt");
  pub const pHYs: Self = Self(*b"pHYs");
  pub const eXIf: Self = Self(*b"eXIf");
  pub const iDOT: Self = Self(*b"iDOT");

  /// `true` for the tags whose bodies this crate parses. Anything else is
  /// carried as [`PngChunk::Unknown`] and its body bytes are skipped.
  #[inline]
  #[must_use]
  pub const fn is_known(self) -> bool {
    matches!(
      &self.0,
      b"IHDR"
        | b"PLTE"
        | b"IDAT"
        | b"IEND"
        | b"tRNS"
        | b"iCCP"
        | b"tEXt"
        | b"iTXt"
        | b"pHYs"
        | b"eXIf"
        | b"iDOT"
    )
  }
}
impl core::fmt::Debug for PngChunkType {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    use core::fmt::Write;
    f.write_char(self.0[0] as char)?;
    f.write_char(self.0[1] as char)?;
    f.write_char(self.0[2] as char)?;
    f.write_char(self.0[3] as char)?;
    Ok(())
  }
}

/// The types of color that PNG supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PngColorType {
  /// Greyscale
  Y = 0,
  /// Red, Green, Blue
  RGB = 2,
  /// Index into a palette of RGB entries.
  Index = 3,
  /// Greyscale + Alpha
  YA = 4,
  /// Red, Green, Blue, Alpha
  RGBA = 6,
}
impl PngColorType {
  /// The number of channels in this type of color.
  #[inline]
  #[must_use]
  pub const fn channel_count(self) -> usize {
    match self {
      Self::Y => 1,
      Self::RGB => 3,
      Self::Index => 1,
      Self::YA => 2,
      Self::RGBA => 4,
    }
  }
}
impl TryFrom<u8> for PngColorType {
  type Error = PngError;
  #[inline]
  fn try_from(value: u8) -> PngResult<Self> {
    Ok(match value {
      0 => PngColorType::Y,
      2 => PngColorType::RGB,
      3 => PngColorType::Index,
      4 => PngColorType::YA,
      6 => PngColorType::RGBA,
      _ => return Err(PngError::IhdrIllegalData),
    })
  }
}

/// Image Header.
///
/// Parsed once from the first chunk of the stream and immutable after that;
/// every stride computation downstream hangs off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IHDR {
  /// width in pixels, never 0
  pub width: u32,
  /// height in pixels, never 0
  pub height: u32,
  /// bits per channel
  pub bit_depth: u8,
  /// pixel color type
  pub color_type: PngColorType,
  /// always 0 (deflate), other values rejected at parse
  pub compression_method: u8,
  /// always 0 (adaptive filtering), other values rejected at parse
  pub filter_method: u8,
  /// if the image data is stored with Adam7 interlacing.
  pub is_interlaced: bool,
}
impl IHDR {
  /// Parses a 13-byte `IHDR` chunk body.
  pub fn from_chunk_data(data: &[u8]) -> PngResult<Self> {
    match *data {
      [w0, w1, w2, w3, h0, h1, h2, h3, bit_depth, color_type, compression_method, filter_method, interlace_method] =>
      {
        let width = u32::from_be_bytes([w0, w1, w2, w3]);
        let height = u32::from_be_bytes([h0, h1, h2, h3]);
        if width == 0 || height == 0 {
          return Err(PngError::WidthOrHeightZero);
        }
        // PNG caps both dimensions at 2^31 - 1.
        if width > 0x7FFF_FFFF || height > 0x7FFF_FFFF {
          return Err(PngError::IhdrIllegalData);
        }
        let color_type = PngColorType::try_from(color_type)?;
        let depth_legal = match color_type {
          PngColorType::Y => [1, 2, 4, 8, 16].contains(&bit_depth),
          PngColorType::Index => [1, 2, 4, 8].contains(&bit_depth),
          PngColorType::RGB | PngColorType::YA | PngColorType::RGBA => {
            [8, 16].contains(&bit_depth)
          }
        };
        if !depth_legal {
          return Err(PngError::IhdrIllegalData);
        }
        if compression_method != 0 {
          return Err(PngError::IllegalCompressionMethod);
        }
        if filter_method != 0 {
          return Err(PngError::IllegalFilterMethod);
        }
        let is_interlaced = match interlace_method {
          0 => false,
          1 => true,
          _ => return Err(PngError::IhdrIllegalData),
        };
        Ok(Self {
          width,
          height,
          bit_depth,
          color_type,
          compression_method,
          filter_method,
          is_interlaced,
        })
      }
      _ => Err(PngError::IhdrIllegalData),
    }
  }

  /// bits for one pixel's worth of channel data.
  #[inline]
  #[must_use]
  pub const fn bits_per_pixel(&self) -> usize {
    (self.bit_depth as usize) * self.color_type.channel_count()
  }

  /// bytes for one pixel, rounding partial bytes up.
  ///
  /// This is the stride that filtering operates on, constant for the whole
  /// image.
  #[inline]
  #[must_use]
  pub const fn bytes_per_pixel(&self) -> usize {
    (self.bits_per_pixel() + 7) / 8
  }

  /// bytes of one stored scanline of `width` pixels: a filter type byte plus
  /// the pixel payload.
  #[inline]
  #[must_use]
  pub const fn bytes_per_scanline(&self, width: u32) -> usize {
    1 + self.bytes_per_pixel() * (width as usize)
  }
}

/// Palette data. Entries are always RGB; transparency for indexed images
/// rides in a separate `tRNS` chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PLTE {
  /// up to 256 entries.
  pub entries: Vec<RGB888>,
}

/// Image data marker.
///
/// The compressed body itself is never stored in a chunk record: the framer
/// forwards it to the decompressor in sub-pieces as it arrives. What's kept
/// is the declared body length, so the chunk list of a whole-buffer decode
/// still accounts for every chunk in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IDAT {
  /// declared body length of this chunk.
  pub length: u32,
}

/// Transparency data, whose interpretation depends on the image's color type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum tRNS {
  /// The one grayscale sample value that is fully transparent.
  Y { y: u16 },
  /// The one RGB sample value that is fully transparent.
  RGB { r: u16, g: u16, b: u16 },
  /// Per-palette-index alpha. May be shorter than the palette; missing
  /// entries are fully opaque.
  Index { alphas: Vec<u8> },
}

/// An embedded ICC color profile.
///
/// The profile payload is a separate zlib stream; interpreting it is a job
/// for a color management collaborator, so it's carried raw.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct iCCP {
  /// profile name, Latin-1.
  pub name: String,
  /// always 0 in well-formed files.
  pub compression_method: u8,
  /// undecoded zlib datastream of the profile.
  pub zlib_data: Vec<u8>,
}

/// Uncompressed Latin-1 textual data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct tEXt {
  pub keyword: String,
  pub text: String,
}

/// International textual data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct iTXt {
  pub keyword: String,
  /// 1 when `text` is a zlib stream of the actual text.
  pub compression_flag: u8,
  pub compression_method: u8,
  pub language_tag: String,
  pub translated_keyword: String,
  /// UTF-8 when uncompressed, zlib bytes otherwise.
  pub text: Vec<u8>,
}

/// Physical pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct pHYs {
  pub ppu_x: u32,
  pub ppu_y: u32,
  /// when set, `ppu_x`/`ppu_y` are pixels per meter; otherwise the two only
  /// define an aspect ratio.
  pub is_meters: bool,
}

/// Embedded EXIF metadata.
///
/// The tag directory is decoded on a best-effort basis: a malformed directory
/// leaves `fields` as `None` while the raw bytes stay available, and never
/// fails the decode of the image itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct eXIf {
  /// the chunk body exactly as stored.
  pub raw: Vec<u8>,
  /// decoded tag directory, when it decoded cleanly.
  pub fields: Option<ExifData>,
}

/// Apple's private `iDOT` extension. Only its presence and length are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct iDOT {
  pub length: u32,
}

/// A chunk this crate doesn't understand: just the tag and body length, body
/// bytes skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnknownChunk {
  pub type_: PngChunkType,
  pub length: u32,
}

/// A parsed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PngChunk {
  /// Image header
  IHDR(IHDR),
  /// Palette
  PLTE(PLTE),
  /// Image data (length marker; body goes to the decompressor)
  IDAT(IDAT),
  /// Image trailer
  IEND,
  /// Transparency
  tRNS(tRNS),
  /// Embedded ICC profile
  iCCP(iCCP),
  /// Textual data
  tEXt(tEXt),
  /// International textual data
  iTXt(iTXt),
  /// Physical pixel dimensions
  pHYs(pHYs),
  /// EXIF metadata
  eXIf(eXIf),
  /// Apple `iDOT` extension
  iDOT(iDOT),
  /// Anything else
  Unknown(UnknownChunk),
}

/// The pieces of already-parsed stream state that later chunk bodies depend
/// on. Each field is set exactly once, by the framer, when its chunk parses.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
  /// the header, once seen.
  pub ihdr: Option<IHDR>,
  /// the palette, once seen.
  pub palette: Option<PLTE>,
  /// the transparency data, once seen.
  pub transparency: Option<tRNS>,
}

impl PngChunk {
  /// Parses one complete chunk body.
  ///
  /// `IDAT` never comes through here (the framer streams its body without
  /// buffering it). Malformed *ancillary* bodies degrade to
  /// [`PngChunk::Unknown`] rather than failing the decode; malformed critical
  /// bodies and ordering violations are errors.
  pub fn parse(type_: PngChunkType, data: &[u8], ctx: &ParseContext) -> PngResult<Self> {
    Ok(match type_ {
      PngChunkType::IHDR => PngChunk::IHDR(IHDR::from_chunk_data(data)?),
      PngChunkType::PLTE => {
        if ctx.ihdr.is_none() {
          return Err(PngError::ChunkBeforeIhdr);
        }
        if data.is_empty() || (data.len() % 3) != 0 {
          return Err(PngError::IllegalChunkData);
        }
        let entries: &[RGB888] = cast_slice(data);
        PngChunk::PLTE(PLTE { entries: entries.to_vec() })
      }
      PngChunkType::IEND => match data {
        [] => PngChunk::IEND,
        _ => return Err(PngError::IllegalChunkData),
      },
      PngChunkType::tRNS => {
        let ihdr = ctx.ihdr.as_ref().ok_or(PngError::ChunkBeforeIhdr)?;
        match ihdr.color_type {
          PngColorType::Y => match *data {
            [y0, y1] => PngChunk::tRNS(tRNS::Y { y: u16::from_be_bytes([y0, y1]) }),
            _ => return Err(PngError::IllegalChunkData),
          },
          PngColorType::RGB => match *data {
            [r0, r1, g0, g1, b0, b1] => PngChunk::tRNS(tRNS::RGB {
              r: u16::from_be_bytes([r0, r1]),
              g: u16::from_be_bytes([g0, g1]),
              b: u16::from_be_bytes([b0, b1]),
            }),
            _ => return Err(PngError::IllegalChunkData),
          },
          PngColorType::Index => {
            let palette = ctx.palette.as_ref().ok_or(PngError::TransparencyBeforePalette)?;
            if data.len() > palette.entries.len() {
              return Err(PngError::IllegalChunkData);
            }
            PngChunk::tRNS(tRNS::Index { alphas: data.to_vec() })
          }
          // color types with their own alpha channel have no use for tRNS.
          PngColorType::YA | PngColorType::RGBA => return Err(PngError::IllegalChunkData),
        }
      }
      PngChunkType::iCCP => match parse_iccp(data) {
        Some(iccp) => PngChunk::iCCP(iccp),
        None => unknown(type_, data),
      },
      PngChunkType::tEXt => match parse_text(data) {
        Some(text) => PngChunk::tEXt(text),
        None => unknown(type_, data),
      },
      PngChunkType::iTXt => match parse_itxt(data) {
        Some(itxt) => PngChunk::iTXt(itxt),
        None => unknown(type_, data),
      },
      PngChunkType::pHYs => match *data {
        [x0, x1, x2, x3, y0, y1, y2, y3, unit] if unit <= 1 => PngChunk::pHYs(pHYs {
          ppu_x: u32::from_be_bytes([x0, x1, x2, x3]),
          ppu_y: u32::from_be_bytes([y0, y1, y2, y3]),
          is_meters: unit == 1,
        }),
        _ => unknown(type_, data),
      },
      PngChunkType::eXIf => {
        PngChunk::eXIf(eXIf { raw: data.to_vec(), fields: decode_exif(data).ok() })
      }
      PngChunkType::iDOT => PngChunk::iDOT(iDOT { length: data.len() as u32 }),
      other => unknown(other, data),
    })
  }
}

#[inline]
fn unknown(type_: PngChunkType, data: &[u8]) -> PngChunk {
  PngChunk::Unknown(UnknownChunk { type_, length: data.len() as u32 })
}

/// Latin-1 bytes to an owned string. Every byte value is a valid Latin-1
/// character, so this can't fail.
#[inline]
#[must_use]
pub(crate) fn latin1_to_string(bytes: &[u8]) -> String {
  bytes.iter().map(|b| *b as char).collect()
}

fn parse_iccp(data: &[u8]) -> Option<iCCP> {
  let mut it = data.splitn(2, |u| *u == 0);
  let name = it.next()?;
  if name.is_empty() || name.len() > 79 {
    return None;
  }
  match it.next()? {
    [0, zlib_data @ ..] => Some(iCCP {
      name: latin1_to_string(name),
      compression_method: 0,
      zlib_data: zlib_data.to_vec(),
    }),
    _ => None,
  }
}

fn parse_text(data: &[u8]) -> Option<tEXt> {
  let mut it = data.splitn(2, |u| *u == 0);
  let keyword = it.next()?;
  let text = it.next()?;
  if keyword.is_empty() || keyword.len() > 79 {
    return None;
  }
  Some(tEXt { keyword: latin1_to_string(keyword), text: latin1_to_string(text) })
}

fn parse_itxt(data: &[u8]) -> Option<iTXt> {
  let mut it = data.splitn(4, |u| *u == 0);
  let keyword = it.next()?;
  if keyword.is_empty() || keyword.len() > 79 {
    return None;
  }
  // compression flag, compression method, then the language tag runs to the
  // next null.
  let flag_method_lang = it.next()?;
  let (compression_flag, compression_method, lang) = match flag_method_lang {
    [flag @ (0 | 1), method, lang @ ..] => (*flag, *method, lang),
    _ => return None,
  };
  let translated_keyword = core::str::from_utf8(it.next()?).ok()?;
  let text = it.next()?;
  Some(iTXt {
    keyword: latin1_to_string(keyword),
    compression_flag,
    compression_method,
    language_tag: latin1_to_string(lang),
    translated_keyword: String::from(translated_keyword),
    text: text.to_vec(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use alloc::vec;

  fn gray_ihdr_ctx() -> ParseContext {
    let ihdr = IHDR::from_chunk_data(&[0, 0, 0, 2, 0, 0, 0, 2, 8, 0, 0, 0, 0]).unwrap();
    ParseContext { ihdr: Some(ihdr), ..ParseContext::default() }
  }

  #[test]
  fn ihdr_parse_and_derived_sizes() {
    let ihdr = IHDR::from_chunk_data(&[0, 0, 1, 0, 0, 0, 0, 64, 8, 6, 0, 0, 1]).unwrap();
    assert_eq!(ihdr.width, 256);
    assert_eq!(ihdr.height, 64);
    assert_eq!(ihdr.color_type, PngColorType::RGBA);
    assert!(ihdr.is_interlaced);
    assert_eq!(ihdr.bytes_per_pixel(), 4);
    assert_eq!(ihdr.bytes_per_scanline(256), 1 + 4 * 256);

    let gray16 = IHDR::from_chunk_data(&[0, 0, 0, 3, 0, 0, 0, 3, 16, 0, 0, 0, 0]).unwrap();
    assert_eq!(gray16.bytes_per_pixel(), 2);
  }

  #[test]
  fn ihdr_rejections() {
    // zero width
    assert_eq!(
      IHDR::from_chunk_data(&[0, 0, 0, 0, 0, 0, 0, 2, 8, 0, 0, 0, 0]),
      Err(PngError::WidthOrHeightZero)
    );
    // dimensions above 2^31 - 1
    assert_eq!(
      IHDR::from_chunk_data(&[255, 255, 255, 255, 0, 0, 0, 1, 8, 0, 0, 0, 1]),
      Err(PngError::IhdrIllegalData)
    );
    assert_eq!(
      IHDR::from_chunk_data(&[0, 0, 0, 1, 0x80, 0, 0, 0, 8, 0, 0, 0, 0]),
      Err(PngError::IhdrIllegalData)
    );
    // the limit itself is fine
    assert!(IHDR::from_chunk_data(&[0x7F, 255, 255, 255, 0, 0, 0, 1, 8, 0, 0, 0, 0]).is_ok());
    // rgb at depth 4 is not a legal combination
    assert_eq!(
      IHDR::from_chunk_data(&[0, 0, 0, 2, 0, 0, 0, 2, 4, 2, 0, 0, 0]),
      Err(PngError::IhdrIllegalData)
    );
    // reserved compression method
    assert_eq!(
      IHDR::from_chunk_data(&[0, 0, 0, 2, 0, 0, 0, 2, 8, 0, 1, 0, 0]),
      Err(PngError::IllegalCompressionMethod)
    );
    // wrong length
    assert_eq!(IHDR::from_chunk_data(&[0; 12]), Err(PngError::IhdrIllegalData));
  }

  #[test]
  fn trns_needs_its_prerequisites() {
    let no_header = ParseContext::default();
    assert_eq!(
      PngChunk::parse(PngChunkType::tRNS, &[0, 7], &no_header),
      Err(PngError::ChunkBeforeIhdr)
    );

    let mut ctx = gray_ihdr_ctx();
    assert_eq!(
      PngChunk::parse(PngChunkType::tRNS, &[0, 7], &ctx).unwrap(),
      PngChunk::tRNS(tRNS::Y { y: 7 })
    );

    // indexed transparency before any palette is an ordering violation.
    ctx.ihdr = Some(IHDR::from_chunk_data(&[0, 0, 0, 2, 0, 0, 0, 2, 8, 3, 0, 0, 0]).unwrap());
    assert_eq!(
      PngChunk::parse(PngChunkType::tRNS, &[1, 2], &ctx),
      Err(PngError::TransparencyBeforePalette)
    );
    ctx.palette = Some(PLTE { entries: vec![RGB888::default(); 4] });
    assert_eq!(
      PngChunk::parse(PngChunkType::tRNS, &[9, 8], &ctx).unwrap(),
      PngChunk::tRNS(tRNS::Index { alphas: vec![9, 8] })
    );
  }

  #[test]
  fn malformed_ancillary_bodies_degrade_to_unknown() {
    let ctx = gray_ihdr_ctx();
    // tEXt with no null separator
    let parsed = PngChunk::parse(PngChunkType::tEXt, b"no separator here", &ctx).unwrap();
    assert!(matches!(parsed, PngChunk::Unknown(u) if u.type_ == PngChunkType::tEXt));
    // well-formed tEXt still parses
    let parsed = PngChunk::parse(PngChunkType::tEXt, b"Title\0stream test", &ctx).unwrap();
    assert_eq!(
      parsed,
      PngChunk::tEXt(tEXt { keyword: "Title".into(), text: "stream test".into() })
    );
  }

  #[test]
  fn malformed_palette_is_fatal() {
    let ctx = gray_ihdr_ctx();
    assert_eq!(
      PngChunk::parse(PngChunkType::PLTE, &[1, 2, 3, 4], &ctx),
      Err(PngError::IllegalChunkData)
    );
  }
}
