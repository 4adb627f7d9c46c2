#![forbid(unsafe_code)]

//! Best-effort decoding of the `eXIf` chunk's TIFF-style tag directory.
//!
//! This is an ancillary collaborator of the pixel pipeline: whatever happens
//! in here, the image still decodes. Values that don't fit inline in their
//! 12-byte directory entry (rationals, long ASCII runs) are skipped rather
//! than chased through the file.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::chunk::latin1_to_string;

/// Decoded EXIF fields, keyed by tag name (or the decimal tag number for
/// tags this crate has no name for).
pub type ExifData = BTreeMap<String, ExifValue>;

/// One decoded EXIF field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExifValue {
  Byte(u8),
  Ascii(String),
  Short(u16),
  Long(u32),
  SLong(i32),
  Undefined(Vec<u8>),
}

/// The IFD-pointer tags whose values are offsets of further directories
/// (Exif, GPS, Interoperability).
const SUB_IFD_TAGS: [u16; 3] = [34665, 34853, 40965];

/// Decodes the tag directory, or reports that it couldn't be.
pub fn decode_exif(bytes: &[u8]) -> Result<ExifData, ()> {
  let le = match bytes.get(..2) {
    Some(b"II") => true,
    Some(b"MM") => false,
    _ => return Err(()),
  };
  if read_u16(bytes, 2, le)? != 42 {
    return Err(());
  }
  let ifd0 = read_u32(bytes, 4, le)? as usize;

  let mut fields = ExifData::new();
  let mut sub_offsets: Vec<usize> = Vec::new();
  read_ifd(bytes, ifd0, le, &mut fields, &mut sub_offsets)?;
  // one level of sub-directories; EXIF files don't nest deeper in practice,
  // and refusing to recurse keeps hostile offset cycles harmless.
  for offset in sub_offsets {
    let mut deeper = Vec::new();
    read_ifd(bytes, offset, le, &mut fields, &mut deeper)?;
  }
  Ok(fields)
}

fn read_ifd(
  bytes: &[u8], offset: usize, le: bool, fields: &mut ExifData, sub_offsets: &mut Vec<usize>,
) -> Result<(), ()> {
  let field_count = read_u16(bytes, offset, le)? as usize;
  for i in 0..field_count {
    let at = offset + 2 + i * 12;
    let tag = read_u16(bytes, at, le)?;
    let type_ = read_u16(bytes, at + 2, le)?;
    let count = read_u32(bytes, at + 4, le)? as usize;
    if SUB_IFD_TAGS.contains(&tag) {
      sub_offsets.push(read_u32(bytes, at + 8, le)? as usize);
      continue;
    }
    let value_size = match size_of_exif_type(type_) {
      Some(s) => s,
      None => continue,
    };
    if value_size.checked_mul(count).map(|total| total > 4).unwrap_or(true) {
      // the value lives elsewhere in the file; not worth chasing.
      continue;
    }
    let value_bytes = bytes.get(at + 8..at + 8 + value_size * count).ok_or(())?;
    let value = match (type_, count) {
      (1, 1) => ExifValue::Byte(value_bytes[0]),
      (2, _) => {
        let text = value_bytes.split(|b| *b == 0).next().unwrap_or(&[]);
        ExifValue::Ascii(latin1_to_string(text))
      }
      (3, 1) => ExifValue::Short(read_u16(bytes, at + 8, le)?),
      (4, 1) => ExifValue::Long(read_u32(bytes, at + 8, le)?),
      (9, 1) => ExifValue::SLong(read_u32(bytes, at + 8, le)? as i32),
      _ => ExifValue::Undefined(value_bytes.to_vec()),
    };
    fields.insert(name_of_exif_tag(tag), value);
  }
  Ok(())
}

const fn size_of_exif_type(type_: u16) -> Option<usize> {
  match type_ {
    1 | 2 | 6 | 7 => Some(1),
    3 | 8 => Some(2),
    4 | 9 | 11 => Some(4),
    5 | 10 | 12 => Some(8),
    _ => None,
  }
}

fn name_of_exif_tag(tag: u16) -> String {
  String::from(match tag {
    256 => "ImageWidth",
    257 => "ImageLength",
    271 => "Make",
    272 => "Model",
    274 => "Orientation",
    282 => "XResolution",
    283 => "YResolution",
    296 => "ResolutionUnit",
    305 => "Software",
    37510 => "UserComment",
    40962 => "PixelXDimension",
    40963 => "PixelYDimension",
    _ => return format!("{tag}"),
  })
}

fn read_u16(bytes: &[u8], at: usize, le: bool) -> Result<u16, ()> {
  let pair: [u8; 2] = bytes.get(at..at + 2).ok_or(())?.try_into().map_err(|_| ())?;
  Ok(if le { u16::from_le_bytes(pair) } else { u16::from_be_bytes(pair) })
}

fn read_u32(bytes: &[u8], at: usize, le: bool) -> Result<u32, ()> {
  let quad: [u8; 4] = bytes.get(at..at + 4).ok_or(())?.try_into().map_err(|_| ())?;
  Ok(if le { u32::from_le_bytes(quad) } else { u32::from_be_bytes(quad) })
}
