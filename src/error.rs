#![forbid(unsafe_code)]

/// Alias for results within this crate.
pub type PngResult<T> = Result<T, PngError>;

/// Everything that can go wrong while decoding.
///
/// The variants split into three groups:
/// * Structural errors that abort the entire decode (bad signature, truncated
///   input, chunk ordering problems, and so on).
/// * `IllegalDecodeOption`, which is reported before a single input byte gets
///   consumed.
/// * Everything ancillary (a broken `eXIf` directory, say) is *not* in here,
///   because it never fails a decode; the chunk is kept in raw form instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngError {
  /// The first 8 bytes of the stream were not the PNG signature.
  NoPngSignature,

  /// The input ended mid-chunk, or before the end-of-image chunk.
  UnexpectedEndOfInput,

  /// The first chunk of the stream must be the image header.
  FirstChunkNotIhdr,

  /// Header data was self-contradictory (bad bit depth / color type combo,
  /// reserved method byte, duplicate header, wrong length).
  IhdrIllegalData,

  /// The declared width and/or height of this image is 0.
  WidthOrHeightZero,

  /// A chunk that needs header information arrived before the header.
  ChunkBeforeIhdr,

  /// Indexed-color transparency arrived before the palette it refers to.
  TransparencyBeforePalette,

  /// An indexed-color image reached its pixel data without any palette.
  MissingPalette,

  /// The header declared a compression method other than deflate.
  IllegalCompressionMethod,

  /// The header declared a filter method other than adaptive filtering.
  IllegalFilterMethod,

  /// A scanline began with a filter type byte outside `0..=4`.
  IllegalFilterType(u8),

  /// Bit depths below 8 are parsed but not decoded to pixels.
  UnsupportedBitDepth,

  /// A critical chunk's body didn't have the shape its type requires
  /// (a palette that isn't a whole number of RGB triples, say).
  IllegalChunkData,

  /// The compressed image data was not a valid zlib stream.
  DecompressionFailed,

  /// The options passed to a decode call were rejected.
  ///
  /// This covers a `force_filter_type` above 4, an `interlace_level` above 6,
  /// `analyze` in streaming mode, and a zero batch capacity.
  IllegalDecodeOption,
}
impl core::fmt::Display for PngError {
  #[inline]
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    core::fmt::Debug::fmt(self, f)
  }
}
