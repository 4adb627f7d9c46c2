use std::cell::Cell;
use std::rc::Rc;

use miniz_oxide::deflate::compress_to_vec_zlib;
use streampng::*;

fn raw_chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
  let mut out = Vec::new();
  out.extend_from_slice(&(body.len() as u32).to_be_bytes());
  out.extend_from_slice(tag);
  out.extend_from_slice(body);
  // CRCs are carried but never checked, so zeroes are fine for fixtures.
  out.extend_from_slice(&[0; 4]);
  out
}

fn ihdr_body(width: u32, height: u32, bit_depth: u8, color_type: u8, interlaced: bool) -> [u8; 13] {
  let w = width.to_be_bytes();
  let h = height.to_be_bytes();
  [
    w[0], w[1], w[2], w[3], h[0], h[1], h[2], h[3], bit_depth, color_type, 0, 0,
    u8::from(interlaced),
  ]
}

/// Paints a batch stream into a bitmap, for comparing against whole-buffer
/// decodes.
fn paint(header: IHDR, batches: impl Iterator<Item = PngResult<PixelBatch>>) -> Bitmap<RGBA8888> {
  let mut bitmap = Bitmap::new_with(header.width, header.height, RGBA8888::default());
  for batch in batches {
    for px in batch.unwrap().pixels {
      *bitmap.get_mut(px.x, px.y).unwrap() = px.color;
    }
  }
  bitmap
}

#[test]
fn decoding_never_panics_on_random_input() {
  for _ in 0..10 {
    let noise = super::rand_bytes(512);
    let _ = decode_whole(&noise, &DecodeOptions::default());
    if let Ok(stream) = decode_streaming(vec![noise], &DecodeOptions::default()) {
      for _ in stream {}
    }
  }
  // noise behind a valid signature and header exercises the later stages.
  for _ in 0..10 {
    let mut bytes = PNG_SIGNATURE.to_vec();
    bytes.extend(raw_chunk(b"IHDR", &ihdr_body(4, 4, 8, 0, false)));
    bytes.extend(raw_chunk(b"IDAT", &super::rand_bytes(64)));
    bytes.extend(raw_chunk(b"IEND", &[]));
    let _ = decode_whole(&bytes, &DecodeOptions::default());
    if let Ok(stream) = decode_streaming(vec![bytes], &DecodeOptions::default()) {
      for _ in stream {}
    }
  }
}

#[test]
fn oversized_declared_dimensions_are_an_error_not_a_panic() {
  // 33 bytes: signature plus an interlaced header claiming a u32::MAX width.
  let mut bytes = PNG_SIGNATURE.to_vec();
  bytes.extend(raw_chunk(b"IHDR", &[255, 255, 255, 255, 0, 0, 0, 1, 8, 0, 0, 0, 1]));
  assert!(matches!(
    decode_whole(&bytes, &DecodeOptions::default()),
    Err(PngError::IhdrIllegalData)
  ));
  assert!(matches!(
    decode_streaming(vec![bytes], &DecodeOptions::default()),
    Err(PngError::IhdrIllegalData)
  ));
}

#[test]
fn streaming_and_whole_buffer_agree_on_varied_filters() {
  // 4x4 RGB, each row stored with a different filter type.
  let raw_rows: Vec<Vec<u8>> = (0..4_u8)
    .map(|y| (0..12_u8).map(|i| i.wrapping_mul(19).wrapping_add(y * 41)).collect())
    .collect();
  let mut stored = Vec::new();
  let mut prev: Option<&[u8]> = None;
  for (row, type_byte) in raw_rows.iter().zip([0_u8, 1, 2, 4]) {
    let filter = PngFilterType::try_from(type_byte).unwrap();
    let mut dest = vec![0; row.len()];
    filter_scanline(filter, 3, row, prev, &mut dest);
    stored.push(type_byte);
    stored.extend_from_slice(&dest);
    prev = Some(row);
  }
  let mut bytes = PNG_SIGNATURE.to_vec();
  bytes.extend(raw_chunk(b"IHDR", &ihdr_body(4, 4, 8, 2, false)));
  bytes.extend(raw_chunk(b"IDAT", &compress_to_vec_zlib(&stored, 6)));
  bytes.extend(raw_chunk(b"IEND", &[]));

  let whole = decode_whole(&bytes, &DecodeOptions::default()).unwrap();
  for (y, row) in raw_rows.iter().enumerate() {
    for x in 0..4 {
      let expected = RGBA8888::opaque(row[x * 3], row[x * 3 + 1], row[x * 3 + 2]);
      assert_eq!(whole.pixels.get(x as u32, y as u32), Some(&expected), "pixel ({x},{y})");
    }
  }

  let source: Vec<Vec<u8>> = bytes.chunks(5).map(|c| c.to_vec()).collect();
  let stream = decode_streaming(source, &DecodeOptions::default()).unwrap();
  let header = stream.header().unwrap();
  assert_eq!(paint(header, stream), whole.pixels);
}

/// An 8x8 grayscale test card with a distinct value per position.
fn card(x: u32, y: u32) -> u8 {
  (y * 16 + x * 2) as u8
}

fn interlaced_8x8_png() -> Vec<u8> {
  let mut stored = Vec::new();
  for pass in ADAM7 {
    let sizes = pass_sizes(8, 8, 1, pass);
    for row in 0..sizes.pass_height {
      stored.push(0);
      for x in 0..sizes.pass_width {
        let (fx, fy) = pass.remap(x, row);
        stored.push(card(fx, fy));
      }
    }
  }
  let mut bytes = PNG_SIGNATURE.to_vec();
  bytes.extend(raw_chunk(b"IHDR", &ihdr_body(8, 8, 8, 0, true)));
  bytes.extend(raw_chunk(b"IDAT", &compress_to_vec_zlib(&stored, 6)));
  bytes.extend(raw_chunk(b"IEND", &[]));
  bytes
}

#[test]
fn interlaced_image_reconstructs_in_pass_order() {
  let bytes = interlaced_8x8_png();

  let whole = decode_whole(&bytes, &DecodeOptions::default()).unwrap();
  for y in 0..8 {
    for x in 0..8 {
      let v = card(x, y);
      assert_eq!(whole.pixels.get(x, y), Some(&RGBA8888::opaque(v, v, v)), "pixel ({x},{y})");
    }
  }

  let source: Vec<Vec<u8>> = bytes.chunks(3).map(|c| c.to_vec()).collect();
  let stream = decode_streaming(source, &DecodeOptions::default()).unwrap();
  let header = stream.header().unwrap();
  let batches: Vec<PixelBatch> = stream.map(|b| b.unwrap()).collect();
  // passes arrive in order, tagged with their progressive-display span.
  let mut last_pass = 0;
  for batch in &batches {
    let pass = batch.pass.unwrap();
    assert!(pass >= last_pass);
    last_pass = pass;
    assert_eq!(batch.interpolation, Some(ADAM7_INTERPOLATION[pass]));
  }
  assert_eq!(last_pass, 6);
  assert_eq!(paint(header, batches.into_iter().map(Ok)), whole.pixels);
}

#[test]
fn interlace_level_zero_decodes_only_the_first_pass() {
  let bytes = interlaced_8x8_png();
  let options = DecodeOptions { interlace_level: Some(0), ..DecodeOptions::default() };

  let whole = decode_whole(&bytes, &options).unwrap();
  let v = card(0, 0);
  assert_eq!(whole.pixels.get(0, 0), Some(&RGBA8888::opaque(v, v, v)));
  // everything past pass 0 stays at the fill value.
  assert!(whole
    .pixels
    .pixels
    .iter()
    .skip(1)
    .all(|px| *px == RGBA8888::default()));

  let stream = decode_streaming(vec![bytes], &options).unwrap();
  for batch in stream {
    assert_eq!(batch.unwrap().pass, Some(0));
  }
}

#[test]
fn ancillary_chunks_ride_along_with_a_paletted_image() {
  let mut bytes = PNG_SIGNATURE.to_vec();
  bytes.extend(raw_chunk(b"IHDR", &ihdr_body(2, 1, 8, 3, false)));
  bytes.extend(raw_chunk(b"tEXt", b"Title\0two pixels"));
  bytes.extend(raw_chunk(b"PLTE", &[200, 0, 0, 0, 0, 200]));
  bytes.extend(raw_chunk(b"tRNS", &[128]));
  bytes.extend(raw_chunk(b"pHYs", &[0, 0, 0, 72, 0, 0, 0, 72, 1]));
  bytes.extend(raw_chunk(b"IDAT", &compress_to_vec_zlib(&[0, 0, 1], 6)));
  bytes.extend(raw_chunk(b"IEND", &[]));

  let image = decode_whole(&bytes, &DecodeOptions::default()).unwrap();
  assert_eq!(image.pixels.get(0, 0), Some(&RGBA8888 { r: 200, g: 0, b: 0, a: 128 }));
  assert_eq!(image.pixels.get(1, 0), Some(&RGBA8888::opaque(0, 0, 200)));
  assert!(image.chunks.iter().any(|c| matches!(
    c,
    PngChunk::tEXt(t) if t.keyword == "Title" && t.text == "two pixels"
  )));
  assert!(image
    .chunks
    .iter()
    .any(|c| matches!(c, PngChunk::pHYs(p) if p.ppu_x == 72 && p.is_meters)));
}

#[test]
fn pixels_come_out_before_the_source_is_drained() {
  // a tall image so early scanlines complete long before the last buffer.
  let height = 64_u32;
  let mut stored = Vec::new();
  for y in 0..height {
    stored.push(0);
    stored.extend_from_slice(&[y as u8; 8]);
  }
  let mut bytes = PNG_SIGNATURE.to_vec();
  bytes.extend(raw_chunk(b"IHDR", &ihdr_body(8, height, 8, 0, false)));
  // store uncompressed-ish: level 0 keeps the zlib stream long and incremental.
  bytes.extend(raw_chunk(b"IDAT", &compress_to_vec_zlib(&stored, 0)));
  bytes.extend(raw_chunk(b"IEND", &[]));

  let consumed = Rc::new(Cell::new(0_usize));
  let counter = Rc::clone(&consumed);
  let total: usize = bytes.len();
  let source = bytes.into_iter().map(move |b| {
    counter.set(counter.get() + 1);
    vec![b]
  });

  let mut stream = decode_streaming(source, &DecodeOptions::default()).unwrap();
  let first = stream.next().unwrap().unwrap();
  assert_eq!(first.pixels[0].color, RGBA8888::opaque(0, 0, 0));
  assert!(
    consumed.get() < total,
    "first batch should not require the whole stream ({} of {total} bytes used)",
    consumed.get()
  );
  assert_eq!(stream.count(), (height - 1) as usize);
}
