#![no_std]
#![cfg_attr(docs_rs, feature(doc_cfg))]

//! A streaming PNG decoder.
//!
//! Two ways in:
//! * [`decode_whole`] when the whole datastream is already in memory: one
//!   call, one finished [`Bitmap`] plus every chunk of the stream.
//! * [`decode_streaming`] when it isn't: feed any iterator of byte buffers
//!   (split anywhere, even one byte at a time) and iterate decoded
//!   [`PixelBatch`] values scanline by scanline, while later bytes are still
//!   arriving.
//!
//! Either way the output pixels are [`RGBA8888`], whatever the stored format.
//! Interlaced (Adam7) images stream out in pass order, each batch carrying
//! the block span to paint for progressive display.

extern crate alloc;

#[cfg(target_pointer_width = "16")]
compile_error!("this crate assumes 32-bit or bigger pointers!");

pub mod pixel_formats;
pub use pixel_formats::*;

pub mod bitmap;
pub use bitmap::*;

pub mod error;
pub use error::*;

pub mod chunk;
pub use chunk::*;

pub mod exif;
pub use exif::*;

pub mod filters;
pub use filters::*;

pub mod interlace;
pub use interlace::*;

pub mod framer;
pub use framer::*;

#[cfg(feature = "miniz_oxide")]
mod convert;

pub mod scanlines;
pub use scanlines::*;

pub mod relay;
pub use relay::*;

#[cfg(feature = "miniz_oxide")]
#[cfg_attr(docs_rs, doc(cfg(feature = "miniz_oxide")))]
pub mod inflate;
#[cfg(feature = "miniz_oxide")]
pub use inflate::*;

#[cfg(feature = "miniz_oxide")]
#[cfg_attr(docs_rs, doc(cfg(feature = "miniz_oxide")))]
pub mod stream;
#[cfg(feature = "miniz_oxide")]
pub use stream::*;

#[cfg(feature = "miniz_oxide")]
#[cfg_attr(docs_rs, doc(cfg(feature = "miniz_oxide")))]
pub mod sync;
#[cfg(feature = "miniz_oxide")]
pub use sync::*;
