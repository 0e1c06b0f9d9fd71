//! Text shaping glue.
//!
//! Responsibilities:
//! - defensive UTF-8 walking over raw bytes
//! - word wrap and text measurement
//! - glyph-quad emission through the draw buffer's reservation path
//! - the fontdue-backed glyph atlas behind the opaque font-texture handle
//!
//! Rasterization happens once at font load; rendering only reads the
//! prebuilt glyph table.

mod atlas;
mod font;
pub(crate) mod utf8;

pub use atlas::{FontAtlas, FontLoadError, glyph_ranges_latin};
pub use font::{Font, Glyph};
