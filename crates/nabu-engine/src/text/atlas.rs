use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::coords::Vec2;
use crate::draw::TextureId;

use super::font::{Font, Glyph};

/// Fixed atlas dimensions. Packing is append-only, so glyph UVs stay valid
/// for the lifetime of the atlas; fonts that no longer fit are rejected.
const ATLAS_SIZE: u32 = 1024;
const GLYPH_PADDING: u32 = 1;

/// Extra horizontal spacing baked into every glyph advance. Text measurement
/// cancels it out for the last character of a line.
const GLYPH_EXTRA_SPACING_X: f32 = 1.0;

/// Error returned by [`FontAtlas::add_font_from_bytes`].
#[derive(Debug, Clone)]
pub struct FontLoadError(pub String);

impl fmt::Display for FontLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "font load error: {}", self.0)
    }
}

impl std::error::Error for FontLoadError {}

/// Basic Latin plus Latin-1 supplement.
pub fn glyph_ranges_latin() -> &'static [(u32, u32)] {
    &[(0x0020, 0x00FF)]
}

/// Shared glyph atlas: one alpha-8 texture holding every loaded font's
/// rasterized glyphs plus a white block for untextured fills.
///
/// The atlas never owns a GPU texture itself. Backends poll
/// [`take_updated`](Self::take_updated) once per frame, (re)upload the pixel
/// data when it fires, and store the resulting handle via
/// [`set_tex_id`](Self::set_tex_id). The pixel mutex is shared between that
/// upload path and concurrent font registration from producer threads.
pub struct FontAtlas {
    inner: Mutex<AtlasInner>,
    tex_id: AtomicU64,
    has_updated: AtomicBool,
    white_uv: Vec2,
}

struct AtlasInner {
    fonts: Vec<Arc<Font>>,
    pixels: Vec<u8>,
    cursor_x: u32,
    cursor_y: u32,
    row_height: u32,
    full: bool,
}

impl FontAtlas {
    pub fn new() -> Self {
        let mut inner = AtlasInner {
            fonts: Vec::new(),
            pixels: vec![0; (ATLAS_SIZE * ATLAS_SIZE) as usize],
            cursor_x: GLYPH_PADDING,
            cursor_y: GLYPH_PADDING,
            row_height: 0,
            full: false,
        };

        // A solid 2×2 white block; untextured geometry samples its center.
        let white = [255u8; 4];
        let (wx, wy) = inner
            .place_bitmap(&white, 2, 2)
            .expect("empty atlas always fits the white block");
        let white_uv = Vec2::new(
            (wx as f32 + 1.0) / ATLAS_SIZE as f32,
            (wy as f32 + 1.0) / ATLAS_SIZE as f32,
        );

        Self {
            inner: Mutex::new(inner),
            tex_id: AtomicU64::new(0),
            has_updated: AtomicBool::new(false),
            white_uv,
        }
    }

    /// UV of a guaranteed-white texel, for geometry that wants no texture
    /// contribution while the atlas is bound.
    #[inline]
    pub fn white_uv(&self) -> Vec2 {
        self.white_uv
    }

    /// Current atlas texture handle, if a backend has uploaded one.
    pub fn tex_id(&self) -> Option<TextureId> {
        match self.tex_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(TextureId(id)),
        }
    }

    /// Installs the backend's texture handle for the atlas.
    pub fn set_tex_id(&self, id: TextureId) {
        self.tex_id.store(id.0, Ordering::Release);
    }

    /// True once after every atlas mutation; the render backend polls this
    /// once per frame to trigger a texture (re)upload.
    pub fn take_updated(&self) -> bool {
        self.has_updated.swap(false, Ordering::AcqRel)
    }

    /// Number of registered fonts.
    pub fn font_count(&self) -> usize {
        self.lock().fonts.len()
    }

    /// Rasterizes `ranges` of `data` at `size_pixels` into the atlas and
    /// registers the resulting font.
    ///
    /// Codepoints the face has no glyph for are skipped. Fails when the face
    /// cannot be parsed or the atlas is out of space.
    pub fn add_font_from_bytes(
        &self,
        data: &[u8],
        size_pixels: f32,
        ranges: &[(u32, u32)],
    ) -> Result<Arc<Font>, FontLoadError> {
        let face = fontdue::Font::from_bytes(data, fontdue::FontSettings::default())
            .map_err(|e| FontLoadError(e.to_string()))?;

        let line = face.horizontal_line_metrics(size_pixels);
        let ascent = line.map_or(size_pixels * 0.75, |m| m.ascent);
        let descent = line.map_or(size_pixels * -0.25, |m| m.descent);

        let mut inner = self.lock();
        let mut glyphs: Vec<Glyph> = Vec::new();

        for &(lo, hi) in ranges {
            for cp in lo..=hi {
                let Some(ch) = char::from_u32(cp) else { continue };
                if face.lookup_glyph_index(ch) == 0 {
                    continue;
                }

                let (metrics, bitmap) = face.rasterize(ch, size_pixels);
                let advance = metrics.advance_width + GLYPH_EXTRA_SPACING_X;

                if metrics.width == 0 || metrics.height == 0 {
                    // Blank glyph (space): advance only.
                    glyphs.push(Glyph {
                        codepoint: cp,
                        advance_x: advance,
                        x0: 0.0,
                        y0: 0.0,
                        x1: 0.0,
                        y1: 0.0,
                        u0: self.white_uv.x,
                        v0: self.white_uv.y,
                        u1: self.white_uv.x,
                        v1: self.white_uv.y,
                    });
                    continue;
                }

                let (w, h) = (metrics.width as u32, metrics.height as u32);
                let Some((gx, gy)) = inner.place_bitmap(&bitmap, w, h) else {
                    log::warn!(
                        "font atlas is full ({ATLAS_SIZE}x{ATLAS_SIZE}); \
                         failed to add font at {size_pixels}px"
                    );
                    return Err(FontLoadError("glyph atlas is full".to_owned()));
                };

                // fontdue metrics are baseline-relative with +Y up; convert
                // to offsets from the line top with +Y down.
                let top = metrics.ymin + metrics.height as i32;
                let y0 = ascent - top as f32;
                let x0 = metrics.xmin as f32;

                let size = ATLAS_SIZE as f32;
                glyphs.push(Glyph {
                    codepoint: cp,
                    advance_x: advance,
                    x0,
                    y0,
                    x1: x0 + metrics.width as f32,
                    y1: y0 + metrics.height as f32,
                    u0: gx as f32 / size,
                    v0: gy as f32 / size,
                    u1: (gx + w) as f32 / size,
                    v1: (gy + h) as f32 / size,
                });
            }
        }

        if glyphs.is_empty() {
            return Err(FontLoadError("no glyphs in the requested ranges".to_owned()));
        }

        // Tab renders as nothing but advances four spaces.
        if let Some(space) = glyphs.iter().find(|g| g.codepoint == ' ' as u32).copied() {
            glyphs.push(Glyph {
                codepoint: '\t' as u32,
                advance_x: space.advance_x * 4.0,
                ..space
            });
        }

        let font = Arc::new(Font::new(size_pixels, ascent, descent, glyphs));
        inner.fonts.push(Arc::clone(&font));
        drop(inner);

        self.has_updated.store(true, Ordering::Release);
        Ok(font)
    }

    /// Unregisters a font. Its atlas pixels stay allocated (packing is
    /// append-only); the glyph data dies with the last `Arc`.
    pub fn remove_font(&self, font: &Arc<Font>) {
        self.lock().fonts.retain(|f| !Arc::ptr_eq(f, font));
    }

    /// Snapshot of the atlas as RGBA bytes (white with the glyph coverage in
    /// alpha), for backend texture upload.
    pub fn tex_data_rgba32(&self) -> (Vec<u8>, u32, u32) {
        let inner = self.lock();
        let mut rgba = Vec::with_capacity(inner.pixels.len() * 4);
        for &a in &inner.pixels {
            rgba.extend_from_slice(&[255, 255, 255, a]);
        }
        (rgba, ATLAS_SIZE, ATLAS_SIZE)
    }

    fn lock(&self) -> MutexGuard<'_, AtlasInner> {
        self.inner.lock().expect("font atlas mutex poisoned")
    }
}

impl Default for FontAtlas {
    fn default() -> Self {
        Self::new()
    }
}

impl AtlasInner {
    /// Shelf-packs `bitmap` (tightly packed `w × h` coverage bytes) and
    /// returns its top-left texel. `None` once the atlas is full.
    fn place_bitmap(&mut self, bitmap: &[u8], w: u32, h: u32) -> Option<(u32, u32)> {
        if self.full || w + GLYPH_PADDING * 2 > ATLAS_SIZE {
            return None;
        }

        if self.cursor_x + w + GLYPH_PADDING > ATLAS_SIZE {
            self.cursor_y += self.row_height + GLYPH_PADDING;
            self.cursor_x = GLYPH_PADDING;
            self.row_height = 0;
        }
        if self.cursor_y + h + GLYPH_PADDING > ATLAS_SIZE {
            self.full = true;
            return None;
        }

        let (gx, gy) = (self.cursor_x, self.cursor_y);
        for row in 0..h {
            let src = (row * w) as usize;
            let dst = ((gy + row) * ATLAS_SIZE + gx) as usize;
            self.pixels[dst..dst + w as usize]
                .copy_from_slice(&bitmap[src..src + w as usize]);
        }

        self.cursor_x += w + GLYPH_PADDING;
        self.row_height = self.row_height.max(h);
        Some((gx, gy))
    }
}
