use crate::coords::{Color, Rect, Vec2};
use crate::draw::DrawBuffer;

use super::utf8::decode_char;

/// One rasterized glyph: advance, bounding box relative to the line top, and
/// the UV rect inside the atlas texture.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Glyph {
    pub codepoint: u32,
    pub advance_x: f32,
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

/// An immutable font built by [`FontAtlas`](super::FontAtlas): the glyph
/// table for one face at one pixel size, plus the lookup indices the text
/// walkers use.
///
/// Rendering at other sizes scales these glyphs; quality degrades gracefully
/// the further the target size drifts from `font_size`.
#[derive(Debug)]
pub struct Font {
    pub font_size: f32,
    pub ascent: f32,
    pub descent: f32,
    /// Whole-pixel offset applied to every draw position.
    pub display_offset: Vec2,

    pub(crate) glyphs: Vec<Glyph>,
    pub(crate) index_advance: Vec<f32>,
    pub(crate) index_lookup: Vec<u32>,
    pub(crate) fallback_glyph: Option<usize>,
    pub(crate) fallback_advance: f32,
    pub(crate) fallback_char: u32,
}

/// Sentinel in `index_lookup` for codepoints without a glyph.
const NO_GLYPH: u32 = u32::MAX;

impl Font {
    pub(crate) fn new(font_size: f32, ascent: f32, descent: f32, glyphs: Vec<Glyph>) -> Self {
        let mut font = Self {
            font_size,
            ascent,
            descent,
            display_offset: Vec2::zero(),
            glyphs,
            index_advance: Vec::new(),
            index_lookup: Vec::new(),
            fallback_glyph: None,
            fallback_advance: 0.0,
            fallback_char: '?' as u32,
        };
        font.build_lookup();
        font
    }

    /// Rebuilds the codepoint → glyph index tables and resolves the fallback
    /// glyph.
    fn build_lookup(&mut self) {
        let max_cp = self
            .glyphs
            .iter()
            .map(|g| g.codepoint)
            .max()
            .map_or(0, |c| c as usize + 1);

        self.index_lookup = vec![NO_GLYPH; max_cp];
        self.index_advance = vec![0.0; max_cp];
        for (i, glyph) in self.glyphs.iter().enumerate() {
            self.index_lookup[glyph.codepoint as usize] = i as u32;
            self.index_advance[glyph.codepoint as usize] = glyph.advance_x;
        }

        self.fallback_glyph = self.lookup(self.fallback_char);
        self.fallback_advance = self
            .fallback_glyph
            .map_or(0.0, |i| self.glyphs[i].advance_x);

        // Unknown codepoints fall back to '?'-advance.
        for (advance, lookup) in self.index_advance.iter_mut().zip(&self.index_lookup) {
            if *lookup == NO_GLYPH {
                *advance = self.fallback_advance;
            }
        }
    }

    fn lookup(&self, c: u32) -> Option<usize> {
        let i = *self.index_lookup.get(c as usize)?;
        if i == NO_GLYPH { None } else { Some(i as usize) }
    }

    /// Glyph for `c`, falling back to the fallback glyph for unknown
    /// codepoints. `None` only when the font has no fallback either.
    pub fn find_glyph(&self, c: u32) -> Option<&Glyph> {
        match self.lookup(c) {
            Some(i) => Some(&self.glyphs[i]),
            None => self.fallback_glyph.map(|i| &self.glyphs[i]),
        }
    }

    pub fn find_glyph_no_fallback(&self, c: u32) -> Option<&Glyph> {
        self.lookup(c).map(|i| &self.glyphs[i])
    }

    /// Unscaled advance for `c`, using the fallback advance for unknown
    /// codepoints.
    #[inline]
    pub fn char_advance(&self, c: u32) -> f32 {
        self.index_advance
            .get(c as usize)
            .copied()
            .unwrap_or(self.fallback_advance)
    }

    // ── word wrap ─────────────────────────────────────────────────────────

    /// Byte position after which the accumulated advance would exceed
    /// `wrap_width`, scanning forward from `from`.
    ///
    /// Wrapping prefers blanks and the trailing side of simple punctuation
    /// (`. , ; ! ? "`); words that cannot fit a whole line are cut anywhere.
    pub fn calc_word_wrap_pos(&self, scale: f32, bytes: &[u8], from: usize, wrap_width: f32) -> usize {
        // Work with unscaled widths to avoid scaling every character.
        let wrap_width = wrap_width / scale;

        let mut line_width = 0.0f32;
        let mut word_width = 0.0f32;
        let mut blank_width = 0.0f32;

        let mut word_end = from;
        let mut prev_word_end: Option<usize> = None;
        let mut inside_word = true;

        let mut s = from;
        while s < bytes.len() {
            let (c, next_s) = if bytes[s] < 0x80 {
                (bytes[s] as u32, s + 1)
            } else {
                let (cp, adv) = decode_char(&bytes[s..]);
                (cp, s + adv.max(1))
            };
            if c == 0 {
                break;
            }

            if c < 32 {
                if c == b'\n' as u32 {
                    line_width = 0.0;
                    word_width = 0.0;
                    blank_width = 0.0;
                    inside_word = true;
                    s = next_s;
                    continue;
                }
                if c == b'\r' as u32 {
                    s = next_s;
                    continue;
                }
            }

            let char_width = self.char_advance(c);
            if c == b' ' as u32 || c == b'\t' as u32 || c == 0x3000 {
                if inside_word {
                    line_width += blank_width;
                    blank_width = 0.0;
                    word_end = s;
                }
                blank_width += char_width;
                inside_word = false;
            } else {
                word_width += char_width;
                if inside_word {
                    word_end = next_s;
                } else {
                    prev_word_end = Some(word_end);
                    line_width += word_width + blank_width;
                    word_width = 0.0;
                    blank_width = 0.0;
                }
                // Allow wrapping after punctuation.
                inside_word = !matches!(c as u8 as char, '.' | ',' | ';' | '!' | '?' | '"')
                    || c > 0x7F;
            }

            // Trailing blanks don't count against the line.
            if line_width + word_width >= wrap_width {
                if word_width < wrap_width {
                    s = prev_word_end.unwrap_or(word_end);
                }
                break;
            }

            s = next_s;
        }

        s
    }

    // ── measurement ───────────────────────────────────────────────────────

    /// Extent of `text` laid out at `size`. `max_width` cuts the scan short;
    /// `wrap_width > 0` enables word wrap.
    pub fn calc_text_size(&self, size: f32, max_width: f32, wrap_width: f32, text: &str) -> Vec2 {
        self.calc_text_size_remaining(size, max_width, wrap_width, text).0
    }

    /// Like [`calc_text_size`](Self::calc_text_size), also returning the byte
    /// position where the scan stopped (for `max_width` cutoffs).
    pub(crate) fn calc_text_size_remaining(
        &self,
        size: f32,
        max_width: f32,
        wrap_width: f32,
        text: &str,
    ) -> (Vec2, usize) {
        let bytes = text.as_bytes();
        let line_height = size;
        let scale = size / self.font_size;

        let mut text_size = Vec2::zero();
        let mut line_width = 0.0f32;

        let word_wrap = wrap_width > 0.0;
        let mut wrap_eol: Option<usize> = None;

        let mut s = 0usize;
        while s < bytes.len() {
            if word_wrap {
                if wrap_eol.is_none() {
                    let mut eol = self.calc_word_wrap_pos(scale, bytes, s, wrap_width - line_width);
                    if eol == s {
                        // Too narrow to fit anything; force one character to
                        // keep the height estimate continuous.
                        eol += 1;
                    }
                    wrap_eol = Some(eol);
                }
                if s >= wrap_eol.unwrap_or(bytes.len()) {
                    if text_size.x < line_width {
                        text_size.x = line_width;
                    }
                    text_size.y += line_height;
                    line_width = 0.0;
                    wrap_eol = None;
                    skip_post_wrap_blanks(bytes, &mut s);
                    continue;
                }
            }

            let prev_s = s;
            let c = if bytes[s] < 0x80 {
                let c = bytes[s] as u32;
                s += 1;
                c
            } else {
                let (cp, adv) = decode_char(&bytes[s..]);
                s += adv.max(1);
                if cp == 0 {
                    break;
                }
                cp
            };

            if c < 32 {
                if c == b'\n' as u32 {
                    text_size.x = text_size.x.max(line_width);
                    text_size.y += line_height;
                    line_width = 0.0;
                    continue;
                }
                if c == b'\r' as u32 {
                    continue;
                }
            }

            let char_width = self.char_advance(c) * scale;
            if line_width + char_width >= max_width {
                s = prev_s;
                break;
            }
            line_width += char_width;
        }

        if text_size.x < line_width {
            text_size.x = line_width;
        }
        if line_width > 0.0 || text_size.y == 0.0 {
            text_size.y += line_height;
        }

        (text_size, s)
    }

    /// Tight bounds of the *last* laid-out line: vertical offset of the first
    /// visible row in `min.y`, line extent in `max`.
    pub fn calc_text_bounds(&self, size: f32, max_width: f32, wrap_width: f32, text: &str) -> Rect {
        let bytes = text.as_bytes();
        let scale = size / self.font_size;

        let mut line_height = 0.0f32;
        let mut offset_y = f32::MAX;
        let mut text_size = Vec2::zero();
        let mut line_width = 0.0f32;
        let mut first_char_of_line = true;

        let word_wrap = wrap_width > 0.0;
        let mut wrap_eol: Option<usize> = None;

        let mut s = 0usize;
        while s < bytes.len() {
            if word_wrap {
                if wrap_eol.is_none() {
                    let mut eol = self.calc_word_wrap_pos(scale, bytes, s, wrap_width - line_width);
                    if eol == s {
                        eol += 1;
                    }
                    wrap_eol = Some(eol);
                }
                if s >= wrap_eol.unwrap_or(bytes.len()) {
                    if text_size.x < line_width {
                        text_size.x = line_width;
                    }
                    text_size.y += line_height;
                    line_width = 0.0;
                    wrap_eol = None;
                    skip_post_wrap_blanks(bytes, &mut s);
                    continue;
                }
            }

            let c = if bytes[s] < 0x80 {
                let c = bytes[s] as u32;
                s += 1;
                c
            } else {
                let (cp, adv) = decode_char(&bytes[s..]);
                s += adv.max(1);
                if cp == 0 {
                    break;
                }
                cp
            };

            if c < 32 {
                if c == b'\n' as u32 {
                    text_size.x = text_size.x.max(line_width);
                    text_size.y += line_height;
                    line_width = 0.0;
                    line_height = 0.0;
                    first_char_of_line = true;
                    continue;
                }
                if c == b'\r' as u32 {
                    continue;
                }
            }

            let Some(glyph) = self.find_glyph(c) else { continue };
            let char_width = glyph.advance_x * scale;
            if line_width + char_width >= max_width {
                break;
            }

            if first_char_of_line {
                first_char_of_line = false;
                line_width += glyph.x0 * scale;
            }
            line_width += char_width;
            line_height = line_height.max(glyph.y1 * scale);
            offset_y = offset_y.min(glyph.y0 * scale);
        }

        if offset_y == f32::MAX {
            offset_y = 0.0;
        }
        Rect::new(0.0, offset_y, line_width, line_height)
    }

    // ── rendering ─────────────────────────────────────────────────────────

    /// Emits one textured quad per visible glyph into `buf`.
    ///
    /// Over-reserves for the worst case (one quad per remaining byte) and
    /// gives the unused tail back afterwards. Lines above/below `clip` are
    /// skipped without emitting; `cpu_fine_clip` additionally shrinks partial
    /// glyph quads against the clip rect (used when confining text to a tight
    /// box).
    #[allow(clippy::too_many_arguments)]
    pub fn render_text(
        &self,
        buf: &mut DrawBuffer,
        size: f32,
        pos: Vec2,
        col: Color,
        clip: Rect,
        text: &str,
        wrap_width: f32,
        cpu_fine_clip: bool,
    ) {
        let bytes = text.as_bytes();

        // Pixel-align the origin.
        let pos = Vec2::new(
            (pos.x + self.display_offset.x) as i32 as f32,
            (pos.y + self.display_offset.y) as i32 as f32,
        );
        let mut x = pos.x;
        let mut y = pos.y;
        if y > clip.max.y {
            return;
        }

        let scale = size / self.font_size;
        let line_height = self.font_size * scale;
        let word_wrap = wrap_width > 0.0;
        let mut wrap_eol: Option<usize> = None;

        let mut s = 0usize;
        let mut end = bytes.len();

        // Fast-forward whole lines above the clip rect.
        if !word_wrap {
            while y + line_height < clip.min.y && s < end {
                s = match find_newline(bytes, s) {
                    Some(p) => p + 1,
                    None => end,
                };
                y += line_height;
            }
        }

        // For very large texts, also drop lines below the clip rect so the
        // worst-case reservation stays proportional to what is visible.
        if !word_wrap && end - s > 10_000 {
            let mut s_end = s;
            let mut y_end = y;
            while y_end < clip.max.y && s_end < end {
                s_end = match find_newline(bytes, s_end) {
                    Some(p) => p + 1,
                    None => end,
                };
                y_end += line_height;
            }
            end = s_end;
        }
        if s == end {
            return;
        }

        let vtx_max = ((end - s) * 4) as u32;
        let idx_max = ((end - s) * 6) as u32;
        buf.prim_reserve(idx_max, vtx_max);

        let base_idx = buf.cur_idx;
        let mut emitted: u32 = 0;

        while s < end {
            if word_wrap {
                if wrap_eol.is_none() {
                    let mut eol = self.calc_word_wrap_pos(scale, bytes, s, wrap_width - (x - pos.x));
                    if eol == s {
                        eol += 1;
                    }
                    wrap_eol = Some(eol);
                }
                if s >= wrap_eol.unwrap_or(end) {
                    x = pos.x;
                    y += line_height;
                    wrap_eol = None;
                    skip_post_wrap_blanks(bytes, &mut s);
                    continue;
                }
            }

            let c = if bytes[s] < 0x80 {
                let c = bytes[s] as u32;
                s += 1;
                c
            } else {
                let (cp, adv) = decode_char(&bytes[s..]);
                s += adv.max(1);
                if cp == 0 {
                    break;
                }
                cp
            };

            if c < 32 {
                if c == b'\n' as u32 {
                    x = pos.x;
                    y += line_height;
                    if y > clip.max.y {
                        break;
                    }
                    continue;
                }
                if c == b'\r' as u32 {
                    continue;
                }
            }

            let mut char_width = 0.0;
            if let Some(glyph) = self.find_glyph(c) {
                char_width = glyph.advance_x * scale;

                // Blanks carry advance but no quad.
                if c != b' ' as u32 && c != b'\t' as u32 {
                    let mut x1 = x + glyph.x0 * scale;
                    let mut x2 = x + glyph.x1 * scale;
                    let mut y1 = y + glyph.y0 * scale;
                    let mut y2 = y + glyph.y1 * scale;

                    // Lines above the clip were already skipped and the loop
                    // exits past the bottom, so only X needs testing here.
                    if x1 <= clip.max.x && x2 >= clip.min.x {
                        let mut u1 = glyph.u0;
                        let mut v1 = glyph.v0;
                        let mut u2 = glyph.u1;
                        let mut v2 = glyph.v1;

                        if cpu_fine_clip {
                            if x1 < clip.min.x {
                                u1 += (1.0 - (x2 - clip.min.x) / (x2 - x1)) * (u2 - u1);
                                x1 = clip.min.x;
                            }
                            if y1 < clip.min.y {
                                v1 += (1.0 - (y2 - clip.min.y) / (y2 - y1)) * (v2 - v1);
                                y1 = clip.min.y;
                            }
                            if x2 > clip.max.x {
                                u2 = u1 + ((clip.max.x - x1) / (x2 - x1)) * (u2 - u1);
                                x2 = clip.max.x;
                            }
                            if y2 > clip.max.y {
                                v2 = v1 + ((clip.max.y - y1) / (y2 - y1)) * (v2 - v1);
                                y2 = clip.max.y;
                            }
                            if y1 >= y2 {
                                x += char_width;
                                continue;
                            }
                        }

                        let idx = base_idx + emitted * 4;
                        buf.write_idx(idx);
                        buf.write_idx(idx + 1);
                        buf.write_idx(idx + 2);
                        buf.write_idx(idx);
                        buf.write_idx(idx + 2);
                        buf.write_idx(idx + 3);
                        buf.write_vtx(Vec2::new(x1, y1), Vec2::new(u1, v1), col);
                        buf.write_vtx(Vec2::new(x2, y1), Vec2::new(u2, v1), col);
                        buf.write_vtx(Vec2::new(x2, y2), Vec2::new(u2, v2), col);
                        buf.write_vtx(Vec2::new(x1, y2), Vec2::new(u1, v2), col);
                        emitted += 1;
                    }
                }
            }

            x += char_width;
        }

        buf.unreserve(idx_max - emitted * 6, vtx_max - emitted * 4);
    }
}

/// Wrapping skips blanks at the start of the next line; a newline among them
/// ends the skip.
fn skip_post_wrap_blanks(bytes: &[u8], s: &mut usize) {
    while *s < bytes.len() {
        let c = bytes[*s];
        if c == b' ' || c == b'\t' {
            *s += 1;
        } else if c == b'\n' {
            *s += 1;
            break;
        } else {
            break;
        }
    }
}

fn find_newline(bytes: &[u8], from: usize) -> Option<usize> {
    bytes[from..].iter().position(|&b| b == b'\n').map(|p| from + p)
}
