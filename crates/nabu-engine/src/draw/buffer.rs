use std::sync::{Arc, Mutex};

use crate::coords::{Color, Rect, Vec2};
use crate::text::{Font, FontAtlas};

use super::cmd::{ClipRect, DrawCmd, DrawIndex, TextureId, Vertex};

/// State shared by every buffer of one registry: the current screen size
/// (clip default when the stack is empty) and the font atlas.
pub struct DrawShared {
    screen: Mutex<Vec2>,
    pub fonts: FontAtlas,
}

impl DrawShared {
    pub fn new(screen: Vec2) -> Self {
        Self {
            screen: Mutex::new(screen),
            fonts: FontAtlas::new(),
        }
    }

    pub fn screen_size(&self) -> Vec2 {
        *self.screen.lock().expect("screen size mutex poisoned")
    }

    pub(crate) fn set_screen_size(&self, size: Vec2) {
        *self.screen.lock().expect("screen size mutex poisoned") = size;
    }
}

/// Records tessellated geometry for one frame.
///
/// A buffer owns growable vertex/index arenas plus the list of draw commands
/// batching them. It always holds at least one (possibly empty) open command;
/// emitting a primitive extends the open command when the render state
/// matches, otherwise a new command is started. This bounds the command count
/// by the number of *state transitions*, not the number of draw calls.
///
/// Content operations are not internally synchronized; the registry hands out
/// each buffer behind its own mutex and the producer/consumer protocol
/// guarantees a single writer at a time.
pub struct DrawBuffer {
    pub cmds: Vec<DrawCmd>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<DrawIndex>,

    clip_stack: Vec<(Rect, bool)>,
    tex_stack: Vec<Option<TextureId>>,
    font_stack: Vec<Arc<Font>>,
    cur_font: Option<Arc<Font>>,

    /// Scratch point list reused by shape builders.
    pub(crate) path: Vec<Vec2>,

    // Reservation cursor. Valid only between a reservation and the next one;
    // arena offsets rather than pointers, so arena growth cannot dangle.
    vtx_write: usize,
    idx_write: usize,
    vtx_reserved: usize,
    idx_reserved: usize,
    pub(crate) cur_idx: DrawIndex,

    is_child: bool,
    shared: Arc<DrawShared>,
}

impl DrawBuffer {
    pub fn new(shared: Arc<DrawShared>) -> Self {
        let mut buf = Self {
            cmds: Vec::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
            clip_stack: Vec::new(),
            tex_stack: Vec::new(),
            font_stack: Vec::new(),
            cur_font: None,
            path: Vec::new(),
            vtx_write: 0,
            idx_write: 0,
            vtx_reserved: 0,
            idx_reserved: 0,
            cur_idx: 0,
            is_child: false,
            shared,
        };
        buf.update_clip_rect();
        buf
    }

    /// Resets to the freshly-constructed state: empty arenas and a single
    /// open command covering the full screen. Arena capacity is retained.
    pub fn clear(&mut self) {
        self.cmds.clear();
        self.vertices.clear();
        self.indices.clear();
        self.clip_stack.clear();
        self.tex_stack.clear();
        self.font_stack.clear();
        self.cur_font = None;
        self.path.clear();
        self.vtx_write = 0;
        self.idx_write = 0;
        self.vtx_reserved = 0;
        self.idx_reserved = 0;
        self.cur_idx = 0;
        self.update_clip_rect();
    }

    #[inline]
    pub fn vtx_idx_count(&self) -> (usize, usize) {
        (self.vertices.len(), self.indices.len())
    }

    #[inline]
    pub fn is_child(&self) -> bool {
        self.is_child
    }

    pub(crate) fn set_child(&mut self, child: bool) {
        self.is_child = child;
    }

    #[inline]
    pub(crate) fn shared(&self) -> &DrawShared {
        &self.shared
    }

    // ── clip-rect stack ───────────────────────────────────────────────────

    /// Current effective clip rect: top of the stack, or the full screen.
    pub fn cur_clip_rect(&self) -> Rect {
        match self.clip_stack.last() {
            Some(&(rect, _)) => rect,
            None => Rect::from_min_max(Vec2::zero(), self.shared.screen_size()),
        }
    }

    /// Outermost non-circular clip entry, falling back to the screen rect.
    /// Circular-scissor commands carry this so backends have an axis-aligned
    /// bound for the hardware scissor.
    fn cur_non_circle_clip_rect(&self) -> Rect {
        for &(rect, circle) in &self.clip_stack {
            if !circle {
                return rect;
            }
        }
        Rect::from_min_max(Vec2::zero(), self.shared.screen_size())
    }

    /// Intersects against the *current* effective rect, never the raw
    /// requested rect, so nested clips can only shrink the visible region.
    fn clip_to_cur_rect(&self, clip: Rect) -> Rect {
        self.cur_clip_rect().intersect(clip)
    }

    pub fn push_clip_rect(&mut self, clip: Rect, circle: bool) {
        let effective = self.clip_to_cur_rect(clip);
        self.clip_stack.push((effective, circle));
        self.update_clip_rect();
    }

    /// # Panics
    /// Panics when no clip rect is pushed; unbalanced pops are a logic error
    /// in the calling code.
    pub fn pop_clip_rect(&mut self) {
        assert!(!self.clip_stack.is_empty(), "pop_clip_rect without matching push");
        self.clip_stack.pop();
        self.update_clip_rect();
    }

    // ── texture / font stacks ─────────────────────────────────────────────

    #[inline]
    pub fn cur_tex(&self) -> Option<TextureId> {
        self.tex_stack.last().copied().flatten()
    }

    pub fn push_texture(&mut self, id: TextureId) {
        self.tex_stack.push(Some(id));
        self.update_tex_id(false, false);
    }

    /// Pushes a raw backend-native texture handle. The resulting commands are
    /// tagged so backends skip their own handle translation.
    pub fn push_native_texture(&mut self, id: TextureId) {
        self.tex_stack.push(Some(id));
        self.update_tex_id(false, true);
    }

    fn push_tex_entry(&mut self, id: Option<TextureId>, force_font: bool) {
        self.tex_stack.push(id);
        self.update_tex_id(force_font, false);
    }

    /// # Panics
    /// Panics when the texture stack is empty.
    pub fn pop_texture(&mut self) {
        assert!(!self.tex_stack.is_empty(), "pop_texture without matching push");
        self.tex_stack.pop();
        self.update_tex_id(false, false);
    }

    /// Binds `font` and its atlas texture. The force-font flag keeps the
    /// command tagged as a font-texture command even if the atlas texture id
    /// momentarily matches another texture.
    pub fn push_font(&mut self, font: Arc<Font>) {
        self.cur_font = Some(Arc::clone(&font));
        self.font_stack.push(font);
        let atlas_tex = self.shared.fonts.tex_id();
        self.push_tex_entry(atlas_tex, true);
    }

    /// # Panics
    /// Panics when the font stack is empty.
    pub fn pop_font(&mut self) {
        assert!(!self.font_stack.is_empty(), "pop_font without matching push");
        self.pop_texture();
        self.font_stack.pop();
        if let Some(prev) = self.font_stack.last() {
            self.cur_font = Some(Arc::clone(prev));
            let atlas_tex = self.shared.fonts.tex_id();
            self.push_tex_entry(atlas_tex, false);
            return;
        }
        self.cur_font = None;
    }

    #[inline]
    pub fn cur_font(&self) -> Option<&Arc<Font>> {
        self.cur_font.as_ref()
    }

    // ── command merging ───────────────────────────────────────────────────

    fn is_font_tex(&self, tex: Option<TextureId>) -> bool {
        let atlas_tex = self.shared.fonts.tex_id();
        tex.is_some() && tex == atlas_tex
    }

    /// Fresh command carrying the current header state. Key color and the
    /// native-texture flag are sticky across command boundaries; blur is not.
    fn header_cmd(&self) -> DrawCmd {
        let mut cmd = DrawCmd::default();
        cmd.clip_rect = ClipRect::from_rect(self.cur_clip_rect());
        cmd.circle_scissor = self.clip_stack.last().is_some_and(|e| e.1);
        if cmd.circle_scissor {
            cmd.circle_outer_clip = ClipRect::from_rect(self.cur_non_circle_clip_rect());
        }
        cmd.tex = self.cur_tex();
        cmd.font_texture = self.is_font_tex(cmd.tex);
        if let Some(last) = self.cmds.last() {
            cmd.key_color = last.key_color;
            cmd.native_texture = last.native_texture;
        }
        cmd
    }

    pub(crate) fn update_clip_rect(&mut self) {
        let clip = ClipRect::from_rect(self.cur_clip_rect());
        let circle = self.clip_stack.last().is_some_and(|e| e.1);
        let outer = if circle {
            ClipRect::from_rect(self.cur_non_circle_clip_rect())
        } else {
            ClipRect::default()
        };
        let tex = self.cur_tex();
        let font_texture = self.is_font_tex(tex);

        if let Some(last) = self.cmds.last() {
            if !self.clip_stack.is_empty()
                && clip == last.clip_rect
                && circle == last.circle_scissor
            {
                return;
            }
        }

        // An open command with no geometry yet is rewritten in place; this
        // keeps command counts bounded by actual state transitions.
        if let Some(last) = self.cmds.last_mut() {
            if last.elem_count == 0 {
                last.clip_rect = clip;
                last.circle_scissor = circle;
                if circle {
                    last.circle_outer_clip = outer;
                }
                last.tex = tex;
                last.font_texture = font_texture;
                return;
            }
        }

        let cmd = self.header_cmd();
        self.cmds.push(cmd);
    }

    pub(crate) fn update_tex_id(&mut self, force_font: bool, native: bool) {
        let tex = self.cur_tex();
        if let Some(last) = self.cmds.last() {
            if !self.tex_stack.is_empty() && tex == last.tex && !force_font && !native {
                return;
            }
        }

        let clip = ClipRect::from_rect(self.cur_clip_rect());
        let circle = self.clip_stack.last().is_some_and(|e| e.1);
        let outer = if circle {
            ClipRect::from_rect(self.cur_non_circle_clip_rect())
        } else {
            ClipRect::default()
        };
        let font_texture = self.is_font_tex(tex) || force_font;

        if let Some(last) = self.cmds.last_mut() {
            if last.elem_count == 0 {
                last.clip_rect = clip;
                last.circle_scissor = circle;
                if circle {
                    last.circle_outer_clip = outer;
                }
                last.tex = tex;
                last.font_texture = font_texture;
                last.native_texture = native;
                return;
            }
        }

        let mut cmd = self.header_cmd();
        cmd.font_texture = font_texture;
        cmd.native_texture = native;
        self.cmds.push(cmd);
    }

    /// Forces an open command boundary and returns its index. Useful before
    /// installing a [`DrawCallback`](super::DrawCallback) or translating one
    /// command's geometry independently.
    pub fn force_new_cmd(&mut self) -> usize {
        if let Some(last) = self.cmds.last() {
            if last.elem_count == 0 {
                return self.cmds.len() - 1;
            }
        }
        let cmd = self.header_cmd();
        self.cmds.push(cmd);
        self.cmds.len() - 1
    }

    /// Subsequent geometry renders with a multi-pass blur. A no-op when the
    /// open command already carries the same settings.
    pub fn set_blur(&mut self, strength: u8, passes: u8) {
        if let Some(last) = self.cmds.last() {
            if last.blur_strength == strength && last.blur_passes == passes {
                return;
            }
        }
        let mut cmd = self.header_cmd();
        cmd.blur_strength = strength;
        cmd.blur_passes = passes;
        self.cmds.push(cmd);
    }

    /// Sets the chroma key for subsequent geometry. An alpha of zero turns
    /// the feature off. Always starts a new command.
    pub fn set_key_color(&mut self, col: Color) {
        let mut cmd = self.header_cmd();
        cmd.key_color = col;
        self.cmds.push(cmd);
    }

    /// Moves already-recorded geometry by adding to the stored transform's
    /// translation, avoiding re-tessellation. `cmd_idx` limits the shift to
    /// one command; out-of-range indices are ignored.
    pub fn update_matrix_translate(&mut self, translate: Vec2, cmd_idx: Option<usize>) {
        match cmd_idx {
            Some(idx) => {
                if let Some(cmd) = self.cmds.get_mut(idx) {
                    cmd.matrix.translate(translate.x, translate.y);
                }
            }
            None => {
                for cmd in &mut self.cmds {
                    cmd.matrix.translate(translate.x, translate.y);
                }
            }
        }
    }

    // ── reservation protocol ──────────────────────────────────────────────

    /// Reserves exactly `idx_count` indices and `vtx_count` vertices on the
    /// open command and arms the write cursor. Callers must write the full
    /// reservation (or give the tail back via [`unreserve`](Self::unreserve))
    /// before reserving again.
    pub fn prim_reserve(&mut self, idx_count: u32, vtx_count: u32) {
        self.reserve_primitives(idx_count, vtx_count);
    }

    pub(crate) fn reserve_primitives(&mut self, idx_count: u32, vtx_count: u32) {
        let vtx_old = self.vertices.len();
        let idx_old = self.indices.len();
        self.vertices.resize(vtx_old + vtx_count as usize, Vertex::default());
        self.indices.resize(idx_old + idx_count as usize, 0);

        self.vtx_write = vtx_old;
        self.idx_write = idx_old;
        self.vtx_reserved = vtx_count as usize;
        self.idx_reserved = idx_count as usize;

        let cmd = self
            .cmds
            .last_mut()
            .expect("draw buffer always holds an open command");
        cmd.elem_count += idx_count;
        cmd.vtx_count += vtx_count;
    }

    #[inline]
    pub(crate) fn write_vtx(&mut self, pos: Vec2, uv: Vec2, col: Color) {
        debug_assert!(self.vtx_reserved > 0, "vertex write past reservation");
        self.vertices[self.vtx_write] = Vertex::new(pos, uv, col);
        self.vtx_write += 1;
        self.vtx_reserved -= 1;
    }

    #[inline]
    pub(crate) fn write_idx(&mut self, idx: DrawIndex) {
        debug_assert!(self.idx_reserved > 0, "index write past reservation");
        self.indices[self.idx_write] = idx;
        self.idx_write += 1;
        self.idx_reserved -= 1;
    }

    /// Gives back the unwritten tail of the current reservation. The text
    /// renderer over-reserves for the worst case and truncates here after
    /// clipping invisible glyphs.
    pub(crate) fn unreserve(&mut self, idx_unused: u32, vtx_unused: u32) {
        debug_assert!(idx_unused as usize <= self.indices.len());
        debug_assert!(vtx_unused as usize <= self.vertices.len());
        self.vertices.truncate(self.vertices.len() - vtx_unused as usize);
        self.indices.truncate(self.indices.len() - idx_unused as usize);
        self.vtx_reserved = 0;
        self.idx_reserved = 0;
        self.vtx_write = self.vertices.len();
        self.idx_write = self.indices.len();

        let cmd = self
            .cmds
            .last_mut()
            .expect("draw buffer always holds an open command");
        cmd.elem_count -= idx_unused;
        cmd.vtx_count -= vtx_unused;
        self.cur_idx = self.vertices.len() as DrawIndex;
    }

    // ── text ──────────────────────────────────────────────────────────────

    /// Draws `text` at the font's native size. `font: None` uses the
    /// currently pushed font. `bot_right` optionally overrides the clip's
    /// bottom-right corner so callers can confine a string without touching
    /// the clip stack.
    ///
    /// `outline` draws the string four extra times offset by ±1 px on each
    /// axis in opaque black beneath the main draw.
    ///
    /// # Panics
    /// Panics when no font is supplied and none is pushed.
    pub fn text(
        &mut self,
        font: Option<&Arc<Font>>,
        text: &str,
        top_left: Vec2,
        col: Color,
        outline: bool,
        bot_right: Option<Vec2>,
    ) {
        let size = match font {
            Some(f) => f.font_size,
            None => {
                self.cur_font
                    .as_ref()
                    .expect("text() requires a pushed or supplied font")
                    .font_size
            }
        };
        self.text_sized(font, size, text, top_left, col, outline, bot_right);
    }

    /// Like [`text`](Self::text) but rendered at `target_size` (glyphs are
    /// scaled from the rasterized size).
    pub fn text_sized(
        &mut self,
        font: Option<&Arc<Font>>,
        target_size: f32,
        text: &str,
        top_left: Vec2,
        col: Color,
        outline: bool,
        bot_right: Option<Vec2>,
    ) {
        if col.a == 0 {
            return;
        }

        if let Some(f) = font {
            self.push_font(Arc::clone(f));
        }

        let cur = self
            .cur_font
            .clone()
            .expect("text() requires a pushed or supplied font");

        let mut clip = self.cur_clip_rect();
        if let Some(br) = bot_right {
            clip.max = br;
        }

        if outline {
            let offsets = [
                Vec2::new(-1.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, -1.0),
                Vec2::new(0.0, 1.0),
            ];
            for off in offsets {
                self.text_sized(None, target_size, text, top_left + off, Color::BLACK, false, bot_right);
            }
        }

        cur.render_text(self, target_size, top_left, col, clip, text, 0.0, false);

        if font.is_some() {
            self.pop_font();
        }
    }

    /// Measured extent of `text` at the font's native size.
    ///
    /// # Panics
    /// Panics when no font is supplied and none is pushed.
    pub fn text_size(&self, font: Option<&Arc<Font>>, text: &str) -> Vec2 {
        let font = self.resolve_font(font);
        self.text_size_scaled(Some(font), font.font_size, text)
    }

    /// Measured extent of `text` at `target_size`.
    pub fn text_size_scaled(&self, font: Option<&Arc<Font>>, target_size: f32, text: &str) -> Vec2 {
        let font = self.resolve_font(font);
        if text.is_empty() {
            return Vec2::new(0.0, font.font_size);
        }
        let mut size = font.calc_text_size(target_size, f32::MAX, -1.0, text);
        // The last character's inter-glyph spacing is baked into its advance;
        // cancel it and round up to whole pixels.
        if size.x > 0.0 {
            size.x -= 1.0;
        }
        size.x = (size.x + 0.95).round();
        size
    }

    /// Tight bounds of `text` at the font's native size: offset of the first
    /// visible row in `min.y`, extent in `max`.
    pub fn text_bounds(&self, font: Option<&Arc<Font>>, text: &str) -> Rect {
        let font = self.resolve_font(font);
        if text.is_empty() {
            return Rect::new(0.0, 0.0, 0.0, font.font_size);
        }
        let mut bounds = font.calc_text_bounds(font.font_size, f32::MAX, -1.0, text);
        if bounds.max.x > 0.0 {
            bounds.max.x -= 1.0;
        }
        bounds.max.x = (bounds.max.x + 0.95).round();
        bounds
    }

    /// Tight bounds of `text` at `target_size`; the spacing correction is
    /// scaled accordingly and no rounding is applied.
    pub fn text_bounds_scaled(&self, font: Option<&Arc<Font>>, target_size: f32, text: &str) -> Rect {
        let font = self.resolve_font(font);
        if text.is_empty() {
            return Rect::new(0.0, 0.0, 0.0, target_size);
        }
        let mut bounds = font.calc_text_bounds(target_size, f32::MAX, -1.0, text);
        if bounds.max.x > 0.0 {
            bounds.max.x -= target_size / font.font_size;
        }
        bounds
    }

    fn resolve_font<'a>(&'a self, font: Option<&'a Arc<Font>>) -> &'a Arc<Font> {
        match font {
            Some(f) => f,
            None => self
                .cur_font
                .as_ref()
                .expect("text measurement requires a pushed or supplied font"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_buffer() -> DrawBuffer {
        DrawBuffer::new(Arc::new(DrawShared::new(Vec2::new(1920.0, 1080.0))))
    }

    // ── construction / clear ──────────────────────────────────────────────

    #[test]
    fn new_buffer_has_one_empty_fullscreen_command() {
        let buf = test_buffer();
        assert_eq!(buf.cmds.len(), 1);
        let cmd = &buf.cmds[0];
        assert_eq!(cmd.elem_count, 0);
        assert_eq!(cmd.clip_rect, ClipRect::from_rect(Rect::new(0.0, 0.0, 1920.0, 1080.0)));
    }

    #[test]
    fn clear_restores_initial_state() {
        let mut buf = test_buffer();
        buf.push_clip_rect(Rect::new(10.0, 10.0, 50.0, 50.0), false);
        buf.rectangle_filled(Vec2::new(20.0, 20.0), Vec2::new(30.0, 30.0), Color::WHITE);
        buf.clear();

        assert_eq!(buf.cmds.len(), 1);
        assert_eq!(buf.cmds[0].elem_count, 0);
        assert!(buf.vertices.is_empty());
        assert!(buf.indices.is_empty());
        assert_eq!(buf.cur_clip_rect(), Rect::new(0.0, 0.0, 1920.0, 1080.0));
    }

    // ── clip stack ────────────────────────────────────────────────────────

    #[test]
    fn push_pop_clip_is_identity() {
        let mut buf = test_buffer();
        buf.push_clip_rect(Rect::new(100.0, 100.0, 400.0, 400.0), false);
        let before = buf.cur_clip_rect();

        // Wider than the current rect: intersection clamps the pushed rect,
        // but popping must restore the prior state exactly.
        buf.push_clip_rect(Rect::new(-500.0, -500.0, 5000.0, 5000.0), false);
        buf.pop_clip_rect();
        assert_eq!(buf.cur_clip_rect(), before);

        buf.push_clip_rect(Rect::new(150.0, 150.0, 200.0, 200.0), false);
        buf.pop_clip_rect();
        assert_eq!(buf.cur_clip_rect(), before);
    }

    #[test]
    fn nested_clips_only_shrink() {
        let mut buf = test_buffer();
        buf.push_clip_rect(Rect::new(100.0, 100.0, 400.0, 400.0), false);
        buf.push_clip_rect(Rect::new(0.0, 0.0, 1920.0, 1080.0), false);
        assert_eq!(buf.cur_clip_rect(), Rect::new(100.0, 100.0, 400.0, 400.0));

        buf.push_clip_rect(Rect::new(200.0, 50.0, 300.0, 500.0), false);
        assert_eq!(buf.cur_clip_rect(), Rect::new(200.0, 100.0, 300.0, 400.0));
    }

    #[test]
    #[should_panic(expected = "pop_clip_rect without matching push")]
    fn pop_empty_clip_stack_panics() {
        test_buffer().pop_clip_rect();
    }

    #[test]
    fn circular_clip_records_outer_bound() {
        let mut buf = test_buffer();
        buf.push_clip_rect(Rect::new(100.0, 100.0, 900.0, 900.0), false);
        buf.push_clip_rect(Rect::new(300.0, 300.0, 500.0, 500.0), true);
        buf.rectangle_filled(Vec2::new(310.0, 310.0), Vec2::new(400.0, 400.0), Color::WHITE);

        let cmd = buf.cmds.last().expect("command");
        assert!(cmd.circle_scissor);
        assert_eq!(cmd.clip_rect, ClipRect::from_rect(Rect::new(300.0, 300.0, 500.0, 500.0)));
        assert_eq!(
            cmd.circle_outer_clip,
            ClipRect::from_rect(Rect::new(100.0, 100.0, 900.0, 900.0))
        );
    }

    // ── command merging ───────────────────────────────────────────────────

    #[test]
    fn equal_state_draws_merge_into_one_command() {
        let mut buf = test_buffer();
        for i in 0..50 {
            let off = i as f32 * 2.0;
            buf.rectangle_filled(
                Vec2::new(off, off),
                Vec2::new(off + 10.0, off + 10.0),
                Color::WHITE,
            );
        }
        assert_eq!(buf.cmds.len(), 1);
        assert_eq!(buf.cmds[0].elem_count, 50 * 6);
        assert_eq!(buf.cmds[0].vtx_count, 50 * 4);
    }

    #[test]
    fn clip_change_closes_the_open_command() {
        let mut buf = test_buffer();
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);
        buf.push_clip_rect(Rect::new(0.0, 0.0, 100.0, 100.0), false);
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);
        assert_eq!(buf.cmds.len(), 2);
    }

    #[test]
    fn empty_command_header_is_rewritten_not_appended() {
        let mut buf = test_buffer();
        buf.push_clip_rect(Rect::new(0.0, 0.0, 100.0, 100.0), false);
        buf.push_clip_rect(Rect::new(10.0, 10.0, 90.0, 90.0), false);
        // No geometry emitted yet: both pushes rewrite the initial command.
        assert_eq!(buf.cmds.len(), 1);
        assert_eq!(
            buf.cmds[0].clip_rect,
            ClipRect::from_rect(Rect::new(10.0, 10.0, 90.0, 90.0))
        );
    }

    #[test]
    fn pop_restores_previous_command_state() {
        let mut buf = test_buffer();
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);
        buf.push_clip_rect(Rect::new(0.0, 0.0, 100.0, 100.0), false);
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);
        buf.pop_clip_rect();
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);

        assert_eq!(buf.cmds.len(), 3);
        assert_eq!(buf.cmds[0].clip_rect, buf.cmds[2].clip_rect);
    }

    #[test]
    fn texture_change_closes_the_open_command() {
        let mut buf = test_buffer();
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);
        buf.push_texture(TextureId(7));
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);
        buf.pop_texture();

        assert_eq!(buf.cmds.len(), 2);
        assert_eq!(buf.cmds[1].tex, Some(TextureId(7)));
    }

    #[test]
    fn key_color_always_starts_a_command_and_sticks() {
        let mut buf = test_buffer();
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);
        buf.set_key_color(Color::new(255, 0, 255, 255));
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);
        buf.push_clip_rect(Rect::new(0.0, 0.0, 50.0, 50.0), false);
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);

        assert_eq!(buf.cmds.len(), 3);
        // Key color survives the clip-induced command break.
        assert_eq!(buf.cmds[2].key_color, Color::new(255, 0, 255, 255));
    }

    #[test]
    fn set_blur_dedupes_equal_settings() {
        let mut buf = test_buffer();
        buf.set_blur(2, 1);
        let count = buf.cmds.len();
        buf.set_blur(2, 1);
        assert_eq!(buf.cmds.len(), count);
        buf.set_blur(4, 2);
        assert_eq!(buf.cmds.len(), count + 1);
    }

    #[test]
    fn force_new_cmd_reuses_open_empty_command() {
        let mut buf = test_buffer();
        let first = buf.force_new_cmd();
        assert_eq!(first, 0);
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);
        let second = buf.force_new_cmd();
        assert_eq!(second, 1);
        assert_eq!(buf.cmds.len(), 2);
    }

    // ── reservation accounting ────────────────────────────────────────────

    #[test]
    fn command_counts_match_arena_lengths() {
        let mut buf = test_buffer();
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);
        buf.push_clip_rect(Rect::new(0.0, 0.0, 500.0, 500.0), false);
        buf.triangle_filled(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(5.0, 10.0),
            Color::RED,
        );
        buf.poly_line(
            &[Vec2::new(0.0, 0.0), Vec2::new(50.0, 50.0), Vec2::new(100.0, 0.0)],
            Color::GREEN,
            3.0,
            true,
        );

        let idx_total: u32 = buf.cmds.iter().map(|c| c.elem_count).sum();
        let vtx_total: u32 = buf.cmds.iter().map(|c| c.vtx_count).sum();
        assert_eq!(idx_total as usize, buf.indices.len());
        assert_eq!(vtx_total as usize, buf.vertices.len());
    }

    #[test]
    fn unreserve_returns_the_tail() {
        let mut buf = test_buffer();
        buf.prim_reserve(6, 4);
        buf.unreserve(6, 4);
        assert!(buf.vertices.is_empty());
        assert!(buf.indices.is_empty());
        assert_eq!(buf.cmds[0].elem_count, 0);
        assert_eq!(buf.cmds[0].vtx_count, 0);
    }

    // ── matrix translate ──────────────────────────────────────────────────

    #[test]
    fn matrix_translate_targets_one_or_all_commands() {
        let mut buf = test_buffer();
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);
        buf.set_key_color(Color::new(1, 2, 3, 255));
        buf.rectangle_filled(Vec2::zero(), Vec2::new(10.0, 10.0), Color::WHITE);

        buf.update_matrix_translate(Vec2::new(5.0, 7.0), Some(0));
        assert_eq!(buf.cmds[0].matrix.translation(), (5.0, 7.0));
        assert_eq!(buf.cmds[1].matrix.translation(), (0.0, 0.0));

        buf.update_matrix_translate(Vec2::new(1.0, 1.0), None);
        assert_eq!(buf.cmds[0].matrix.translation(), (6.0, 8.0));
        assert_eq!(buf.cmds[1].matrix.translation(), (1.0, 1.0));

        // Out-of-range command index is ignored.
        buf.update_matrix_translate(Vec2::new(9.0, 9.0), Some(99));
    }
}
