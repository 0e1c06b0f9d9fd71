use std::fmt;
use std::sync::Arc;

use crate::coords::{Color, Mat4, Rect, Vec2};

/// Opaque handle to a backend texture.
///
/// Handles are minted by the active render backend; the core only compares
/// and forwards them.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureId(pub u64);

/// Index into the owning buffer's vertex arena.
///
/// Indices are buffer-relative; backends add the buffer's base vertex at
/// submission time. Overflowing 32 bits is a caller error.
pub type DrawIndex = u32;

/// Vertex format recorded by the tessellator.
///
/// Backend-agnostic on purpose: each backend maps this to its own GPU layout
/// at submission time.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vertex {
    pub pos: Vec2,
    pub uv: Vec2,
    pub col: Color,
}

impl Vertex {
    #[inline]
    pub const fn new(pos: Vec2, uv: Vec2, col: Color) -> Self {
        Self { pos, uv, col }
    }
}

/// Integer-rounded clip rectangle stored on draw commands.
///
/// Hardware scissors take integer pixels; rounding once at command-build time
/// also makes the merge-key comparison exact.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ClipRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl ClipRect {
    #[inline]
    pub fn from_rect(r: Rect) -> Self {
        Self {
            x0: r.min.x.round() as i32,
            y0: r.min.y.round() as i32,
            x1: r.max.x.round() as i32,
            y1: r.max.y.round() as i32,
        }
    }

    #[inline]
    pub fn to_rect(self) -> Rect {
        Rect::new(self.x0 as f32, self.y0 as f32, self.x1 as f32, self.y1 as f32)
    }

    #[inline]
    pub fn width(self) -> i32 {
        self.x1 - self.x0
    }

    #[inline]
    pub fn height(self) -> i32 {
        self.y1 - self.y0
    }
}

/// Callback invoked by the backend instead of drawing the command.
///
/// Used for custom GPU work (backend-specific effects) that still wants to be
/// sequenced inside the command stream. Captured state travels with the
/// closure.
#[derive(Clone)]
pub struct DrawCallback(pub Arc<dyn Fn(&DrawCmd) + Send + Sync>);

impl fmt::Debug for DrawCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DrawCallback")
    }
}

/// A batched unit of geometry sharing one GPU state.
///
/// Invariants:
/// - the command's geometry is contiguous in the owning buffer's arenas
/// - commands are never split or reordered once created; the open (last)
///   command may grow until a state change closes it
#[derive(Debug, Clone)]
pub struct DrawCmd {
    /// Number of indices owned by this command.
    pub elem_count: u32,
    /// Number of vertices owned by this command.
    pub vtx_count: u32,
    /// Effective scissor. For circular scissors this is the circle's bound.
    pub clip_rect: ClipRect,
    /// Distance-based scissor test instead of the axis-aligned rect test.
    pub circle_scissor: bool,
    /// Outermost non-circular clip; backends use it as the hardware scissor
    /// while the circular test runs in the shader.
    pub circle_outer_clip: ClipRect,
    pub tex: Option<TextureId>,
    /// Forces backends to bind the font atlas texture regardless of `tex`.
    pub font_texture: bool,
    /// `tex` is a raw backend-native handle, not one minted by
    /// `create_texture`.
    pub native_texture: bool,
    pub blur_strength: u8,
    pub blur_passes: u8,
    /// Chroma key: fragments matching this color render fully transparent.
    /// Alpha of zero disables the feature.
    pub key_color: Color,
    /// Translation-capable model matrix, see
    /// [`DrawBuffer::update_matrix_translate`](super::DrawBuffer::update_matrix_translate).
    pub matrix: Mat4,
    pub callback: Option<DrawCallback>,
}

impl Default for DrawCmd {
    fn default() -> Self {
        Self {
            elem_count: 0,
            vtx_count: 0,
            clip_rect: ClipRect::default(),
            circle_scissor: false,
            circle_outer_clip: ClipRect::default(),
            tex: None,
            font_texture: false,
            native_texture: false,
            blur_strength: 0,
            blur_passes: 1,
            key_color: Color::transparent(),
            matrix: Mat4::IDENTITY,
            callback: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_rect_rounds_to_nearest() {
        let c = ClipRect::from_rect(Rect::new(0.4, 0.6, 10.5, 19.4));
        assert_eq!((c.x0, c.y0, c.x1, c.y1), (0, 1, 11, 19));
    }

    #[test]
    fn default_cmd_is_open_and_stateless() {
        let cmd = DrawCmd::default();
        assert_eq!(cmd.elem_count, 0);
        assert_eq!(cmd.key_color.a, 0);
        assert_eq!(cmd.matrix, Mat4::IDENTITY);
    }
}
