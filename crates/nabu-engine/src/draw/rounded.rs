//! Rounded rectangles and small composite shapes built on the buffer's
//! primitive API.

use core::ops::BitOr;

use crate::coords::{Color, Vec2};

use super::buffer::DrawBuffer;

/// Selects which corners of a rounded rectangle are actually rounded.
/// Unset corners get a square fill instead.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CornerFlags(pub u8);

impl CornerFlags {
    pub const NONE: CornerFlags = CornerFlags(0);
    pub const TOP_LEFT: CornerFlags = CornerFlags(1 << 0);
    pub const BOT_LEFT: CornerFlags = CornerFlags(1 << 1);
    pub const BOT_RIGHT: CornerFlags = CornerFlags(1 << 2);
    pub const TOP_RIGHT: CornerFlags = CornerFlags(1 << 3);

    pub const TOP: CornerFlags = CornerFlags(Self::TOP_LEFT.0 | Self::TOP_RIGHT.0);
    pub const BOT: CornerFlags = CornerFlags(Self::BOT_LEFT.0 | Self::BOT_RIGHT.0);
    pub const LEFT: CornerFlags = CornerFlags(Self::TOP_LEFT.0 | Self::BOT_LEFT.0);
    pub const RIGHT: CornerFlags = CornerFlags(Self::TOP_RIGHT.0 | Self::BOT_RIGHT.0);
    pub const ALL: CornerFlags = CornerFlags(Self::TOP.0 | Self::BOT.0);

    #[inline]
    pub const fn contains(self, other: CornerFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CornerFlags {
    type Output = CornerFlags;
    #[inline]
    fn bitor(self, rhs: CornerFlags) -> CornerFlags {
        CornerFlags(self.0 | rhs.0)
    }
}

/// Filled rectangle with selectively rounded corners.
///
/// Decomposition: one central rect, four edge rects, and per corner either a
/// 90° filled sector or a square fill. Corner colors blend across the edge
/// rects like [`DrawBuffer::rectangle_filled_multicolor`] does.
pub fn rectangle_filled_rounded(
    buf: &mut DrawBuffer,
    top_left: Vec2,
    bot_right: Vec2,
    radius: f32,
    col: Color,
    flags: CornerFlags,
) {
    rectangle_filled_rounded_multicolor(buf, top_left, bot_right, radius, col, col, col, col, flags);
}

pub fn rectangle_filled_rounded_multicolor(
    buf: &mut DrawBuffer,
    top_left: Vec2,
    bot_right: Vec2,
    radius: f32,
    col_top_left: Color,
    col_top_right: Color,
    col_bot_left: Color,
    col_bot_right: Color,
    flags: CornerFlags,
) {
    let corner_tl = Vec2::new(top_left.x + radius, top_left.y + radius);
    let corner_tr = Vec2::new(bot_right.x - radius, top_left.y + radius);
    let corner_bl = Vec2::new(top_left.x + radius, bot_right.y - radius);
    let corner_br = Vec2::new(bot_right.x - radius, bot_right.y - radius);

    // Central block.
    buf.rectangle_filled_multicolor(
        corner_tl,
        corner_br,
        col_top_left,
        col_top_right,
        col_bot_left,
        col_bot_right,
    );

    // Left side.
    buf.rectangle_filled_multicolor(
        Vec2::new(top_left.x, top_left.y + radius),
        Vec2::new(top_left.x + radius, bot_right.y - radius),
        col_top_left,
        col_top_left,
        col_bot_left,
        col_bot_left,
    );
    // Bottom side.
    buf.rectangle_filled_multicolor(
        Vec2::new(corner_tl.x, bot_right.y - radius),
        Vec2::new(bot_right.x - radius, bot_right.y),
        col_bot_left,
        col_bot_right,
        col_bot_left,
        col_bot_right,
    );
    // Right side.
    buf.rectangle_filled_multicolor(
        corner_tr,
        Vec2::new(bot_right.x, corner_br.y),
        col_top_right,
        col_top_right,
        col_bot_right,
        col_bot_right,
    );
    // Top side.
    buf.rectangle_filled_multicolor(
        Vec2::new(corner_tl.x, top_left.y),
        corner_tr,
        col_top_left,
        col_top_right,
        col_top_left,
        col_top_right,
    );

    // Corner windows: 90° sectors rotated onto each corner.
    if flags.contains(CornerFlags::TOP_LEFT) {
        buf.arc_filled(corner_tl, radius, col_top_left, col_top_left, 90.0, 90.0, true);
    } else {
        buf.rectangle_filled(top_left, corner_tl, col_top_left);
    }

    if flags.contains(CornerFlags::TOP_RIGHT) {
        buf.arc_filled(corner_tr, radius, col_top_right, col_top_right, 90.0, 180.0, true);
    } else {
        buf.rectangle_filled(
            Vec2::new(corner_tr.x, top_left.y),
            Vec2::new(bot_right.x, corner_tr.y),
            col_top_right,
        );
    }

    if flags.contains(CornerFlags::BOT_RIGHT) {
        buf.arc_filled(corner_br, radius, col_bot_right, col_bot_right, 90.0, 270.0, true);
    } else {
        buf.rectangle_filled(corner_br, bot_right, col_bot_right);
    }

    if flags.contains(CornerFlags::BOT_LEFT) {
        buf.arc_filled(corner_bl, radius, col_bot_left, col_bot_left, 90.0, 0.0, true);
    } else {
        buf.rectangle_filled(
            Vec2::new(top_left.x, corner_bl.y),
            Vec2::new(corner_bl.x, bot_right.y),
            col_bot_left,
        );
    }
}

/// Check mark sized to fit a `width × width` box.
pub fn check_mark(buf: &mut DrawBuffer, top_left: Vec2, width: f32, col: Color) {
    let thickness = (width / 5.0).max(1.0);
    let width = width - thickness * 0.5;
    let top_left = top_left + Vec2::splat(thickness * 0.25);

    let third = width / 3.0;
    let bx = top_left.x + third;
    let by = top_left.y + width - third * 0.5;
    let points = [
        Vec2::new(bx - third, by - third),
        Vec2::new(bx, by),
        Vec2::new(bx + third * 2.0, by - third * 2.0),
    ];
    buf.poly_line(&points, col, thickness, false);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::coords::{Color, Vec2};
    use crate::draw::{DrawBuffer, DrawShared};

    use super::*;

    fn test_buffer() -> DrawBuffer {
        DrawBuffer::new(Arc::new(DrawShared::new(Vec2::new(1920.0, 1080.0))))
    }

    // ── flags ─────────────────────────────────────────────────────────────

    #[test]
    fn composite_flags_contain_their_corners() {
        assert!(CornerFlags::TOP.contains(CornerFlags::TOP_LEFT));
        assert!(CornerFlags::TOP.contains(CornerFlags::TOP_RIGHT));
        assert!(!CornerFlags::TOP.contains(CornerFlags::BOT_LEFT));
        assert!(CornerFlags::ALL.contains(CornerFlags::LEFT | CornerFlags::RIGHT));
    }

    // ── decomposition ─────────────────────────────────────────────────────

    #[test]
    fn square_corners_yield_nine_quads() {
        let mut buf = test_buffer();
        rectangle_filled_rounded(
            &mut buf,
            Vec2::new(10.0, 10.0),
            Vec2::new(110.0, 110.0),
            8.0,
            Color::WHITE,
            CornerFlags::NONE,
        );
        // Center + four sides + four square corners.
        assert_eq!(buf.vertices.len(), 9 * 4);
        assert_eq!(buf.indices.len(), 9 * 6);
        assert_eq!(buf.cmds.len(), 1);
    }

    #[test]
    fn rounded_corners_add_arc_geometry() {
        let mut square = test_buffer();
        rectangle_filled_rounded(
            &mut square,
            Vec2::new(10.0, 10.0),
            Vec2::new(110.0, 110.0),
            8.0,
            Color::WHITE,
            CornerFlags::NONE,
        );
        let mut rounded = test_buffer();
        rectangle_filled_rounded(
            &mut rounded,
            Vec2::new(10.0, 10.0),
            Vec2::new(110.0, 110.0),
            8.0,
            Color::WHITE,
            CornerFlags::ALL,
        );
        assert!(rounded.vertices.len() > square.vertices.len());

        let idx_total: u32 = rounded.cmds.iter().map(|c| c.elem_count).sum();
        let vtx_total: u32 = rounded.cmds.iter().map(|c| c.vtx_count).sum();
        assert_eq!(idx_total as usize, rounded.indices.len());
        assert_eq!(vtx_total as usize, rounded.vertices.len());
    }

    #[test]
    fn corner_arcs_stay_inside_the_corner_box() {
        let mut buf = test_buffer();
        rectangle_filled_rounded(
            &mut buf,
            Vec2::new(100.0, 100.0),
            Vec2::new(200.0, 200.0),
            20.0,
            Color::WHITE,
            CornerFlags::ALL,
        );
        // No vertex may fall outside the rectangle bounds (modulo the 1px AA
        // fringe around the corner arcs).
        for v in &buf.vertices {
            assert!(v.pos.x >= 98.0 && v.pos.x <= 202.0, "x out of bounds: {:?}", v.pos);
            assert!(v.pos.y >= 98.0 && v.pos.y <= 202.0, "y out of bounds: {:?}", v.pos);
        }
    }

    #[test]
    fn mixed_flags_round_only_selected_corners() {
        let mut buf = test_buffer();
        rectangle_filled_rounded(
            &mut buf,
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 100.0),
            10.0,
            Color::WHITE,
            CornerFlags::TOP_LEFT,
        );
        // One rounded corner: more geometry than all-square, less than
        // all-rounded.
        let mut none = test_buffer();
        rectangle_filled_rounded(
            &mut none,
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 100.0),
            10.0,
            Color::WHITE,
            CornerFlags::NONE,
        );
        let mut all = test_buffer();
        rectangle_filled_rounded(
            &mut all,
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 100.0),
            10.0,
            Color::WHITE,
            CornerFlags::ALL,
        );
        assert!(buf.vertices.len() > none.vertices.len());
        assert!(buf.vertices.len() < all.vertices.len());
    }

    // ── check mark ────────────────────────────────────────────────────────

    #[test]
    fn check_mark_is_two_segments() {
        let mut buf = test_buffer();
        check_mark(&mut buf, Vec2::new(10.0, 10.0), 20.0, Color::GREEN);
        assert_eq!(buf.vertices.len(), 8);
        assert_eq!(buf.indices.len(), 12);
    }
}
