//! Direct primitive emission: triangles, rectangles, polygon fills, and the
//! raw prim_* writers used after an explicit reservation.

use crate::coords::{Color, Vec2};

use super::buffer::DrawBuffer;

/// UV used by untextured geometry. Backends bind a white fallback texture for
/// commands without a texture, so any UV samples white.
pub(crate) const UV_NONE: Vec2 = Vec2::new(1.0, 1.0);

impl DrawBuffer {
    // ── triangles ─────────────────────────────────────────────────────────

    pub fn triangle_filled(&mut self, p1: Vec2, p2: Vec2, p3: Vec2, col: Color) {
        self.triangle_filled_multicolor(p1, p2, p3, col, col, col, false);
    }

    /// One solid triangle with per-corner colors. `anti_aliased` edges the
    /// triangle with thin AA lines.
    pub fn triangle_filled_multicolor(
        &mut self,
        p1: Vec2,
        p2: Vec2,
        p3: Vec2,
        col_p1: Color,
        col_p2: Color,
        col_p3: Color,
        anti_aliased: bool,
    ) {
        self.reserve_primitives(3, 3);
        self.write_vtx(p1, UV_NONE, col_p1);
        self.write_vtx(p2, UV_NONE, col_p2);
        self.write_vtx(p3, UV_NONE, col_p3);
        let idx = self.cur_idx;
        self.write_idx(idx);
        self.write_idx(idx + 1);
        self.write_idx(idx + 2);
        self.cur_idx += 3;

        if anti_aliased {
            self.line_multicolor(p1, p2, col_p1, col_p2, 1.0, true);
            self.line_multicolor(p2, p3, col_p2, col_p3, 1.0, true);
            self.line_multicolor(p3, p1, col_p3, col_p1, 1.0, true);
        }
    }

    // ── rectangles ────────────────────────────────────────────────────────

    pub fn rectangle_filled(&mut self, top_left: Vec2, bot_right: Vec2, col: Color) {
        self.rectangle_filled_multicolor(top_left, bot_right, col, col, col, col);
    }

    /// Filled axis-aligned rectangle: 4 vertices, 6 indices, one color per
    /// corner.
    pub fn rectangle_filled_multicolor(
        &mut self,
        top_left: Vec2,
        bot_right: Vec2,
        col_top_left: Color,
        col_top_right: Color,
        col_bot_left: Color,
        col_bot_right: Color,
    ) {
        let top_right = Vec2::new(bot_right.x, top_left.y);
        let bot_left = Vec2::new(top_left.x, bot_right.y);

        self.reserve_primitives(6, 4);
        self.write_vtx(top_left, UV_NONE, col_top_left);
        self.write_vtx(top_right, UV_NONE, col_top_right);
        self.write_vtx(bot_right, UV_NONE, col_bot_right);
        self.write_vtx(bot_left, UV_NONE, col_bot_left);
        let idx = self.cur_idx;
        self.write_idx(idx);
        self.write_idx(idx + 1);
        self.write_idx(idx + 2);
        self.write_idx(idx);
        self.write_idx(idx + 2);
        self.write_idx(idx + 3);
        self.cur_idx += 4;
    }

    pub fn rectangle(
        &mut self,
        top_left: Vec2,
        bot_right: Vec2,
        thickness: f32,
        col: Color,
        clipped: bool,
    ) {
        self.rectangle_multicolor(top_left, bot_right, thickness, col, col, col, col, clipped);
    }

    /// Rectangle outline drawn as a closed 5-point polyline. `clipped` insets
    /// the stroke so it stays inside the given bounds.
    pub fn rectangle_multicolor(
        &mut self,
        top_left_pre: Vec2,
        bot_right_pre: Vec2,
        thickness: f32,
        col_top_left: Color,
        col_top_right: Color,
        col_bot_left: Color,
        col_bot_right: Color,
        clipped: bool,
    ) {
        let half = thickness / 2.0;
        let top_left = if clipped {
            Vec2::new(top_left_pre.x + half, top_left_pre.y - half)
        } else {
            Vec2::new(top_left_pre.x, top_left_pre.y - half)
        };
        let bot_right = if clipped {
            Vec2::new(bot_right_pre.x - half, bot_right_pre.y)
        } else {
            bot_right_pre
        };

        let mut path = std::mem::take(&mut self.path);
        path.clear();
        path.push(top_left);
        path.push(Vec2::new(top_left.x, bot_right.y));
        path.push(bot_right);
        path.push(Vec2::new(bot_right.x, top_left_pre.y));
        path.push(Vec2::new(top_left.x + half - 1.0, top_left_pre.y));

        let colors = [col_top_left, col_bot_left, col_bot_right, col_top_right, col_top_left];
        self.poly_line_multicolor(&path, &colors, thickness, false);

        path.clear();
        self.path = path;
    }

    // ── lines ─────────────────────────────────────────────────────────────

    pub fn line(&mut self, p1: Vec2, p2: Vec2, col: Color, thickness: f32, anti_aliased: bool) {
        self.line_multicolor(p1, p2, col, col, thickness, anti_aliased);
    }

    pub fn line_multicolor(
        &mut self,
        p1: Vec2,
        p2: Vec2,
        col1: Color,
        col2: Color,
        thickness: f32,
        anti_aliased: bool,
    ) {
        self.poly_line_multicolor(&[p1, p2], &[col1, col2], thickness, anti_aliased);
    }

    // ── polygon fills ─────────────────────────────────────────────────────

    pub fn poly_fill(&mut self, points: &[Vec2], col: Color) {
        if points.len() < 3 {
            return;
        }
        let uv = self.shared().fonts.white_uv();
        let count = points.len() as u32;
        self.reserve_primitives((count - 2) * 3, count);
        for &p in points {
            self.write_vtx(p, uv, col);
        }
        let base = self.cur_idx;
        for i in 2..count {
            self.write_idx(base);
            self.write_idx(base + i - 1);
            self.write_idx(base + i);
        }
        self.cur_idx += count;
    }

    /// Convex fan fill with one color per point.
    pub fn poly_fill_multicolor(&mut self, points: &[Vec2], cols: &[Color]) {
        if points.len() < 3 {
            return;
        }
        debug_assert_eq!(points.len(), cols.len(), "one color per point");
        let uv = self.shared().fonts.white_uv();
        let count = points.len() as u32;
        self.reserve_primitives((count - 2) * 3, count);
        for (&p, &c) in points.iter().zip(cols) {
            self.write_vtx(p, uv, c);
        }
        let base = self.cur_idx;
        for i in 2..count {
            self.write_idx(base);
            self.write_idx(base + i - 1);
            self.write_idx(base + i);
        }
        self.cur_idx += count;
    }

    // ── raw primitives (caller reserves first) ────────────────────────────

    /// Writes one solid quad into an outstanding reservation (6 indices,
    /// 4 vertices).
    pub fn prim_rect(&mut self, a: Vec2, c: Vec2, col: Color) {
        self.prim_rect_uv(a, c, UV_NONE, UV_NONE, col);
    }

    /// Writes one textured quad spanning `a`..`c` with UVs `uv_a`..`uv_c`
    /// into an outstanding reservation.
    pub fn prim_rect_uv(&mut self, a: Vec2, c: Vec2, uv_a: Vec2, uv_c: Vec2, col: Color) {
        let b = Vec2::new(c.x, a.y);
        let d = Vec2::new(a.x, c.y);
        let uv_b = Vec2::new(uv_c.x, uv_a.y);
        let uv_d = Vec2::new(uv_a.x, uv_c.y);

        let idx = self.cur_idx;
        self.write_idx(idx);
        self.write_idx(idx + 1);
        self.write_idx(idx + 2);
        self.write_idx(idx);
        self.write_idx(idx + 2);
        self.write_idx(idx + 3);
        self.write_vtx(a, uv_a, col);
        self.write_vtx(b, uv_b, col);
        self.write_vtx(c, uv_c, col);
        self.write_vtx(d, uv_d, col);
        self.cur_idx += 4;
    }

    /// Writes one arbitrary quad with per-corner UVs into an outstanding
    /// reservation.
    pub fn prim_quad_uv(
        &mut self,
        tl: Vec2,
        tr: Vec2,
        bl: Vec2,
        br: Vec2,
        uv_tl: Vec2,
        uv_tr: Vec2,
        uv_bl: Vec2,
        uv_br: Vec2,
        col: Color,
    ) {
        let idx = self.cur_idx;
        self.write_idx(idx);
        self.write_idx(idx + 1);
        self.write_idx(idx + 2);
        self.write_idx(idx + 1);
        self.write_idx(idx + 3);
        self.write_idx(idx + 2);
        self.write_vtx(tl, uv_tl, col);
        self.write_vtx(tr, uv_tr, col);
        self.write_vtx(bl, uv_bl, col);
        self.write_vtx(br, uv_br, col);
        self.cur_idx += 4;
    }
}
