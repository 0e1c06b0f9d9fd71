//! Polyline tessellation, with and without anti-aliasing.
//!
//! The anti-aliased paths emit translucent fringe rings around a solid core:
//! three vertices per point for thin lines, four for thick lines. Miters at
//! shared points use the midpoint-normal technique with a squared-length
//! clamp so sharp turns cannot blow the offset up.

use crate::coords::{Color, Vec2};

use super::buffer::DrawBuffer;
use super::primitives::UV_NONE;

/// Width of the translucent fringe in pixels.
const AA_SIZE: f32 = 1.0;

/// Minimum squared length accepted for a miter normal.
const MITER_CLAMP: f32 = 0.5;

impl DrawBuffer {
    /// Open polyline through `points` in one color. Fewer than two points is
    /// a no-op.
    pub fn poly_line(&mut self, points: &[Vec2], col: Color, thickness: f32, anti_aliased: bool) {
        self.poly_line_impl(points, &|_| col, thickness, anti_aliased);
    }

    /// Open polyline with one color per input point. Each non-anti-aliased
    /// segment takes the color of its *first* point; colors are never
    /// averaged.
    pub fn poly_line_multicolor(
        &mut self,
        points: &[Vec2],
        cols: &[Color],
        thickness: f32,
        anti_aliased: bool,
    ) {
        debug_assert_eq!(points.len(), cols.len(), "one color per point");
        self.poly_line_impl(points, &|i| cols[i], thickness, anti_aliased);
    }

    fn poly_line_impl(
        &mut self,
        points: &[Vec2],
        color_at: &dyn Fn(usize) -> Color,
        thickness: f32,
        anti_aliased: bool,
    ) {
        let n = points.len();
        if n < 2 {
            return;
        }
        let segments = n - 1;
        let thick_line = thickness > 1.0;

        if !anti_aliased {
            self.reserve_primitives(segments as u32 * 6, segments as u32 * 4);
            for i in 0..segments {
                let p1 = points[i];
                let p2 = points[i + 1];
                let d = (p2 - p1).normalized() * (thickness * 0.5);
                let d = Vec2::new(-d.y, d.x);
                let col = color_at(i);

                self.write_vtx(p1 + d, UV_NONE, col);
                self.write_vtx(p2 + d, UV_NONE, col);
                self.write_vtx(p2 - d, UV_NONE, col);
                self.write_vtx(p1 - d, UV_NONE, col);

                let idx = self.cur_idx;
                self.write_idx(idx);
                self.write_idx(idx + 1);
                self.write_idx(idx + 2);
                self.write_idx(idx);
                self.write_idx(idx + 2);
                self.write_idx(idx + 3);
                self.cur_idx += 4;
            }
            return;
        }

        // Per-point normals; the open end duplicates the last segment's
        // normal instead of wrapping around.
        let mut normals = vec![Vec2::zero(); n];
        for i in 0..segments {
            normals[i] = (points[i + 1] - points[i]).normalized().perp();
        }
        normals[n - 1] = normals[n - 2];

        if !thick_line {
            let idx_count = segments as u32 * 12;
            let vtx_count = n as u32 * 3;
            self.reserve_primitives(idx_count, vtx_count);

            // Ring slots per point: [+fringe, -fringe].
            let mut ring = vec![Vec2::zero(); n * 2];
            ring[0] = points[0] + normals[0] * AA_SIZE;
            ring[1] = points[0] - normals[0] * AA_SIZE;
            ring[(n - 1) * 2] = points[n - 1] + normals[n - 1] * AA_SIZE;
            ring[(n - 1) * 2 + 1] = points[n - 1] - normals[n - 1] * AA_SIZE;

            let mut idx = self.cur_idx;
            for i in 0..segments {
                let j = i + 1;
                let idx2 = idx + 3;

                let dm = fix_normal((normals[i] + normals[j]) * 0.5) * AA_SIZE;
                ring[j * 2] = points[j] + dm;
                ring[j * 2 + 1] = points[j] - dm;

                self.write_idx(idx2);
                self.write_idx(idx);
                self.write_idx(idx + 2);
                self.write_idx(idx + 2);
                self.write_idx(idx2 + 2);
                self.write_idx(idx2);
                self.write_idx(idx2 + 1);
                self.write_idx(idx + 1);
                self.write_idx(idx);
                self.write_idx(idx);
                self.write_idx(idx2);
                self.write_idx(idx2 + 1);

                idx = idx2;
            }

            for i in 0..n {
                let col = color_at(i);
                self.write_vtx(points[i], UV_NONE, col);
                self.write_vtx(ring[i * 2], UV_NONE, col.faded());
                self.write_vtx(ring[i * 2 + 1], UV_NONE, col.faded());
            }
            self.cur_idx += vtx_count;
        } else {
            let idx_count = segments as u32 * 18;
            let vtx_count = n as u32 * 4;
            self.reserve_primitives(idx_count, vtx_count);

            let half_inner = (thickness - AA_SIZE) * 0.5;

            // Ring slots per point: [+outer, +inner, -inner, -outer].
            let mut ring = vec![Vec2::zero(); n * 4];
            ring[0] = points[0] + normals[0] * (half_inner + AA_SIZE);
            ring[1] = points[0] + normals[0] * half_inner;
            ring[2] = points[0] - normals[0] * half_inner;
            ring[3] = points[0] - normals[0] * (half_inner + AA_SIZE);
            let last = n - 1;
            ring[last * 4] = points[last] + normals[last] * (half_inner + AA_SIZE);
            ring[last * 4 + 1] = points[last] + normals[last] * half_inner;
            ring[last * 4 + 2] = points[last] - normals[last] * half_inner;
            ring[last * 4 + 3] = points[last] - normals[last] * (half_inner + AA_SIZE);

            let mut idx = self.cur_idx;
            for i in 0..segments {
                let j = i + 1;
                let idx2 = idx + 4;

                let dm = fix_normal((normals[i] + normals[j]) * 0.5);
                let dm_out = dm * (half_inner + AA_SIZE);
                let dm_in = dm * half_inner;
                ring[j * 4] = points[j] + dm_out;
                ring[j * 4 + 1] = points[j] + dm_in;
                ring[j * 4 + 2] = points[j] - dm_in;
                ring[j * 4 + 3] = points[j] - dm_out;

                self.write_idx(idx2 + 1);
                self.write_idx(idx + 1);
                self.write_idx(idx + 2);
                self.write_idx(idx + 2);
                self.write_idx(idx2 + 2);
                self.write_idx(idx2 + 1);
                self.write_idx(idx2 + 1);
                self.write_idx(idx + 1);
                self.write_idx(idx);
                self.write_idx(idx);
                self.write_idx(idx2);
                self.write_idx(idx2 + 1);
                self.write_idx(idx2 + 2);
                self.write_idx(idx + 2);
                self.write_idx(idx + 3);
                self.write_idx(idx + 3);
                self.write_idx(idx2 + 3);
                self.write_idx(idx2 + 2);

                idx = idx2;
            }

            for i in 0..n {
                let col = color_at(i);
                self.write_vtx(ring[i * 4], UV_NONE, col.faded());
                self.write_vtx(ring[i * 4 + 1], UV_NONE, col);
                self.write_vtx(ring[i * 4 + 2], UV_NONE, col);
                self.write_vtx(ring[i * 4 + 3], UV_NONE, col.faded());
            }
            self.cur_idx += vtx_count;
        }
    }
}

/// Scales a miter normal by the inverse of its squared length, clamped below
/// at [`MITER_CLAMP`] to stay finite at sharp turns.
#[inline]
fn fix_normal(dm: Vec2) -> Vec2 {
    let len_sq = dm.length_sq().max(MITER_CLAMP);
    dm * (1.0 / len_sq)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::coords::{Color, Vec2};
    use crate::draw::{DrawBuffer, DrawShared};

    fn test_buffer() -> DrawBuffer {
        DrawBuffer::new(Arc::new(DrawShared::new(Vec2::new(1920.0, 1080.0))))
    }

    // ── layout counts ─────────────────────────────────────────────────────

    #[test]
    fn thin_aa_line_uses_three_ring_layout() {
        let mut buf = test_buffer();
        buf.poly_line(
            &[Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0)],
            Color::WHITE,
            1.0,
            true,
        );
        // 3 vertices per point, 12 indices per segment.
        assert_eq!(buf.vertices.len(), 6);
        assert_eq!(buf.indices.len(), 12);
    }

    #[test]
    fn thick_aa_line_uses_four_ring_layout() {
        let mut buf = test_buffer();
        buf.poly_line(
            &[Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), Vec2::new(100.0, 100.0)],
            Color::WHITE,
            4.0,
            true,
        );
        // 4 vertices per point, 18 indices per segment.
        assert_eq!(buf.vertices.len(), 12);
        assert_eq!(buf.indices.len(), 36);
    }

    #[test]
    fn plain_polyline_is_a_quad_per_segment() {
        let mut buf = test_buffer();
        buf.poly_line(
            &[Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(20.0, 10.0)],
            Color::WHITE,
            2.0,
            false,
        );
        assert_eq!(buf.vertices.len(), 8);
        assert_eq!(buf.indices.len(), 12);
    }

    #[test]
    fn single_point_is_a_noop() {
        let mut buf = test_buffer();
        buf.poly_line(&[Vec2::new(5.0, 5.0)], Color::WHITE, 2.0, true);
        buf.poly_line(&[], Color::WHITE, 2.0, false);
        assert!(buf.vertices.is_empty());
        assert!(buf.indices.is_empty());
    }

    // ── colors ────────────────────────────────────────────────────────────

    #[test]
    fn aa_fringe_vertices_are_transparent() {
        let mut buf = test_buffer();
        buf.poly_line(
            &[Vec2::new(0.0, 0.0), Vec2::new(50.0, 0.0)],
            Color::RED,
            1.0,
            true,
        );
        // Per point: core, fringe, fringe.
        for chunk in buf.vertices.chunks(3) {
            assert_eq!(chunk[0].col.a, 255);
            assert_eq!(chunk[1].col.a, 0);
            assert_eq!(chunk[2].col.a, 0);
            assert_eq!(chunk[1].col.r, Color::RED.r);
        }
    }

    #[test]
    fn plain_segment_takes_first_point_color() {
        let mut buf = test_buffer();
        buf.poly_line_multicolor(
            &[Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(20.0, 0.0)],
            &[Color::RED, Color::GREEN, Color::BLUE],
            2.0,
            false,
        );
        // First segment all red, second all green; never averaged.
        for v in &buf.vertices[..4] {
            assert_eq!(v.col, Color::RED);
        }
        for v in &buf.vertices[4..8] {
            assert_eq!(v.col, Color::GREEN);
        }
    }

    // ── miter guard ───────────────────────────────────────────────────────

    #[test]
    fn sharp_turn_stays_finite() {
        let mut buf = test_buffer();
        // Near-180° reversal: the midpoint normal almost vanishes and would
        // explode without the clamp.
        buf.poly_line(
            &[Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.1), Vec2::new(0.0, 0.2)],
            Color::WHITE,
            3.0,
            true,
        );
        for v in &buf.vertices {
            assert!(v.pos.is_finite(), "non-finite vertex {:?}", v.pos);
            assert!(v.pos.length() < 1000.0, "miter blew up: {:?}", v.pos);
        }
    }

    #[test]
    fn duplicate_points_stay_finite() {
        let mut buf = test_buffer();
        buf.poly_line(
            &[Vec2::new(10.0, 10.0), Vec2::new(10.0, 10.0), Vec2::new(20.0, 10.0)],
            Color::WHITE,
            1.0,
            true,
        );
        for v in &buf.vertices {
            assert!(v.pos.is_finite());
        }
    }
}
