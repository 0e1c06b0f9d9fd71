//! Circle and arc tessellation driven by the shared unit-circle table.
//!
//! `start_degree` rotates the sample window clockwise around the table;
//! `degrees` bounds the window length. Windows shorter than two samples are
//! no-ops.

use crate::coords::{Color, Vec2};

use super::buffer::DrawBuffer;
use super::circle_table::{CIRCLE_TABLE_LEN, circle_table};

/// Maps an angular window to a (start index, sample count) pair on the
/// circle table. Angles are folded into [0, 360].
fn circle_window(degrees: f32, start_degree: f32) -> (usize, usize) {
    let mut degrees = degrees.abs();
    let mut start = start_degree.abs();
    while degrees > 360.0 {
        degrees -= 360.0;
    }
    while start > 360.0 {
        start -= 360.0;
    }

    // Direct division keeps quarter-turn angles exact; a reciprocal-multiply
    // truncates one sample short for 90° starts.
    let len = CIRCLE_TABLE_LEN as f32;
    let count = ((degrees / 360.0 * len) as usize + 1).min(CIRCLE_TABLE_LEN);
    let start_idx = ((start / 360.0 * len) as usize).min(CIRCLE_TABLE_LEN - 1);
    (start_idx, count)
}

/// Fills `out` with `count` table samples starting at `start_idx`, wrapping
/// at the table end, scaled by `radius` around `center`.
fn generate_circle_points(out: &mut Vec<Vec2>, start_idx: usize, count: usize, radius: f32, center: Vec2) {
    let table = circle_table();
    out.clear();
    out.reserve(count);
    let mut cur = start_idx;
    for _ in 0..count {
        if cur >= CIRCLE_TABLE_LEN {
            cur -= CIRCLE_TABLE_LEN;
        }
        out.push(table[cur] * radius + center);
        cur += 1;
    }
}

impl DrawBuffer {
    pub fn circle_filled(&mut self, center: Vec2, radius: f32, col: Color, anti_aliased: bool) {
        self.arc_filled(center, radius, col, col, 360.0, 0.0, anti_aliased);
    }

    /// Filled arc sector: a triangle fan from `center` over the sample
    /// window, `inner_col` in the middle and `outer_col` on the rim.
    /// `anti_aliased` adds a translucent one-pixel ring along the rim.
    pub fn arc_filled(
        &mut self,
        center: Vec2,
        radius: f32,
        inner_col: Color,
        outer_col: Color,
        degrees: f32,
        start_degree: f32,
        anti_aliased: bool,
    ) {
        let (start_idx, count) = circle_window(degrees, start_degree);
        let mut points = std::mem::take(&mut self.path);
        generate_circle_points(&mut points, start_idx, count, radius, center);

        self.fill_circle_impl(center, &points, inner_col, outer_col);
        if anti_aliased {
            self.poly_line(&points, outer_col, 1.0, true);
        }

        points.clear();
        self.path = points;
    }

    pub fn circle(&mut self, center: Vec2, radius: f32, col: Color, thickness: f32, anti_aliased: bool) {
        self.arc(center, radius, col, thickness, 360.0, 0.0, anti_aliased);
    }

    /// Arc outline. Segments are emitted as individual lines; a single
    /// polyline would leave gaps at the miter joins for large thicknesses.
    pub fn arc(
        &mut self,
        center: Vec2,
        radius: f32,
        col: Color,
        thickness: f32,
        degrees: f32,
        start_degree: f32,
        anti_aliased: bool,
    ) {
        let (start_idx, count) = circle_window(degrees, start_degree);
        if count < 2 {
            return;
        }
        let mut points = std::mem::take(&mut self.path);
        generate_circle_points(&mut points, start_idx, count, radius, center);

        for i in 0..points.len() - 1 {
            self.line(points[i], points[i + 1], col, thickness, anti_aliased);
        }

        points.clear();
        self.path = points;
    }

    /// Triangle fan over `points` around `center`. Fewer than two rim points
    /// is a no-op.
    fn fill_circle_impl(&mut self, center: Vec2, points: &[Vec2], col_inner: Color, col_outer: Color) {
        if points.len() < 2 {
            return;
        }
        let uv = self.shared().fonts.white_uv();
        let n = points.len() as u32;
        self.reserve_primitives((n - 1) * 3, n + 1);

        self.write_vtx(center, uv, col_inner);
        let center_idx = self.cur_idx;
        self.cur_idx += 1;

        self.write_vtx(points[0], uv, col_outer);
        for i in 1..points.len() {
            self.write_vtx(points[i], uv, col_outer);
            let cur = self.cur_idx;
            self.write_idx(center_idx);
            self.write_idx(cur + 1);
            self.write_idx(cur);
            self.cur_idx += 1;
        }
        self.cur_idx += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::coords::{Color, Vec2};
    use crate::draw::{DrawBuffer, DrawShared};

    use super::{CIRCLE_TABLE_LEN, circle_window};

    fn test_buffer() -> DrawBuffer {
        DrawBuffer::new(Arc::new(DrawShared::new(Vec2::new(1920.0, 1080.0))))
    }

    // ── window mapping ────────────────────────────────────────────────────

    #[test]
    fn full_sweep_covers_the_whole_table() {
        let (start, count) = circle_window(360.0, 0.0);
        assert_eq!(start, 0);
        assert_eq!(count, CIRCLE_TABLE_LEN);
    }

    #[test]
    fn quarter_sweep_is_strictly_shorter() {
        let (_, quarter) = circle_window(90.0, 0.0);
        let (_, full) = circle_window(360.0, 0.0);
        assert!(quarter < full);
    }

    #[test]
    fn angles_fold_into_one_turn() {
        assert_eq!(circle_window(450.0, 0.0), circle_window(90.0, 0.0));
        assert_eq!(circle_window(90.0, 540.0), circle_window(90.0, 180.0));
    }

    // ── tessellation ──────────────────────────────────────────────────────

    #[test]
    fn closed_circle_ring_endpoints_coincide() {
        let mut buf = test_buffer();
        buf.arc_filled(Vec2::new(100.0, 100.0), 50.0, Color::WHITE, Color::WHITE, 360.0, 0.0, false);

        // Fan layout: center, then the rim samples in order.
        let first_rim = buf.vertices[1].pos;
        let last_rim = buf.vertices.last().expect("rim vertex").pos;
        assert!((first_rim - last_rim).length() < 1e-3);
    }

    #[test]
    fn fan_reserves_expected_counts() {
        let mut buf = test_buffer();
        buf.arc_filled(Vec2::new(0.0, 0.0), 10.0, Color::WHITE, Color::WHITE, 360.0, 0.0, false);
        let n = CIRCLE_TABLE_LEN;
        assert_eq!(buf.vertices.len(), n + 1);
        assert_eq!(buf.indices.len(), (n - 1) * 3);
    }

    #[test]
    fn start_degree_rotates_clockwise() {
        let center = Vec2::new(200.0, 200.0);
        let radius = 100.0;

        let mut buf = test_buffer();
        buf.arc_filled(center, radius, Color::WHITE, Color::WHITE, 90.0, 0.0, false);
        // Window start at zero sits at six o'clock (+Y).
        let p0 = buf.vertices[1].pos;
        assert!((p0 - Vec2::new(200.0, 300.0)).length() < 0.5, "got {p0:?}");

        let mut buf = test_buffer();
        buf.arc_filled(center, radius, Color::WHITE, Color::WHITE, 90.0, 90.0, false);
        // Rotated 90° clockwise: nine o'clock (-X).
        let p90 = buf.vertices[1].pos;
        assert!((p90 - Vec2::new(100.0, 200.0)).length() < 0.5, "got {p90:?}");
    }

    #[test]
    fn tiny_sweep_is_a_noop() {
        let mut buf = test_buffer();
        buf.arc_filled(Vec2::zero(), 10.0, Color::WHITE, Color::WHITE, 0.0, 0.0, false);
        assert!(buf.vertices.is_empty());
        assert!(buf.indices.is_empty());
    }

    #[test]
    fn anti_aliased_circle_adds_a_fringe_ring() {
        let mut plain = test_buffer();
        plain.circle_filled(Vec2::new(50.0, 50.0), 20.0, Color::WHITE, false);
        let mut aa = test_buffer();
        aa.circle_filled(Vec2::new(50.0, 50.0), 20.0, Color::WHITE, true);
        assert!(aa.vertices.len() > plain.vertices.len());

        let idx_total: u32 = aa.cmds.iter().map(|c| c.elem_count).sum();
        assert_eq!(idx_total as usize, aa.indices.len());
    }

    #[test]
    fn outline_circle_emits_per_segment_quads() {
        let mut buf = test_buffer();
        buf.arc(Vec2::new(50.0, 50.0), 20.0, Color::WHITE, 2.0, 90.0, 0.0, false);
        let (_, count) = circle_window(90.0, 0.0);
        assert_eq!(buf.vertices.len(), (count - 1) * 4);
        assert_eq!(buf.indices.len(), (count - 1) * 6);
    }
}
