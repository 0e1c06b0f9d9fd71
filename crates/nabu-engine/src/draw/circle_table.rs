use std::sync::LazyLock;

use crate::coords::Vec2;

/// Samples per 45° octant. The full table holds `CIRCLE_POINT_COUNT * 8 + 8`
/// unit vectors: eight mirrored octants, each carrying its seam point.
pub const CIRCLE_POINT_COUNT: usize = 64;

/// Total number of precomputed unit-circle samples.
pub const CIRCLE_TABLE_LEN: usize = CIRCLE_POINT_COUNT * 8 + 8;

static CIRCLE_POINTS: LazyLock<[Vec2; CIRCLE_TABLE_LEN]> = LazyLock::new(build_circle_points);

/// Shared unit-circle sample table.
///
/// Index 0 points straight down (+Y, six o'clock on a top-left-origin
/// screen); indices advance clockwise. Arc windows are taken from this table
/// by [`DrawBuffer::circle_filled`](super::DrawBuffer::circle_filled):
/// `start_degree` rotates the window clockwise, `degrees` bounds its length.
///
/// Built once on first use; immutable afterwards.
#[inline]
pub fn circle_table() -> &'static [Vec2; CIRCLE_TABLE_LEN] {
    &CIRCLE_POINTS
}

/// One 45° octant of `cos`/`sin` samples, mirrored and axis-swapped into the
/// remaining seven octants so only `CIRCLE_POINT_COUNT + 1` trig calls are
/// ever evaluated.
fn build_circle_points() -> [Vec2; CIRCLE_TABLE_LEN] {
    let step = (std::f64::consts::PI * 0.25) / CIRCLE_POINT_COUNT as f64;

    let mut octant = [Vec2::zero(); CIRCLE_POINT_COUNT + 1];
    for (i, p) in octant.iter_mut().enumerate() {
        let a = step * i as f64;
        *p = Vec2::new(a.cos() as f32, a.sin() as f32);
    }

    let mut points = [Vec2::zero(); CIRCLE_TABLE_LEN];
    for oct in 0..8 {
        // Octants alternate between (cos, sin) and the axis-swapped
        // (sin, cos) ordering; sign flips select the quadrant.
        let swap = matches!(oct, 1 | 2 | 5 | 6);
        let x_mult = if (2..=5).contains(&oct) { -1.0 } else { 1.0 };
        let y_mult = if oct >= 4 { -1.0 } else { 1.0 };
        let reverse = oct % 2 == 1;

        for j in 0..=CIRCLE_POINT_COUNT {
            let src = octant[if reverse { CIRCLE_POINT_COUNT - j } else { j }];
            let (x, y) = if swap { (src.y, src.x) } else { (src.x, src.y) };
            points[j + oct * (CIRCLE_POINT_COUNT + 1)] = Vec2::new(x * x_mult, y * y_mult);
        }
    }

    // The raw layout starts at +X; rotate so index 0 sits at +Y (six o'clock)
    // and the 90° windows used by rounded-rect corners land on their corners.
    points.rotate_left(CIRCLE_POINT_COUNT * 2 + 2);
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_points_are_unit_length() {
        for p in circle_table() {
            assert!((p.length() - 1.0).abs() < 1e-5, "non-unit point {p:?}");
        }
    }

    #[test]
    fn index_zero_points_down() {
        let p = circle_table()[0];
        assert!(p.x.abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn quarter_indices_hit_cardinal_directions() {
        let table = circle_table();
        let quarter = CIRCLE_TABLE_LEN / 4;
        // Clockwise from six o'clock: left, up, right.
        let left = table[quarter];
        let up = table[quarter * 2];
        let right = table[quarter * 3];
        assert!((left.x + 1.0).abs() < 1e-5 && left.y.abs() < 1e-5);
        assert!(up.x.abs() < 1e-5 && (up.y + 1.0).abs() < 1e-5);
        assert!((right.x - 1.0).abs() < 1e-5 && right.y.abs() < 1e-5);
    }

    #[test]
    fn table_is_clockwise_everywhere() {
        // In +Y-down screen space, clockwise means every cross product of
        // consecutive samples keeps the same sign.
        let table = circle_table();
        for w in table.windows(2) {
            // Seam points repeat; skip exact duplicates.
            if w[0] == w[1] {
                continue;
            }
            let cross = w[0].x * w[1].y - w[0].y * w[1].x;
            assert!(cross > 0.0, "direction flip between {:?} and {:?}", w[0], w[1]);
        }
    }
}
