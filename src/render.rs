//! Geometry and opacity of the dots drawn around the progress ring

use serde::Serialize;

use crate::progress::{FINAL_ANGLE, INITIAL_ANGLE, STEP};

/// Number of faded dots trailing the leading one
pub const TRAIL_LENGTH: usize = 6;

const TRAIL_FADE: [f32; TRAIL_LENGTH] = [1.0, 0.8, 0.6, 0.4, 0.2, 0.0];

/// A dot at `angle` degrees drawn with the given opacity
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Dot {
    pub angle: i32,
    pub opacity: f32,
}

/// The six dots behind `current`, nearest first
pub fn trail(current: i32) -> [Dot; TRAIL_LENGTH] {
    std::array::from_fn(|i| Dot {
        angle: current - STEP * (i as i32 + 1),
        opacity: TRAIL_FADE[i],
    })
}

/// Opacity of the dot at `angle` when the leading dot is at `current`.
///
/// The leading dot is fully opaque; anything further back than the trail
/// is invisible.
pub fn opacity(angle: i32, current: i32) -> f32 {
    if angle == current {
        return 1.0;
    }

    trail(current)
        .iter()
        .find(|dot| dot.angle == angle)
        .map(|dot| dot.opacity)
        .unwrap_or(0.0)
}

/// Every dot from the top of the ring up to `current`.
///
/// Nothing is drawn while the ring is reset.
pub fn ring(current: i32, is_reset: bool) -> Vec<Dot> {
    if is_reset {
        return Vec::new();
    }

    (INITIAL_ANGLE..=current)
        .step_by(STEP as usize)
        .map(|angle| Dot {
            angle,
            opacity: opacity(angle, current),
        })
        .collect()
}

/// Whether the full background circle should be shown underneath the ring
pub fn prefilled(lap_count: u32) -> bool {
    lap_count > 0
}

/// Angles of every dot on a full circle
pub fn full_circle() -> impl Iterator<Item = i32> {
    (INITIAL_ANGLE..=FINAL_ANGLE).step_by(STEP as usize)
}

/// Pixel position of the dot at `degree` on a circle of `radius` around `center`
pub fn dot_position(center: (f32, f32), radius: f32, degree: i32) -> (f32, f32) {
    let radians = (degree as f64).to_radians();

    (
        center.0 + radius * radians.cos() as f32,
        center.1 + radius * radians.sin() as f32,
    )
}

#[cfg(test)]
mod test {
    use super::{dot_position, full_circle, opacity, prefilled, ring, trail};

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-4 && (a.1 - b.1).abs() < 1e-4
    }

    #[test]
    fn trail_fades_away_from_the_leading_dot() {
        let dots = trail(0);

        let angles: Vec<i32> = dots.iter().map(|d| d.angle).collect();
        let fades: Vec<f32> = dots.iter().map(|d| d.opacity).collect();

        assert_eq!(angles, vec![-6, -12, -18, -24, -30, -36]);
        assert_eq!(fades, vec![1.0, 0.8, 0.6, 0.4, 0.2, 0.0]);
    }

    #[test]
    fn leading_dot_is_opaque() {
        assert_eq!(opacity(90, 90), 1.0);
        assert_eq!(opacity(84, 90), 1.0);
        assert_eq!(opacity(78, 90), 0.8);
        assert_eq!(opacity(0, 90), 0.0);
    }

    #[test]
    fn ring_covers_everything_up_to_the_current_angle() {
        let dots = ring(-60, false);

        assert_eq!(dots.len(), 6);
        assert_eq!(dots.first().unwrap().angle, -90);
        assert_eq!(dots.first().unwrap().opacity, 0.2);
        assert_eq!(dots.last().unwrap().angle, -60);
        assert_eq!(dots.last().unwrap().opacity, 1.0);
    }

    #[test]
    fn reset_ring_is_empty() {
        assert!(ring(120, true).is_empty());
    }

    #[test]
    fn background_circle_after_first_lap() {
        assert!(!prefilled(0));
        assert!(prefilled(1));
        assert_eq!(full_circle().count(), 61);
    }

    #[test]
    fn positions_use_degrees() {
        assert!(close(dot_position((50.0, 50.0), 10.0, 0), (60.0, 50.0)));
        assert!(close(dot_position((50.0, 50.0), 10.0, -90), (50.0, 40.0)));
        assert!(close(dot_position((50.0, 50.0), 10.0, 180), (40.0, 50.0)));
    }
}
