//! Geometry helpers shared by the movement core and the simulation.
//!
//! Agents move on the XZ plane; Y is carried through untouched so markers and
//! waypoints keep whatever height the host gave them.

pub use glam::{Quat, Vec3};

/// Arithmetic midpoint of two points.
#[must_use]
pub fn midpoint(a: Vec3, b: Vec3) -> Vec3 {
    (a + b) * 0.5
}

/// Distance on the ground plane, ignoring height.
#[must_use]
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = b.x - a.x;
    let dz = b.z - a.z;
    (dx * dx + dz * dz).sqrt()
}

/// Unit direction from `from` to `to` on the ground plane, or zero when the
/// points coincide.
#[must_use]
pub fn planar_direction(from: Vec3, to: Vec3) -> Vec3 {
    let dir = Vec3::new(to.x - from.x, 0.0, to.z - from.z);
    if dir.length_squared() < 1e-8 {
        Vec3::ZERO
    } else {
        dir.normalize()
    }
}

/// Yaw (radians around +Y) that faces along `dir`.
#[must_use]
pub fn yaw_of(dir: Vec3) -> f32 {
    dir.x.atan2(dir.z)
}

/// Rotates a local offset by a yaw angle.
#[must_use]
pub fn rotate_yaw(offset: Vec3, yaw: f32) -> Vec3 {
    Quat::from_rotation_y(yaw) * offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint() {
        let m = midpoint(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(m, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_planar_distance_ignores_height() {
        let d = planar_distance(Vec3::new(0.0, 5.0, 0.0), Vec3::new(3.0, -2.0, 4.0));
        assert!((d - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_planar_direction_degenerate() {
        assert_eq!(planar_direction(Vec3::ONE, Vec3::ONE), Vec3::ZERO);
    }

    #[test]
    fn test_rotate_yaw_quarter_turn() {
        // Forward (+Z) rotated by +90 degrees lands on +X.
        let r = rotate_yaw(Vec3::Z, std::f32::consts::FRAC_PI_2);
        assert!((r.x - 1.0).abs() < 1e-5);
        assert!(r.z.abs() < 1e-5);
        assert!((yaw_of(Vec3::X) - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    proptest::proptest! {
        #[test]
        fn prop_midpoint_is_equidistant(
            ax in -1000.0f32..1000.0, az in -1000.0f32..1000.0,
            bx in -1000.0f32..1000.0, bz in -1000.0f32..1000.0,
        ) {
            let a = Vec3::new(ax, 0.0, az);
            let b = Vec3::new(bx, 0.0, bz);
            let m = midpoint(a, b);
            let da = planar_distance(a, m);
            let db = planar_distance(b, m);
            proptest::prop_assert!((da - db).abs() <= 1e-2);
        }
    }
}
