use std::time::Instant;
use glam::{Quat, Vec2, Vec3};

/// Moves closer together than this are merged into the next one
const MIN_MOVE_INTERVAL_MS: f32 = 20.0;

/// Virtual trackball that keeps spinning after it is released.
///
/// Positions are in view coordinates, `[-1, 1]` on both axes with Y up (see
/// [`Trackball::view_position`]). Angular velocity is in degrees per
/// millisecond.
pub struct Trackball {
    rotation: Quat,
    axis: Vec3,
    angular_velocity: f32,
    last_pos: Vec2,
    last_time: Instant,
    pressed: bool,
}

impl Trackball {
    pub fn new(angular_velocity: f32, axis: Vec3, now: Instant) -> Self {
        Self {
            rotation: Quat::IDENTITY,
            axis: axis.normalize_or_zero(),
            angular_velocity,
            last_pos: Vec2::ZERO,
            last_time: now,
            pressed: false,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn push(&mut self, pos: Vec2, now: Instant) {
        self.rotation = self.rotation(now);
        self.pressed = true;
        self.last_time = now;
        self.last_pos = pos;
        self.angular_velocity = 0.0;
    }

    /// Rotates by the arc between the previous and the current position on
    /// the unit sphere
    pub fn drag(&mut self, pos: Vec2, now: Instant) {
        if !self.pressed {
            return;
        }
        let msecs = millis_between(self.last_time, now);
        if msecs <= MIN_MOVE_INTERVAL_MS {
            return;
        }

        let last = project_onto_sphere(self.last_pos);
        let current = project_onto_sphere(pos);
        let axis = last.cross(current).normalize_or_zero();
        let angle = last.dot(current).clamp(-1.0, 1.0).acos().to_degrees();

        if axis == Vec3::ZERO {
            self.angular_velocity = 0.0;
        } else {
            self.axis = axis;
            self.angular_velocity = angle / msecs;
            self.rotation = Quat::from_axis_angle(axis, angle.to_radians()) * self.rotation;
        }

        self.last_pos = pos;
        self.last_time = now;
    }

    pub fn release(&mut self, pos: Vec2, now: Instant) {
        self.drag(pos, now);
        self.pressed = false;
    }

    pub fn rotation(&self, now: Instant) -> Quat {
        if self.pressed || self.axis == Vec3::ZERO {
            return self.rotation;
        }
        let angle = self.angular_velocity * millis_between(self.last_time, now);
        (Quat::from_axis_angle(self.axis, angle.to_radians()) * self.rotation).normalize()
    }

    /// Maps a cursor position in pixels to view coordinates
    pub fn view_position(pixel: Vec2, window_size: Vec2) -> Vec2 {
        let half = window_size.max(Vec2::ONE) / 2.0;
        Vec2::new(pixel.x / half.x - 1.0, 1.0 - pixel.y / half.y)
    }
}

fn millis_between(earlier: Instant, later: Instant) -> f32 {
    later.saturating_duration_since(earlier).as_secs_f32() * 1000.0
}

/// Points outside the unit circle land on its rim
fn project_onto_sphere(pos: Vec2) -> Vec3 {
    let sqr_z = 1.0 - pos.length_squared();
    if sqr_z > 0.0 {
        pos.extend(sqr_z.sqrt())
    } else {
        pos.extend(0.0).normalize_or_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn assert_rotation_eq(actual: Quat, expected: Quat) {
        assert!(
            actual.abs_diff_eq(expected, 1e-4) || actual.abs_diff_eq(-expected, 1e-4),
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn idle_trackball_spins_at_its_initial_velocity() {
        let t0 = Instant::now();
        let trackball = Trackball::new(-0.05, Vec3::Y, t0);

        assert_rotation_eq(trackball.rotation(t0), Quat::IDENTITY);
        assert_rotation_eq(
            trackball.rotation(t0 + ms(1000)),
            Quat::from_rotation_y((-50.0f32).to_radians()),
        );
    }

    #[test]
    fn pressing_stops_the_spin() {
        let t0 = Instant::now();
        let mut trackball = Trackball::new(-0.05, Vec3::Y, t0);

        trackball.push(Vec2::ZERO, t0 + ms(1000));
        let held = trackball.rotation(t0 + ms(1000));

        assert_rotation_eq(trackball.rotation(t0 + ms(5000)), held);
        assert_rotation_eq(held, Quat::from_rotation_y((-50.0f32).to_radians()));
    }

    #[test]
    fn dragging_right_rotates_about_y() {
        let t0 = Instant::now();
        let mut trackball = Trackball::new(0.0, Vec3::Y, t0);

        trackball.push(Vec2::ZERO, t0);
        trackball.drag(Vec2::new(0.5, 0.0), t0 + ms(100));

        assert_rotation_eq(
            trackball.rotation(t0 + ms(100)),
            Quat::from_rotation_y(30.0f32.to_radians()),
        );
    }

    #[test]
    fn moves_within_the_merge_interval_are_ignored() {
        let t0 = Instant::now();
        let mut trackball = Trackball::new(0.0, Vec3::Y, t0);

        trackball.push(Vec2::ZERO, t0);
        trackball.drag(Vec2::new(0.5, 0.0), t0 + ms(10));

        assert_rotation_eq(trackball.rotation(t0 + ms(10)), Quat::IDENTITY);
    }

    #[test]
    fn release_keeps_the_drag_velocity() {
        let t0 = Instant::now();
        let mut trackball = Trackball::new(0.0, Vec3::Y, t0);

        trackball.push(Vec2::ZERO, t0);
        trackball.drag(Vec2::new(0.5, 0.0), t0 + ms(100));
        trackball.release(Vec2::new(0.5, 0.0), t0 + ms(110));

        assert!(!trackball.is_pressed());
        // 30 degrees in 100 ms, so another 30 degrees after 100 more
        assert_rotation_eq(
            trackball.rotation(t0 + ms(200)),
            Quat::from_rotation_y(60.0f32.to_radians()),
        );
    }

    #[test]
    fn release_after_holding_still_stops_the_spin() {
        let t0 = Instant::now();
        let mut trackball = Trackball::new(0.0, Vec3::Y, t0);

        trackball.push(Vec2::ZERO, t0);
        trackball.drag(Vec2::new(0.5, 0.0), t0 + ms(100));
        trackball.release(Vec2::new(0.5, 0.0), t0 + ms(500));

        let released = trackball.rotation(t0 + ms(500));
        assert_rotation_eq(trackball.rotation(t0 + ms(2000)), released);
    }

    #[test]
    fn window_corners_map_to_view_corners() {
        let size = Vec2::new(800.0, 600.0);

        assert_eq!(Trackball::view_position(Vec2::ZERO, size), Vec2::new(-1.0, 1.0));
        assert_eq!(Trackball::view_position(size, size), Vec2::new(1.0, -1.0));
        assert_eq!(Trackball::view_position(size / 2.0, size), Vec2::ZERO);
    }

    #[test]
    fn points_outside_the_circle_land_on_the_rim() {
        let projected = project_onto_sphere(Vec2::new(3.0, 4.0));

        assert!((projected.length() - 1.0).abs() < 1e-6);
        assert_eq!(projected.z, 0.0);
    }
}
