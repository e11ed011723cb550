use bevy::prelude::*;

/// Horizontal distances below this are treated as "viewer on top of target".
pub const FACING_EPSILON: f32 = 1e-5;

/// Yaw (rotation about +Y) that turns a flat panel whose front face points
/// along local +Z toward `viewer`. Height differences are ignored.
///
/// A viewer standing exactly above or below the target has no horizontal
/// direction to face; that case returns `0.0`.
pub fn yaw_facing(viewer: Vec3, target: Vec3) -> f32 {
    let dx = viewer.x - target.x;
    let dz = viewer.z - target.z;
    if dx.abs() <= FACING_EPSILON && dz.abs() <= FACING_EPSILON {
        return 0.0;
    }
    dx.atan2(dz)
}

pub fn facing_rotation(yaw: f32) -> Quat {
    Quat::from_rotation_y(yaw)
}

/// Local +X of a panel rotated by `yaw`.
pub fn right_axis(yaw: f32) -> Vec3 {
    Vec3::new(yaw.cos(), 0.0, -yaw.sin())
}

/// Local +Z of a panel rotated by `yaw`; points from the panel to whoever it faces.
pub fn toward_viewer_axis(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// The look direction of `rotation` flattened onto the floor plane.
/// Looking straight up or down falls back to -Z.
pub fn horizontal_forward(rotation: Quat) -> Vec3 {
    let forward = rotation * Vec3::NEG_Z;
    let flat = Vec3::new(forward.x, 0.0, forward.z);
    flat.try_normalize().unwrap_or(Vec3::NEG_Z)
}

/// World position expressed in the local space of `parent`.
pub fn world_to_parent_local(parent: &GlobalTransform, world: Vec3) -> Vec3 {
    parent.affine().inverse().transform_point3(world)
}

/// Yaw-facing rotation expressed relative to a parent's world rotation.
pub fn world_yaw_to_parent_local(parent: &GlobalTransform, yaw: f32) -> Quat {
    let (_, parent_rotation, _) = parent.to_scale_rotation_translation();
    parent_rotation.inverse() * facing_rotation(yaw)
}

/// Intersection of a ray with a panel quad centred on `center`, facing along
/// `toward_viewer_axis(yaw)`. Returns the hit distance along the ray.
pub fn ray_panel_intersection(
    origin: Vec3,
    direction: Vec3,
    center: Vec3,
    yaw: f32,
    size: Vec2,
) -> Option<f32> {
    let normal = toward_viewer_axis(yaw);
    let denom = normal.dot(direction);
    if denom.abs() <= FACING_EPSILON {
        return None;
    }
    let distance = normal.dot(center - origin) / denom;
    if distance < 0.0 {
        return None;
    }
    let local = origin + direction * distance - center;
    let x = local.dot(right_axis(yaw));
    let y = local.y;
    (x.abs() <= size.x * 0.5 && y.abs() <= size.y * 0.5).then_some(distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn viewer_in_front_along_positive_z_gives_zero_yaw() {
        let yaw = yaw_facing(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert!(approx(yaw, 0.0_f32.atan2(5.0)));
        assert!(approx(yaw, 0.0));
    }

    #[test]
    fn viewer_to_the_side_gives_quarter_turn() {
        assert!(approx(yaw_facing(Vec3::new(3.0, 0.0, 0.0), Vec3::ZERO), FRAC_PI_2));
        assert!(approx(
            yaw_facing(Vec3::new(-3.0, 0.0, 0.0), Vec3::ZERO),
            -FRAC_PI_2
        ));
        assert!(approx(yaw_facing(Vec3::new(0.0, 0.0, -2.0), Vec3::ZERO).abs(), PI));
    }

    #[test]
    fn yaw_ignores_viewer_height() {
        let target = Vec3::new(1.0, 0.5, -2.0);
        let low = yaw_facing(Vec3::new(0.0, 0.0, 0.0), target);
        let high = yaw_facing(Vec3::new(0.0, 9.0, 0.0), target);
        assert!(approx(low, high));
    }

    #[test]
    fn coincident_positions_face_zero() {
        let p = Vec3::new(2.0, 1.0, 3.0);
        assert_eq!(yaw_facing(p + Vec3::Y * 4.0, p), 0.0);
    }

    #[test]
    fn facing_rotation_points_front_face_at_viewer() {
        let target = Vec3::new(1.0, 0.0, -3.0);
        let viewer = Vec3::new(-2.0, 1.7, 1.0);
        let front = facing_rotation(yaw_facing(viewer, target)) * Vec3::Z;
        let expected = Vec3::new(viewer.x - target.x, 0.0, viewer.z - target.z).normalize();
        assert!(front.distance(expected) < 1e-5);
    }

    #[test]
    fn axes_match_rotated_basis() {
        let yaw = 0.7;
        let rotation = facing_rotation(yaw);
        assert!(right_axis(yaw).distance(rotation * Vec3::X) < 1e-5);
        assert!(toward_viewer_axis(yaw).distance(rotation * Vec3::Z) < 1e-5);
    }

    #[test]
    fn horizontal_forward_flattens_pitch() {
        let rotation = Quat::from_rotation_y(FRAC_PI_2) * Quat::from_rotation_x(-0.6);
        let forward = horizontal_forward(rotation);
        assert!(approx(forward.y, 0.0));
        assert!(forward.distance(Vec3::NEG_X) < 1e-5);
        assert_eq!(horizontal_forward(Quat::from_rotation_x(FRAC_PI_2)), Vec3::NEG_Z);
    }

    #[test]
    fn parent_local_conversion_undoes_parent_transform() {
        let parent = GlobalTransform::from(
            Transform::from_xyz(1.0, 2.0, 3.0).with_rotation(Quat::from_rotation_y(0.5)),
        );
        let world = Vec3::new(4.0, -1.0, 0.5);
        let local = world_to_parent_local(&parent, world);
        assert!(parent.transform_point(local).distance(world) < 1e-4);
    }

    #[test]
    fn ray_hits_panel_inside_bounds_only() {
        let center = Vec3::new(0.0, 1.0, -2.0);
        let size = Vec2::new(1.0, 0.5);
        let hit = ray_panel_intersection(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Z, center, 0.0, size);
        assert!(approx(hit.unwrap_or(-1.0), 2.0));
        let miss = ray_panel_intersection(Vec3::new(0.8, 1.0, 0.0), Vec3::NEG_Z, center, 0.0, size);
        assert!(miss.is_none());
        let behind = ray_panel_intersection(Vec3::new(0.0, 1.0, 0.0), Vec3::Z, center, 0.0, size);
        assert!(behind.is_none());
    }
}
