use bevy::{math::EulerRot, prelude::*, window::PrimaryWindow};

use super::{PointerDevice, PointerInput, PointerPhase, PointerSurface};
use crate::systems::spatial::{math::ray_panel_intersection, Viewer};

/// Distance along the cursor ray at which the current drag is held.
#[derive(Default)]
pub(super) struct MouseRayState {
    held_distance: Option<f32>,
}

/// Desktop stand-in for a controller ray: the cursor ray from the viewer
/// camera picks the nearest `PointerSurface` on press and then drags at a
/// fixed distance along the ray.
pub(super) fn mouse_ray_pointer(
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<Viewer>>,
    surfaces: Query<(Entity, &GlobalTransform, &PointerSurface, &InheritedVisibility)>,
    mut state: Local<MouseRayState>,
    mut writer: MessageWriter<PointerInput>,
) {
    let device = Some(PointerDevice::Mouse);
    let ray = windows
        .iter()
        .next()
        .and_then(Window::cursor_position)
        .zip(cameras.iter().next())
        .and_then(|(cursor, (camera, camera_transform))| {
            camera.viewport_to_world(camera_transform, cursor).ok()
        });

    let Some(ray) = ray else {
        if state.held_distance.take().is_some() {
            writer.write(PointerInput {
                device,
                phase: PointerPhase::Cancel,
                point: Vec3::ZERO,
                target: None,
            });
        }
        return;
    };
    let direction = *ray.direction;

    if buttons.just_pressed(MouseButton::Left) {
        let nearest = surfaces
            .iter()
            .filter(|(_, _, _, visibility)| visibility.get())
            .filter_map(|(entity, transform, surface, _)| {
                let (_, rotation, center) = transform.to_scale_rotation_translation();
                let (yaw, _, _) = rotation.to_euler(EulerRot::YXZ);
                ray_panel_intersection(ray.origin, direction, center, yaw, surface.size)
                    .map(|distance| (entity, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((entity, distance)) = nearest {
            state.held_distance = Some(distance);
            writer.write(PointerInput {
                device,
                phase: PointerPhase::Press,
                point: ray.origin + direction * distance,
                target: Some(entity),
            });
        }
        return;
    }

    let Some(distance) = state.held_distance else {
        return;
    };
    let point = ray.origin + direction * distance;
    if buttons.just_released(MouseButton::Left) || !buttons.pressed(MouseButton::Left) {
        state.held_distance = None;
        writer.write(PointerInput {
            device,
            phase: PointerPhase::Release,
            point,
            target: None,
        });
    } else {
        writer.write(PointerInput {
            device,
            phase: PointerPhase::Move,
            point,
            target: None,
        });
    }
}
