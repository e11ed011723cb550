use bevy::prelude::*;
use enum_map::EnumMap;
use smallvec::SmallVec;

use super::{
    dock::{DockAnchor, DockFrame},
    math::{facing_rotation, right_axis, toward_viewer_axis, yaw_facing},
    Viewer, ViewerPose,
};
use crate::systems::{
    interaction::Draggable,
    ui::window::{default_widths, OpenOrder, PanelWindow, WindowKey},
};

/// Height of the window row above the dock.
pub const WINDOW_VERTICAL_OFFSET: f32 = 0.62;
/// Slot spacing along the right axis with more than one window open.
pub const SPACING_MULTI: f32 = 1.25;
/// Slot spacing for a lone window.
pub const SPACING_SINGLE: f32 = 0.9;
/// Edge alignment iterations. Each pass re-derives the window yaw from the
/// previous pass's position; this is a fixed count, not a converged solve.
pub const ALIGNMENT_PASSES: usize = 2;

/// `0, 1, -1, 2, -2, ...`
pub fn slot_for_index(index: usize) -> i32 {
    let step = index.div_ceil(2) as i32;
    if index % 2 == 1 {
        step
    } else {
        -step
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPose {
    pub key: WindowKey,
    pub slot: i32,
    pub position: Vec3,
    pub yaw: f32,
}

impl WindowPose {
    /// Outer edges of the window along its own right axis, `(left, right)`.
    fn edges(&self, width: f32) -> (Vec3, Vec3) {
        let half = right_axis(self.yaw) * (width * 0.5);
        (self.position - half, self.position + half)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowLayout {
    poses: SmallVec<[WindowPose; 4]>,
}

impl WindowLayout {
    /// Lays out `order` around `dock`. The result depends only on the inputs.
    pub fn compute(dock: DockFrame, order: &[WindowKey], widths: &EnumMap<WindowKey, f32>) -> Self {
        if order.is_empty() {
            return Self::default();
        }

        let right = right_axis(dock.yaw);
        let toward = toward_viewer_axis(dock.yaw);
        let viewpoint = dock.viewpoint;
        let spacing = if order.len() > 1 {
            SPACING_MULTI
        } else {
            SPACING_SINGLE
        };
        let base = dock.position + Vec3::Y * WINDOW_VERTICAL_OFFSET;

        let mut poses: SmallVec<[WindowPose; 4]> = order
            .iter()
            .enumerate()
            .map(|(index, &key)| {
                let slot = slot_for_index(index);
                let position = base + right * (slot as f32 * spacing);
                WindowPose {
                    key,
                    slot,
                    position,
                    yaw: yaw_facing(viewpoint, position),
                }
            })
            .collect();

        let center = poses[0];
        let (center_left, center_right) = center.edges(widths[center.key]);

        for _ in 0..ALIGNMENT_PASSES {
            for pose in poses.iter_mut().skip(1) {
                let (left, right_edge) = pose.edges(widths[pose.key]);
                let (inner, reference) = if pose.slot > 0 {
                    (left, center_right)
                } else {
                    (right_edge, center_left)
                };
                let depth = (reference - inner).dot(toward);
                pose.position += toward * depth;
                pose.yaw = yaw_facing(viewpoint, pose.position);
            }
        }

        Self { poses }
    }

    pub fn pose(&self, key: WindowKey) -> Option<&WindowPose> {
        self.poses.iter().find(|pose| pose.key == key)
    }

    pub fn poses(&self) -> &[WindowPose] {
        &self.poses
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

/// Re-lays out open panels when the open set or the dock frame changes.
///
/// A change to the open set also clears drag pins. Panels mid-drag or pinned
/// keep their pose.
pub fn apply_window_layout(
    order: Res<OpenOrder>,
    anchor: Res<DockAnchor>,
    viewers: Query<&GlobalTransform, With<Viewer>>,
    mut windows: Query<(&mut PanelWindow, &mut Transform, &Draggable)>,
    mut last_frame: Local<Option<DockFrame>>,
) {
    let order_changed = order.is_changed();
    if order_changed {
        for (mut window, _, _) in &mut windows {
            if window.is_pinned() {
                window.unpin();
            }
        }
    }

    let frame = match ViewerPose::sample(&viewers) {
        Some(viewer) => anchor.current_frame(viewer),
        None if anchor.pose().placed => anchor.frame(),
        None => return,
    };
    if !order_changed && *last_frame == Some(frame) {
        return;
    }
    *last_frame = Some(frame);

    let mut widths = default_widths();
    for (window, _, _) in &windows {
        widths[window.key] = window.width();
    }
    let layout = WindowLayout::compute(frame, order.as_slice(), &widths);

    for (window, mut transform, draggable) in &mut windows {
        if draggable.is_dragging() || window.is_pinned() {
            continue;
        }
        let Some(pose) = layout.pose(window.key) else {
            continue;
        };
        transform.translation = pose.position;
        transform.rotation = facing_rotation(pose.yaw);
    }
}
