use bevy::{math::EulerRot, prelude::*};

use super::{
    math::{facing_rotation, horizontal_forward, yaw_facing},
    Viewer, ViewerPose,
};
use crate::systems::interaction::{DragEnded, Draggable, PointerSurface};

/// Horizontal distance from the head to the dock when it is placed.
pub const DOCK_FORWARD_DISTANCE: f32 = 1.4;
/// Vertical offset from head height to the dock; negative is below the eyes.
pub const DOCK_VERTICAL_OFFSET: f32 = -0.55;
pub const DOCK_HANDLE_SIZE: Vec2 = Vec2::new(0.5, 0.08);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DockPose {
    pub position: Vec3,
    pub yaw: f32,
    /// Head position the dock was last placed or dragged from.
    pub viewpoint: Vec3,
    /// Set by the first automatic or manual placement; never cleared.
    pub placed: bool,
    /// Set once the user drags the dock; suppresses automatic re-placement.
    pub user_moved: bool,
}

/// Position and facing the layout engine works from. Panels laid out
/// around the dock turn to face `viewpoint`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DockFrame {
    pub position: Vec3,
    pub yaw: f32,
    pub viewpoint: Vec3,
}

/// Owner of the dock pose. Every mutation goes through these methods.
#[derive(Resource, Debug, Clone, Default)]
pub struct DockAnchor {
    pose: DockPose,
    saved: Option<DockFrame>,
    hidden: bool,
}

impl DockAnchor {
    pub fn pose(&self) -> DockPose {
        self.pose
    }

    pub fn saved(&self) -> Option<DockFrame> {
        self.saved
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Camera-relative dock frame for `viewer`, without touching state.
    pub fn project(viewer: ViewerPose) -> DockFrame {
        let forward = horizontal_forward(viewer.rotation);
        let position = viewer.position
            + forward * DOCK_FORWARD_DISTANCE
            + Vec3::Y * DOCK_VERTICAL_OFFSET;
        DockFrame {
            position,
            yaw: yaw_facing(viewer.position, position),
            viewpoint: viewer.position,
        }
    }

    pub fn place_at_viewer(&mut self, viewer: ViewerPose) {
        let frame = Self::project(viewer);
        self.pose.position = frame.position;
        self.pose.yaw = frame.yaw;
        self.pose.viewpoint = frame.viewpoint;
        self.pose.placed = true;
        self.saved = Some(frame);
    }

    pub fn current_world_position(&self, viewer: ViewerPose) -> Vec3 {
        self.current_frame(viewer).position
    }

    pub fn current_frame(&self, viewer: ViewerPose) -> DockFrame {
        if self.pose.placed {
            self.frame()
        } else {
            Self::project(viewer)
        }
    }

    /// The stored frame, regardless of placement.
    pub fn frame(&self) -> DockFrame {
        DockFrame {
            position: self.pose.position,
            yaw: self.pose.yaw,
            viewpoint: self.pose.viewpoint,
        }
    }

    /// Handles the not-presenting to presenting edge. Returns whether the
    /// dock was moved; a dock the user already dragged stays where it is.
    pub fn on_session_start(&mut self, viewer: ViewerPose) -> bool {
        if self.pose.user_moved {
            return false;
        }
        self.place_at_viewer(viewer);
        true
    }

    pub fn drag_to(&mut self, position: Vec3, yaw: f32) {
        self.pose.position = position;
        self.pose.yaw = yaw;
        self.pose.placed = true;
        self.pose.user_moved = true;
    }

    /// Records where the head was while the dock was dragged.
    pub fn set_viewpoint(&mut self, viewpoint: Vec3) {
        self.pose.viewpoint = viewpoint;
    }

    pub fn commit_drag(&mut self) {
        self.saved = Some(self.frame());
    }

    pub fn enter_cinema(&mut self) {
        self.hidden = true;
    }

    /// Brings the dock back exactly where it was last placed or dropped.
    pub fn leave_cinema(&mut self) {
        self.hidden = false;
        if let Some(saved) = self.saved {
            self.pose.position = saved.position;
            self.pose.yaw = saved.yaw;
            self.pose.viewpoint = saved.viewpoint;
        }
    }

    pub(super) fn place_on_session_start(
        mut anchor: ResMut<DockAnchor>,
        viewers: Query<&GlobalTransform, With<Viewer>>,
    ) {
        let Some(viewer) = ViewerPose::sample(&viewers) else {
            warn!("immersive session started without a viewer; dock left unplaced");
            return;
        };
        if anchor.on_session_start(viewer) {
            info!("dock placed at {:?}", anchor.pose().position);
        } else {
            debug!("dock keeps its user placement on session start");
        }
    }

    pub(super) fn hide_for_cinema(mut anchor: ResMut<DockAnchor>) {
        anchor.enter_cinema();
    }

    pub(super) fn restore_after_cinema(mut anchor: ResMut<DockAnchor>) {
        anchor.leave_cinema();
    }

    fn absorb_drag(&mut self, position: Vec3, rotation: Quat, viewer: Option<ViewerPose>) {
        let (yaw, _, _) = rotation.to_euler(EulerRot::YXZ);
        self.drag_to(position, yaw);
        if let Some(viewer) = viewer {
            self.set_viewpoint(viewer.position);
        }
    }

    pub(super) fn follow_drag(
        mut anchor: ResMut<DockAnchor>,
        viewers: Query<&GlobalTransform, With<Viewer>>,
        docks: Query<(&Transform, &Draggable), (With<DockHandle>, Changed<Transform>)>,
    ) {
        for (transform, draggable) in &docks {
            if draggable.is_dragging() {
                anchor.absorb_drag(
                    transform.translation,
                    transform.rotation,
                    ViewerPose::sample(&viewers),
                );
            }
        }
    }

    /// Applies the drop from the release itself. The last move may arrive in
    /// the same frame as the release, when `follow_drag` no longer sees a
    /// dragging dock.
    pub(super) fn commit_drag_on_release(
        mut ended: MessageReader<DragEnded>,
        viewers: Query<&GlobalTransform, With<Viewer>>,
        docks: Query<&Transform, With<DockHandle>>,
        mut anchor: ResMut<DockAnchor>,
    ) {
        for drag in ended.read() {
            if let Ok(transform) = docks.get(drag.entity) {
                anchor.absorb_drag(drag.position, transform.rotation, ViewerPose::sample(&viewers));
                anchor.commit_drag();
            }
        }
    }
}

#[derive(Component, Debug, Clone, Copy, Default)]
#[require(Transform, Visibility, Draggable)]
pub struct DockHandle;

impl DockHandle {
    pub(super) fn spawn(mut commands: Commands) {
        commands.spawn((
            Name::new("dock"),
            DockHandle,
            PointerSurface::new(DOCK_HANDLE_SIZE),
        ));
    }

    pub(super) fn sync_transform(
        anchor: Res<DockAnchor>,
        viewers: Query<&GlobalTransform, With<Viewer>>,
        mut docks: Query<(&mut Transform, &mut Visibility, &Draggable), With<DockHandle>>,
    ) {
        let frame = match ViewerPose::sample(&viewers) {
            Some(viewer) => anchor.current_frame(viewer),
            None => anchor.frame(),
        };
        for (mut transform, mut visibility, draggable) in &mut docks {
            visibility.set_if_neq(if anchor.is_hidden() {
                Visibility::Hidden
            } else {
                Visibility::Inherited
            });
            if draggable.is_dragging() {
                continue;
            }
            let target = Transform::from_translation(frame.position)
                .with_rotation(facing_rotation(frame.yaw));
            transform.set_if_neq(target);
        }
    }
}
