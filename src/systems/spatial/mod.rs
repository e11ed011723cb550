//! Head-relative placement of the dock and the panels around it.
//!
//! Frame order inside `Update`:
//! - `Input`: pointer drags and window commands mutate poses and the open set
//! - `Dock`: the dock anchor absorbs drags and session/cinema transitions
//! - `Layout`: panels are laid out from the dock pose, skipping anything
//!   mid-drag or pinned by hand
use bevy::prelude::*;

use crate::data::states::{ImmersiveSession, ViewMode};

pub mod dock;
pub mod layout;
pub mod math;

use dock::{DockAnchor, DockHandle};

pub struct SpatialPlugin;
impl Plugin for SpatialPlugin {
    fn build(&self, app: &mut App) {
        configure_spatial_sets(app);
        app.init_resource::<DockAnchor>()
            .add_systems(Startup, DockHandle::spawn)
            .add_systems(
                OnEnter(ImmersiveSession::Presenting),
                DockAnchor::place_on_session_start,
            )
            .add_systems(OnEnter(ViewMode::Cinema), DockAnchor::hide_for_cinema)
            .add_systems(OnExit(ViewMode::Cinema), DockAnchor::restore_after_cinema)
            .add_systems(
                Update,
                (
                    DockAnchor::follow_drag,
                    DockAnchor::commit_drag_on_release,
                    DockHandle::sync_transform,
                )
                    .chain()
                    .in_set(SpatialSystem::Dock),
            )
            .add_systems(
                Update,
                layout::apply_window_layout.in_set(SpatialSystem::Layout),
            );
    }
}

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum SpatialSystem {
    Input,
    Dock,
    Layout,
}

pub fn configure_spatial_sets(app: &mut App) {
    app.configure_sets(
        Update,
        (
            SpatialSystem::Input,
            SpatialSystem::Dock.after(SpatialSystem::Input),
            SpatialSystem::Layout.after(SpatialSystem::Dock),
        ),
    );
}

/// The head: the camera every panel turns to face.
#[derive(Component, Debug, Clone, Copy, Default)]
#[require(Transform)]
pub struct Viewer;

/// Head pose sampled from the viewer's global transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerPose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl ViewerPose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn from_global(transform: &GlobalTransform) -> Self {
        let (_, rotation, position) = transform.to_scale_rotation_translation();
        Self { position, rotation }
    }

    pub fn sample(viewers: &Query<&GlobalTransform, With<Viewer>>) -> Option<Self> {
        viewers.iter().next().map(Self::from_global)
    }
}
