//! Pointer input and drag primitives.
//!
//! Every pointer-like source (mouse ray, touch, tracked controller) is reduced
//! to `PointerInput` messages tagged with a `PointerDevice`. Drags capture the
//! device that pressed and ignore every other device until it releases, so
//! several objects can be moved at once by different hands.
use bevy::prelude::*;

use crate::systems::spatial::SpatialSystem;

mod drag;
mod mouse;

pub use drag::{DragSession, Draggable};

pub struct InteractionPlugin;

impl Plugin for InteractionPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<PointerInput>()
            .add_message::<DragEnded>()
            .add_systems(
                Update,
                mouse::mouse_ray_pointer.before(SpatialSystem::Input),
            )
            // Drags resolve once per frame before layout so a released panel
            // is already marked before the next layout pass looks at it.
            .add_systems(Update, Draggable::enact.in_set(SpatialSystem::Input));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerDevice {
    Mouse,
    Touch(u64),
    Controller(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Press,
    Move,
    Release,
    Cancel,
}

/// One pointer event in world space. `device` is `None` when the source could
/// not identify itself; such events never start, move or end a drag.
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub device: Option<PointerDevice>,
    pub phase: PointerPhase,
    pub point: Vec3,
    pub target: Option<Entity>,
}

impl PointerInput {
    pub fn press(device: PointerDevice, point: Vec3, target: Entity) -> Self {
        Self {
            device: Some(device),
            phase: PointerPhase::Press,
            point,
            target: Some(target),
        }
    }

    pub fn moved(device: PointerDevice, point: Vec3) -> Self {
        Self {
            device: Some(device),
            phase: PointerPhase::Move,
            point,
            target: None,
        }
    }

    pub fn release(device: PointerDevice, point: Vec3) -> Self {
        Self {
            device: Some(device),
            phase: PointerPhase::Release,
            point,
            target: None,
        }
    }
}

/// Written when a drag releases or cancels. `position` is the final world
/// position of the dragged entity.
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct DragEnded {
    pub entity: Entity,
    pub position: Vec3,
}

/// Flat, viewer-facing hit area centred on the entity, in metres.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct PointerSurface {
    pub size: Vec2,
}

impl PointerSurface {
    pub fn new(size: Vec2) -> Self {
        Self { size }
    }
}
