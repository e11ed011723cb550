use bevy::prelude::*;

use super::{DragEnded, PointerDevice, PointerInput, PointerPhase};
use crate::systems::spatial::{
    math::{facing_rotation, world_to_parent_local, world_yaw_to_parent_local, yaw_facing},
    Viewer,
};

/// Capture state of a single draggable object.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragSession {
    #[default]
    Idle,
    Dragging {
        device: PointerDevice,
        /// `object_world - press_point`, fixed for the whole drag.
        offset: Vec3,
    },
}

impl DragSession {
    /// Starts a drag owned by `device`. Fails while another drag is active or
    /// when the event carries no device.
    pub fn acquire(
        &mut self,
        device: Option<PointerDevice>,
        press_point: Vec3,
        object_world: Vec3,
    ) -> bool {
        let (Some(device), DragSession::Idle) = (device, *self) else {
            return false;
        };
        *self = DragSession::Dragging {
            device,
            offset: object_world - press_point,
        };
        true
    }

    /// World position the object should take for a move of `device` to `point`.
    pub fn track(&self, device: Option<PointerDevice>, point: Vec3) -> Option<Vec3> {
        match *self {
            DragSession::Dragging { device: owner, offset } if Some(owner) == device => {
                Some(point + offset)
            }
            _ => None,
        }
    }

    pub fn release(&mut self, device: Option<PointerDevice>) -> bool {
        if !self.is_held_by(device) {
            return false;
        }
        *self = DragSession::Idle;
        true
    }

    pub fn is_held_by(&self, device: Option<PointerDevice>) -> bool {
        device.is_some() && self.device() == device
    }

    pub fn device(&self) -> Option<PointerDevice> {
        match *self {
            DragSession::Dragging { device, .. } => Some(device),
            DragSession::Idle => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, DragSession::Dragging { .. })
    }
}

#[derive(Component, Debug, Clone, Copy, Default)]
#[require(Transform)]
pub struct Draggable {
    session: DragSession,
}

impl Draggable {
    pub fn is_dragging(&self) -> bool {
        self.session.is_active()
    }

    pub fn session(&self) -> DragSession {
        self.session
    }

    pub fn enact(
        mut inputs: MessageReader<PointerInput>,
        mut ended: MessageWriter<DragEnded>,
        viewer: Query<&GlobalTransform, With<Viewer>>,
        parents: Query<&GlobalTransform>,
        mut draggables: Query<(Entity, &mut Draggable, &mut Transform, Option<&ChildOf>)>,
    ) {
        let viewer_position = viewer.iter().next().map(GlobalTransform::translation);

        for input in inputs.read() {
            match input.phase {
                PointerPhase::Press => {
                    let Some(target) = input.target else {
                        continue;
                    };
                    let Ok((_, mut draggable, mut transform, child_of)) =
                        draggables.get_mut(target)
                    else {
                        continue;
                    };
                    let parent = child_of.and_then(|child_of| parents.get(child_of.parent()).ok());
                    let world = object_world_position(&transform, parent);
                    if !draggable.session.acquire(input.device, input.point, world) {
                        continue;
                    }
                    if let Some(viewer_position) = viewer_position {
                        transform.rotation = facing_in_parent(parent, viewer_position, world);
                    }
                }
                PointerPhase::Move => {
                    for (_, draggable, mut transform, child_of) in &mut draggables {
                        let Some(world) = draggable.session.track(input.device, input.point)
                        else {
                            continue;
                        };
                        let parent =
                            child_of.and_then(|child_of| parents.get(child_of.parent()).ok());
                        transform.translation = match parent {
                            Some(parent) => world_to_parent_local(parent, world),
                            None => world,
                        };
                        if let Some(viewer_position) = viewer_position {
                            transform.rotation = facing_in_parent(parent, viewer_position, world);
                        }
                    }
                }
                PointerPhase::Release | PointerPhase::Cancel => {
                    for (entity, mut draggable, transform, child_of) in &mut draggables {
                        if !draggable.session.is_held_by(input.device) {
                            continue;
                        }
                        draggable.session.release(input.device);
                        let parent =
                            child_of.and_then(|child_of| parents.get(child_of.parent()).ok());
                        ended.write(DragEnded {
                            entity,
                            position: object_world_position(&transform, parent),
                        });
                    }
                }
            }
        }
    }
}

fn object_world_position(transform: &Transform, parent: Option<&GlobalTransform>) -> Vec3 {
    match parent {
        Some(parent) => parent.transform_point(transform.translation),
        None => transform.translation,
    }
}

fn facing_in_parent(parent: Option<&GlobalTransform>, viewer: Vec3, world: Vec3) -> Quat {
    let yaw = yaw_facing(viewer, world);
    match parent {
        Some(parent) => world_yaw_to_parent_local(parent, yaw),
        None => facing_rotation(yaw),
    }
}
