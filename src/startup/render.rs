use bevy::{color::palettes::css::BLACK, prelude::*};

use crate::systems::{interaction::PointerSurface, spatial::Viewer};

pub const VIEWER_HEIGHT: f32 = 1.6;

pub struct RenderPlugin;
impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_camera)
            .add_systems(PostUpdate, attach_surface_quads);
    }
}

pub fn setup_camera(mut commands: Commands, mut clear_color: ResMut<ClearColor>) {
    clear_color.0 = BLACK.into();
    commands.spawn((
        Camera3d::default(),
        Viewer,
        Transform::from_xyz(0.0, VIEWER_HEIGHT, 0.0),
    ));
}

/// Gives every hit surface without its own mesh a translucent backing quad.
pub fn attach_surface_quads(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    surfaces: Query<(Entity, &PointerSurface), (Added<PointerSurface>, Without<Mesh3d>)>,
) {
    for (entity, surface) in &surfaces {
        commands.entity(entity).insert((
            Mesh3d(meshes.add(Rectangle::from_size(surface.size))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgba(0.08, 0.09, 0.11, 0.85),
                alpha_mode: AlphaMode::Blend,
                unlit: true,
                ..default()
            })),
        ));
    }
}
