use bevy::prelude::*;

use crate::{
    data::{settings::Settings, states::ViewMode},
    systems::{
        interaction::{Draggable, PointerSurface},
        spatial::{
            math::{facing_rotation, horizontal_forward, yaw_facing},
            Viewer, ViewerPose,
        },
    },
};

pub const CINEMA_DISTANCE: f32 = 3.2;
pub const CINEMA_SIZE: Vec2 = Vec2::new(3.2, 1.8);

pub struct CinemaPlugin;
impl Plugin for CinemaPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, restore_cinema_mode)
            .add_systems(OnEnter(ViewMode::Cinema), CinemaScreen::spawn)
            .add_systems(OnExit(ViewMode::Cinema), CinemaScreen::despawn);
    }
}

/// Large draggable screen shown instead of the dock and panels.
#[derive(Component, Debug, Clone, Copy, Default)]
#[require(Transform, Visibility, Draggable)]
pub struct CinemaScreen;

impl CinemaScreen {
    /// In front of the viewer at eye height, facing them.
    pub fn placement(viewer: ViewerPose) -> Transform {
        let position = viewer.position + horizontal_forward(viewer.rotation) * CINEMA_DISTANCE;
        Transform::from_translation(position)
            .with_rotation(facing_rotation(yaw_facing(viewer.position, position)))
    }

    fn spawn(
        mut commands: Commands,
        mut settings: ResMut<Settings>,
        viewers: Query<&GlobalTransform, With<Viewer>>,
    ) {
        let transform = ViewerPose::sample(&viewers)
            .map(Self::placement)
            .unwrap_or_else(|| Transform::from_xyz(0.0, 1.6, -CINEMA_DISTANCE));
        commands.spawn((
            Name::new("cinema_screen"),
            CinemaScreen,
            PointerSurface::new(CINEMA_SIZE),
            transform,
        ));
        settings.set_cinema(true);
    }

    fn despawn(
        mut commands: Commands,
        mut settings: ResMut<Settings>,
        screens: Query<Entity, With<CinemaScreen>>,
    ) {
        for screen in &screens {
            commands.entity(screen).despawn();
        }
        settings.set_cinema(false);
    }
}

fn restore_cinema_mode(settings: Res<Settings>, mut next: ResMut<NextState<ViewMode>>) {
    if settings.cinema() {
        info!("restoring cinema mode");
        next.set(ViewMode::Cinema);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cinema_test_app(settings: Settings) -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, bevy::state::app::StatesPlugin));
        app.init_state::<ViewMode>();
        app.insert_resource(settings);
        app.add_plugins(CinemaPlugin);
        app
    }

    fn screen_count(app: &mut App) -> usize {
        let mut query = app.world_mut().query::<&CinemaScreen>();
        query.iter(app.world()).count()
    }

    #[test]
    fn placement_faces_viewer_at_distance() {
        let viewer = ViewerPose::new(Vec3::new(1.0, 1.6, 0.0), Quat::from_rotation_y(0.5));
        let transform = CinemaScreen::placement(viewer);
        let offset = transform.translation - viewer.position;
        assert!((offset.length() - CINEMA_DISTANCE).abs() < 1e-4);
        assert!(offset.y.abs() < 1e-6);
        let front = transform.rotation * Vec3::Z;
        assert!(front.dot(-offset.normalize()) > 0.999);
    }

    #[test]
    fn entering_and_leaving_cinema_persists_flag() {
        let mut app = make_cinema_test_app(Settings::in_memory());
        app.update();
        assert_eq!(screen_count(&mut app), 0);

        app.world_mut()
            .resource_mut::<NextState<ViewMode>>()
            .set(ViewMode::Cinema);
        app.update();
        assert_eq!(screen_count(&mut app), 1);
        assert!(app.world().resource::<Settings>().cinema());

        app.world_mut()
            .resource_mut::<NextState<ViewMode>>()
            .set(ViewMode::Browse);
        app.update();
        assert_eq!(screen_count(&mut app), 0);
        assert!(!app.world().resource::<Settings>().cinema());
    }

    #[test]
    fn saved_cinema_flag_restores_mode() {
        let mut settings = Settings::in_memory();
        settings.set_cinema(true);
        let mut app = make_cinema_test_app(settings);
        app.update();
        app.update();
        assert_eq!(
            *app.world().resource::<State<ViewMode>>().get(),
            ViewMode::Cinema
        );
        assert_eq!(screen_count(&mut app), 1);
    }
}
