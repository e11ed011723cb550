use bevy::prelude::*;

#[cfg(debug_assertions)]
use bevy::diagnostic::{FrameTimeDiagnosticsPlugin, LogDiagnosticsPlugin};

use crate::{
    data::{
        config::{ViewerConfig, CONFIG_PATH},
        settings::SettingsPlugin,
        states::ViewerStatesPlugin,
    },
    systems::{
        cinema::CinemaPlugin, gallery::GalleryPlugin, interaction::InteractionPlugin,
        spatial::{SpatialPlugin, SpatialSystem},
        thumbnails::ThumbnailPlugin,
        ui::window::PanelWindowPlugin,
    },
};

pub mod render;
pub mod runtime;
pub mod shortcuts;

use render::RenderPlugin;
use runtime::AsyncRuntime;

pub struct StartupPlugin;
impl Plugin for StartupPlugin {
    fn build(&self, app: &mut App) {
        // Config comes first: settings and the caches read it while building.
        let config = ViewerConfig::load_or_default(CONFIG_PATH);
        info!("media base url {}", config.base_url);
        app.insert_resource(config);

        match AsyncRuntime::new() {
            Ok(runtime) => {
                app.insert_resource(runtime);
            }
            Err(error) => error!("async runtime unavailable, media stays offline: {error}"),
        }

        app.add_plugins((
            ViewerStatesPlugin,
            SettingsPlugin,
            RenderPlugin,
            InteractionPlugin,
            SpatialPlugin,
            PanelWindowPlugin,
            ThumbnailPlugin,
            GalleryPlugin,
            CinemaPlugin,
        ))
        .add_systems(
            Update,
            (
                shortcuts::close_on_esc,
                shortcuts::toggle_windows,
                shortcuts::turn_gallery_pages,
                shortcuts::toggle_cinema,
                shortcuts::toggle_presenting,
                shortcuts::adjust_audio,
            )
                .before(SpatialSystem::Input),
        );

        #[cfg(debug_assertions)]
        app.add_plugins(FrameTimeDiagnosticsPlugin::default())
            .add_plugins(LogDiagnosticsPlugin::default());
    }
}
