use bevy::{app::AppExit, prelude::*};

use crate::{
    data::{
        settings::Settings,
        states::{ImmersiveSession, ViewMode},
    },
    systems::{
        gallery::GalleryCommand,
        ui::window::{WindowCommand, WindowKey},
    },
};

pub fn close_on_esc(
    keyboard_input: Res<ButtonInput<KeyCode>>,
    mut app_exit: MessageWriter<AppExit>,
) {
    if keyboard_input.just_pressed(KeyCode::Escape) {
        app_exit.write(AppExit::Success);
    }
}

pub fn toggle_windows(
    keyboard_input: Res<ButtonInput<KeyCode>>,
    mut commands: MessageWriter<WindowCommand>,
) {
    for (key, window) in [
        (KeyCode::KeyV, WindowKey::Video),
        (KeyCode::KeyG, WindowKey::Gallery),
        (KeyCode::KeyH, WindowKey::VideoGallery),
    ] {
        if keyboard_input.just_pressed(key) {
            commands.write(WindowCommand::Toggle(window));
        }
    }
}

pub fn turn_gallery_pages(
    keyboard_input: Res<ButtonInput<KeyCode>>,
    mut commands: MessageWriter<GalleryCommand>,
) {
    if keyboard_input.just_pressed(KeyCode::BracketRight) {
        commands.write(GalleryCommand::NextPage);
    }
    if keyboard_input.just_pressed(KeyCode::BracketLeft) {
        commands.write(GalleryCommand::PreviousPage);
    }
}

pub fn toggle_cinema(
    keyboard_input: Res<ButtonInput<KeyCode>>,
    mode: Res<State<ViewMode>>,
    mut next: ResMut<NextState<ViewMode>>,
) {
    if keyboard_input.just_pressed(KeyCode::KeyC) {
        next.set(mode.get().toggled());
    }
}

const VOLUME_STEP: f32 = 0.1;

/// Video panel audio preferences: M mutes, minus and equals step the volume.
pub fn adjust_audio(keyboard_input: Res<ButtonInput<KeyCode>>, mut settings: ResMut<Settings>) {
    if keyboard_input.just_pressed(KeyCode::KeyM) {
        let muted = !settings.muted();
        settings.set_muted(muted);
        info!("audio {}", if muted { "muted" } else { "unmuted" });
    }
    let step = match (
        keyboard_input.just_pressed(KeyCode::Minus),
        keyboard_input.just_pressed(KeyCode::Equal),
    ) {
        (true, false) => -VOLUME_STEP,
        (false, true) => VOLUME_STEP,
        _ => return,
    };
    let volume = settings.volume() + step;
    settings.set_volume(volume);
    info!("volume {:.0}%", settings.volume() * 100.0);
}

/// Desktop stand-in for the headset entering and leaving presentation.
pub fn toggle_presenting(
    keyboard_input: Res<ButtonInput<KeyCode>>,
    session: Res<State<ImmersiveSession>>,
    mut next: ResMut<NextState<ImmersiveSession>>,
) {
    if keyboard_input.just_pressed(KeyCode::KeyP) {
        next.set(session.get().toggled());
    }
}
