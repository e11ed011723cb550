use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use bevy::prelude::*;

use crate::data::config::ViewerConfig;

pub const SELECTED_IMAGE: &str = "selected_image";
pub const SELECTED_VIDEO: &str = "selected_video";
pub const VOLUME: &str = "volume";
pub const MUTED: &str = "muted";
pub const CINEMA: &str = "cinema";

const DEFAULT_VOLUME: f32 = 0.8;

pub struct SettingsPlugin;
impl Plugin for SettingsPlugin {
    fn build(&self, app: &mut App) {
        let path = app
            .world()
            .get_resource::<ViewerConfig>()
            .map(|config| config.settings_path.clone())
            .unwrap_or_else(|| ViewerConfig::default().settings_path);
        app.insert_resource(Settings::load_or_default(path))
            .add_systems(Last, Settings::persist);
    }
}

#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "settings file unavailable: {error}"),
            Self::Parse(error) => write!(f, "settings file is malformed: {error}"),
        }
    }
}

impl std::error::Error for SettingsError {}

/// String key/value store. Typed getters fall back to defaults on anything
/// missing or unparsable; setters mark the store for writing.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, String>,
    path: Option<PathBuf>,
    dirty: bool,
}

impl Settings {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let file = File::open(&path).map_err(SettingsError::Io)?;
        let values = serde_json::from_reader(BufReader::new(file)).map_err(SettingsError::Parse)?;
        Ok(Self {
            values,
            path: Some(path.as_ref().to_path_buf()),
            dirty: false,
        })
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(settings) => settings,
            Err(error) => {
                let missing = matches!(
                    &error,
                    SettingsError::Io(source) if source.kind() == io::ErrorKind::NotFound
                );
                if !missing {
                    warn!("{error}; using defaults");
                }
                Self {
                    path: Some(path.as_ref().to_path_buf()),
                    ..Self::default()
                }
            }
        }
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(SettingsError::Io)?;
        }
        let json = serde_json::to_string_pretty(&self.values).map_err(SettingsError::Parse)?;
        fs::write(path, json).map_err(SettingsError::Io)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        if self.get(key) != Some(value.as_str()) {
            self.values.insert(key.to_owned(), value);
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key)?.trim().parse().ok()
    }

    pub fn selected_image(&self) -> usize {
        self.parsed(SELECTED_IMAGE).unwrap_or(0)
    }

    pub fn selected_video(&self) -> usize {
        self.parsed(SELECTED_VIDEO).unwrap_or(0)
    }

    /// Always within `0.0..=1.0`.
    pub fn volume(&self) -> f32 {
        self.parsed::<f32>(VOLUME)
            .filter(|volume| volume.is_finite())
            .map_or(DEFAULT_VOLUME, |volume| volume.clamp(0.0, 1.0))
    }

    pub fn muted(&self) -> bool {
        self.parsed(MUTED).unwrap_or(false)
    }

    pub fn cinema(&self) -> bool {
        self.parsed(CINEMA).unwrap_or(false)
    }

    pub fn set_selected_image(&mut self, index: usize) {
        self.set(SELECTED_IMAGE, index);
    }

    pub fn set_selected_video(&mut self, index: usize) {
        self.set(SELECTED_VIDEO, index);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.set(VOLUME, volume.clamp(0.0, 1.0));
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.set(MUTED, muted);
    }

    pub fn set_cinema(&mut self, cinema: bool) {
        self.set(CINEMA, cinema);
    }

    fn persist(mut settings: ResMut<Settings>) {
        if !settings.dirty {
            return;
        }
        match settings.save() {
            Ok(()) => debug!("settings saved"),
            Err(error) => warn!("{error}"),
        }
        // A failed write is not retried every frame; the next change tries again.
        settings.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_missing_or_garbage() {
        let mut settings = Settings::in_memory();
        assert_eq!(settings.selected_image(), 0);
        assert_eq!(settings.selected_video(), 0);
        assert_eq!(settings.volume(), 0.8);
        assert!(!settings.muted());
        assert!(!settings.cinema());

        settings.set(SELECTED_IMAGE, "three");
        settings.set(VOLUME, "NaN");
        settings.set(MUTED, "yes");
        assert_eq!(settings.selected_image(), 0);
        assert_eq!(settings.volume(), 0.8);
        assert!(!settings.muted());

        settings.set(VOLUME, "4");
        assert_eq!(settings.volume(), 1.0);
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.json");

        let mut settings = Settings::load_or_default(&path);
        assert!(!settings.is_dirty());
        settings.set_selected_video(4);
        settings.set_volume(0.25);
        settings.set_cinema(true);
        assert!(settings.is_dirty());
        settings.save().unwrap();

        let reloaded = Settings::load(&path).unwrap();
        assert_eq!(reloaded.selected_video(), 4);
        assert_eq!(reloaded.volume(), 0.25);
        assert!(reloaded.cinema());
        assert!(!reloaded.muted());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(Settings::load(&path), Err(SettingsError::Parse(_))));
        let settings = Settings::load_or_default(&path);
        assert_eq!(settings.volume(), 0.8);
    }

    #[test]
    fn unchanged_value_does_not_dirty() {
        let mut settings = Settings::in_memory();
        settings.set_muted(false);
        assert!(settings.is_dirty());
        let mut clean = settings.clone();
        clean.dirty = false;
        clean.set_muted(false);
        assert!(!clean.is_dirty());
    }

    #[test]
    fn persist_system_writes_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.insert_resource(Settings::load_or_default(&path));
        app.add_systems(Last, Settings::persist);

        app.update();
        assert!(!path.exists());

        app.world_mut().resource_mut::<Settings>().set_selected_image(2);
        app.update();
        assert_eq!(Settings::load(&path).unwrap().selected_image(), 2);
        assert!(!app.world().resource::<Settings>().is_dirty());
    }
}
