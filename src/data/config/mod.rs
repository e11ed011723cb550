use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH: &str = "config/viewer.json";

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "could not read viewer config: {error}"),
            Self::Parse(error) => write!(f, "viewer config is not valid JSON: {error}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Deployment settings. Every field is optional in the file.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub base_url: String,
    /// Directory under `base_url` holding media and manifests.
    pub assets_prefix: String,
    pub image_manifest: String,
    pub video_manifest: String,
    pub image_cache_limit: usize,
    pub video_cache_limit: usize,
    /// Long edge of a thumbnail before mip-mapping, in pixels.
    pub thumbnail_max_edge: u32,
    pub gallery_page_size: usize,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub settings_path: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            assets_prefix: "assets".into(),
            image_manifest: "images.json".into(),
            video_manifest: "videos.json".into(),
            image_cache_limit: 24,
            video_cache_limit: 18,
            thumbnail_max_edge: 512,
            gallery_page_size: 12,
            ffmpeg_path: "ffmpeg".into(),
            ffprobe_path: "ffprobe".into(),
            settings_path: "config/settings.json".into(),
        }
    }
}

impl ViewerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(ConfigError::Io)?;
        let config: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(ConfigError::Parse)?;
        Ok(config.clamped())
    }

    /// A gallery page never holds more tiles than its cache keeps, so a
    /// visible tile's texture cannot be evicted by its own page.
    pub fn clamped(mut self) -> Self {
        let limit = self.image_cache_limit.min(self.video_cache_limit).max(1);
        if self.gallery_page_size > limit {
            warn!(
                "gallery_page_size {} exceeds the thumbnail cache limit, using {limit}",
                self.gallery_page_size
            );
        }
        self.gallery_page_size = self.gallery_page_size.clamp(1, limit);
        self
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(ConfigError::Io(error)) if error.kind() == io::ErrorKind::NotFound => {
                info!("no config at {}, using defaults", path.as_ref().display());
                Self::default()
            }
            Err(error) => {
                warn!("{error}; using defaults");
                Self::default()
            }
        }
    }

    /// `name` placed under the assets prefix, relative to `base_url`.
    pub fn asset_path(&self, name: &str) -> String {
        let prefix = self.assets_prefix.trim_matches('/');
        let name = name.trim_start_matches("./").trim_start_matches('/');
        if prefix.is_empty() {
            return name.to_owned();
        }
        if name.starts_with(prefix) && name[prefix.len()..].starts_with('/') {
            return name.to_owned();
        }
        format!("{prefix}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "base_url": "https://media.example.org", "image_cache_limit": 8 }}"#
        )
        .unwrap();

        let config = ViewerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.base_url, "https://media.example.org");
        assert_eq!(config.image_cache_limit, 8);
        assert_eq!(config.video_cache_limit, 18);
        assert_eq!(config.thumbnail_max_edge, 512);
    }

    #[test]
    fn page_size_is_clamped_to_cache_limits() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "gallery_page_size": 40, "image_cache_limit": 30, "video_cache_limit": 10 }}"#
        )
        .unwrap();
        let config = ViewerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.gallery_page_size, 10);

        let empty = ViewerConfig {
            gallery_page_size: 0,
            ..ViewerConfig::default()
        };
        assert_eq!(empty.clamped().gallery_page_size, 1);
        assert_eq!(ViewerConfig::default().clamped(), ViewerConfig::default());
    }

    #[test]
    fn unreadable_config_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[not, json").unwrap();
        assert!(matches!(ViewerConfig::from_file(file.path()), Err(ConfigError::Parse(_))));
        assert_eq!(ViewerConfig::load_or_default(file.path()), ViewerConfig::default());
        assert_eq!(
            ViewerConfig::load_or_default("does/not/exist.json"),
            ViewerConfig::default()
        );
    }

    #[test]
    fn asset_paths_are_prefixed_once() {
        let config = ViewerConfig::default();
        assert_eq!(config.asset_path("pano.jpg"), "assets/pano.jpg");
        assert_eq!(config.asset_path("./pano.jpg"), "assets/pano.jpg");
        assert_eq!(config.asset_path("/assets/pano.jpg"), "assets/pano.jpg");
        assert_eq!(config.asset_path("assetsx/pano.jpg"), "assets/assetsx/pano.jpg");
    }
}
