//! Media listings. A manifest is a JSON array of file names living next to
//! the media under the assets prefix.
use phf::phf_set;

use crate::{
    data::config::ViewerConfig,
    systems::thumbnails::{MediaSource, ThumbnailError},
};

static IMAGE_EXTENSIONS: phf::Set<&'static str> = phf_set! {
    "jpg", "jpeg", "png", "webp", "avif",
};

static VIDEO_EXTENSIONS: phf::Set<&'static str> = phf_set! {
    "mp4", "webm", "mov", "m4v",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    Images,
    Videos,
}

impl ManifestKind {
    fn extensions(self) -> &'static phf::Set<&'static str> {
        match self {
            Self::Images => &IMAGE_EXTENSIONS,
            Self::Videos => &VIDEO_EXTENSIONS,
        }
    }

    /// Shipped with the app; used whenever the manifest is unusable.
    pub fn fallback_name(self) -> &'static str {
        match self {
            Self::Images => "panorama.jpg",
            Self::Videos => "video.mp4",
        }
    }

    pub fn manifest_name(self, config: &ViewerConfig) -> &str {
        match self {
            Self::Images => &config.image_manifest,
            Self::Videos => &config.video_manifest,
        }
    }

    /// Case-insensitive extension check.
    pub fn accepts(self, name: &str) -> bool {
        name.rsplit_once('.').is_some_and(|(stem, extension)| {
            let extension = extension.to_ascii_lowercase();
            !stem.is_empty() && self.extensions().contains(extension.as_str())
        })
    }
}

#[derive(Debug)]
pub enum ManifestError {
    Fetch(ThumbnailError),
    Parse(serde_json::Error),
    Empty,
}

impl std::fmt::Display for ManifestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(error) => write!(f, "{error}"),
            Self::Parse(error) => write!(f, "manifest is not a JSON array: {error}"),
            Self::Empty => write!(f, "manifest lists no usable files"),
        }
    }
}

impl std::error::Error for ManifestError {}

/// Usable entries of a manifest, normalized to asset paths. Non-string
/// entries and unknown extensions are skipped.
pub fn parse_manifest(
    kind: ManifestKind,
    json: &[u8],
    config: &ViewerConfig,
) -> Result<Vec<String>, ManifestError> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_slice(json).map_err(ManifestError::Parse)?;
    let names: Vec<String> = entries
        .iter()
        .filter_map(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|name| kind.accepts(name))
        .map(|name| config.asset_path(name))
        .collect();
    if names.is_empty() {
        return Err(ManifestError::Empty);
    }
    Ok(names)
}

pub async fn fetch_manifest<S: MediaSource>(
    source: &S,
    kind: ManifestKind,
    config: &ViewerConfig,
) -> Result<Vec<String>, ManifestError> {
    let url = config.asset_path(kind.manifest_name(config));
    let bytes = source.fetch(&url).await.map_err(ManifestError::Fetch)?;
    parse_manifest(kind, &bytes, config)
}

/// Never empty: any failure yields the single built-in file.
pub async fn load_manifest<S: MediaSource>(
    source: &S,
    kind: ManifestKind,
    config: &ViewerConfig,
) -> Vec<String> {
    match fetch_manifest(source, kind, config).await {
        Ok(names) => {
            log::info!("{kind:?} manifest lists {} file(s)", names.len());
            names
        }
        Err(error) => {
            log::warn!("{kind:?} manifest unusable ({error}); falling back");
            vec![config.asset_path(kind.fallback_name())]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::thumbnails::image_loader::testing::MemorySource;

    #[test]
    fn filters_by_extension_case_insensitively() {
        let config = ViewerConfig::default();
        let json = br#"["a.JPG", "b.webp", "notes.txt", 7, "clip.mp4", ".png", "c.Jpeg"]"#;
        let names = parse_manifest(ManifestKind::Images, json, &config).unwrap();
        assert_eq!(names, vec!["assets/a.JPG", "assets/b.webp", "assets/c.Jpeg"]);

        let videos = parse_manifest(ManifestKind::Videos, json, &config).unwrap();
        assert_eq!(videos, vec!["assets/clip.mp4"]);
    }

    #[test]
    fn empty_or_malformed_manifest_is_an_error() {
        let config = ViewerConfig::default();
        assert!(matches!(
            parse_manifest(ManifestKind::Videos, br#"["a.jpg"]"#, &config),
            Err(ManifestError::Empty)
        ));
        assert!(matches!(
            parse_manifest(ManifestKind::Images, br#"{"a": 1}"#, &config),
            Err(ManifestError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn load_fetches_from_assets_prefix() {
        let config = ViewerConfig::default();
        let listing = br#"["x.png","/assets/y.jpg"]"#.to_vec();
        let source = MemorySource::with(&[("assets/images.json", listing)]);
        let names = load_manifest(&source, ManifestKind::Images, &config).await;
        assert_eq!(names, vec!["assets/x.png", "assets/y.jpg"]);
    }

    #[tokio::test]
    async fn load_falls_back_to_builtin_file() {
        let config = ViewerConfig::default();
        let source = MemorySource::with(&[("assets/videos.json", b"[]".to_vec())]);
        assert_eq!(
            load_manifest(&source, ManifestKind::Videos, &config).await,
            vec!["assets/video.mp4"]
        );
        assert_eq!(
            load_manifest(&source, ManifestKind::Images, &config).await,
            vec!["assets/panorama.jpg"]
        );
    }
}
