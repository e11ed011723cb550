//! Gallery thumbnails: bounded caches in front of the image and video loaders.
//!
//! The caches live on the tokio runtime. Bevy systems ask for a thumbnail
//! with `ThumbnailCaches::request` and poll the returned oneshot each frame.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use bevy::prelude::*;
use tokio::sync::oneshot;

use crate::{data::config::ViewerConfig, startup::runtime::AsyncRuntime};

pub mod cache;
pub mod fetch;
pub mod image_loader;
pub mod lru;
pub mod raster;
pub mod texture;
pub mod video_loader;

pub use cache::{CacheEntry, ThumbnailCache, ThumbnailLoader};
pub use fetch::{HttpSource, MediaSource};
pub use texture::{BevyTextures, TextureReleaseQueue};

use image_loader::ImageThumbnails;
use video_loader::{FfmpegFrames, VideoThumbnails};

/* ─────────────────────────  ERRORS  ───────────────────────── */

#[derive(Debug)]
pub enum ThumbnailError {
    Fetch(String),
    Decode(String),
    Timeout(&'static str),
    Frame(String),
    Join(String),
}

impl std::fmt::Display for ThumbnailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(message) => write!(f, "fetch failed: {message}"),
            Self::Decode(message) => write!(f, "decode failed: {message}"),
            Self::Timeout(stage) => write!(f, "timed out waiting for {stage}"),
            Self::Frame(message) => write!(f, "frame extraction failed: {message}"),
            Self::Join(message) => write!(f, "worker task failed: {message}"),
        }
    }
}

impl std::error::Error for ThumbnailError {}

/* ─────────────────────────  PLUGIN  ───────────────────────── */

pub struct ThumbnailPlugin;
impl Plugin for ThumbnailPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TextureReleaseQueue>()
            .add_systems(PreStartup, install_thumbnail_caches)
            .add_systems(PostUpdate, texture::drain_released_textures);
    }
}

pub type ImageCache = ThumbnailCache<ImageThumbnails<HttpSource, BevyTextures>>;
pub type VideoCache = ThumbnailCache<VideoThumbnails<HttpSource, FfmpegFrames, BevyTextures>>;

/// HTTP client shared by the loaders and manifest fetches.
#[derive(Resource, Clone)]
pub struct MediaClient(pub Arc<HttpSource>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbnailKind {
    Image,
    Video,
}

#[derive(Resource, Clone)]
pub struct ThumbnailCaches {
    pub images: ImageCache,
    pub videos: VideoCache,
}

impl ThumbnailCaches {
    /// Starts or joins a load for `url`. The receiver resolves once the cache
    /// settles unless `cancelled` was raised first, in which case the sender
    /// is dropped without a value. Cancelling never stops the load itself.
    pub fn request(
        &self,
        kind: ThumbnailKind,
        url: String,
        runtime: &AsyncRuntime,
        cancelled: Arc<AtomicBool>,
    ) -> oneshot::Receiver<Option<Handle<Image>>> {
        let (sender, receiver) = oneshot::channel();
        let caches = self.clone();
        runtime.spawn(async move {
            let texture = match kind {
                ThumbnailKind::Image => caches.images.get(&url).await,
                ThumbnailKind::Video => caches.videos.get(&url).await,
            };
            if cancelled.load(Ordering::Acquire) {
                log::debug!("dropping late thumbnail for {url}");
                return;
            }
            // The tile may have gone away between the check and the send.
            let _ = sender.send(texture);
        });
        receiver
    }
}

fn install_thumbnail_caches(
    mut commands: Commands,
    config: Res<ViewerConfig>,
    assets: Res<AssetServer>,
    released: Res<TextureReleaseQueue>,
) {
    let source = match HttpSource::new(&config.base_url) {
        Ok(source) => Arc::new(source),
        Err(error) => {
            warn!("media client unavailable, thumbnails disabled: {error}");
            return;
        }
    };
    let textures = BevyTextures::new(assets.clone(), released.clone());
    let images = ThumbnailCache::new(
        "image",
        ImageThumbnails::new(Arc::clone(&source), textures.clone(), config.thumbnail_max_edge),
        config.image_cache_limit,
    );
    let frames = FfmpegFrames::new(
        config.ffmpeg_path.clone(),
        config.ffprobe_path.clone(),
        &config.base_url,
    );
    let videos = ThumbnailCache::new(
        "video",
        VideoThumbnails::new(Arc::clone(&source), frames, textures, config.thumbnail_max_edge),
        config.video_cache_limit,
    );
    info!(
        "thumbnail caches ready (images {}, videos {})",
        images.limit(),
        videos.limit()
    );
    commands.insert_resource(MediaClient(source));
    commands.insert_resource(ThumbnailCaches { images, videos });
}
