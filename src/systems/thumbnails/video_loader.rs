use std::{future::Future, path::PathBuf, process::Stdio, sync::Arc, time::Duration};

use tokio::{process::Command, time::timeout};

use super::{
    cache::ThumbnailLoader, fetch::MediaSource, image_loader::upload_encoded,
    texture::TextureStore, ThumbnailError,
};

pub const POSTER_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(8);
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(10);

const SEEK_FRACTION: f64 = 0.03;
const SEEK_CAP_SECS: f64 = 1.5;
const SEEK_UNKNOWN_SECS: f64 = 0.1;

/// Decoded access to video frames.
pub trait FrameSource: Send + Sync + 'static {
    /// Duration in seconds, `None` when the container does not say.
    fn duration(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<f64>, ThumbnailError>> + Send;

    /// A single frame at `seconds`, encoded as an image file.
    fn frame_at(
        &self,
        url: &str,
        seconds: f64,
    ) -> impl Future<Output = Result<Vec<u8>, ThumbnailError>> + Send;
}

/// Same-named stills to try before decoding the video itself.
pub fn poster_candidates(url: &str) -> Vec<String> {
    let path_end = url.find(['?', '#']).unwrap_or(url.len());
    let path = &url[..path_end];
    let name_start = path.rfind('/').map_or(0, |slash| slash + 1);
    let stem = match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..name_start + dot],
        _ => path,
    };
    POSTER_EXTENSIONS
        .iter()
        .map(|extension| format!("{stem}.{extension}"))
        .collect()
}

/// Early but non-zero timestamp that skips black lead-in frames.
pub fn seek_target(duration: Option<f64>) -> f64 {
    match duration {
        Some(duration) if duration.is_finite() && duration > 0.0 => {
            (duration * SEEK_FRACTION).min(SEEK_CAP_SECS)
        }
        _ => SEEK_UNKNOWN_SECS,
    }
}

pub struct VideoThumbnails<S, F, T> {
    source: Arc<S>,
    frames: F,
    textures: T,
    max_edge: u32,
}

impl<S: MediaSource, F: FrameSource, T: TextureStore> VideoThumbnails<S, F, T> {
    pub fn new(source: Arc<S>, frames: F, textures: T, max_edge: u32) -> Self {
        Self {
            source,
            frames,
            textures,
            max_edge,
        }
    }

    async fn poster(&self, url: &str) -> Option<T::Texture> {
        for candidate in poster_candidates(url) {
            if !self.source.exists(&candidate).await {
                continue;
            }
            let loaded = match self.source.fetch(&candidate).await {
                Ok(bytes) => upload_encoded(&self.textures, bytes, self.max_edge).await,
                Err(error) => Err(error),
            };
            match loaded {
                Ok(texture) => return Some(texture),
                Err(error) => log::debug!("poster {candidate} unusable: {error}"),
            }
        }
        None
    }

    async fn grab_frame(&self, url: &str) -> Result<Vec<u8>, ThumbnailError> {
        // Unknown duration only changes where we seek.
        let duration = match timeout(METADATA_TIMEOUT, self.frames.duration(url)).await {
            Ok(Ok(duration)) => duration,
            Ok(Err(error)) => {
                log::debug!("no metadata for {url}: {error}");
                None
            }
            Err(_) => {
                log::debug!("metadata for {url} timed out");
                None
            }
        };
        let target = seek_target(duration);

        match timeout(FRAME_TIMEOUT, self.frames.frame_at(url, target)).await {
            Ok(Ok(bytes)) => return Ok(bytes),
            Ok(Err(error)) => log::debug!("frame at {target:.2}s of {url} failed: {error}"),
            Err(_) => log::debug!("frame at {target:.2}s of {url} timed out"),
        }
        timeout(FRAME_TIMEOUT, self.frames.frame_at(url, 0.0))
            .await
            .map_err(|_| ThumbnailError::Timeout("video frame"))?
    }
}

impl<S, F, T> ThumbnailLoader for VideoThumbnails<S, F, T>
where
    S: MediaSource,
    F: FrameSource,
    T: TextureStore,
{
    type Texture = T::Texture;

    async fn load(&self, url: &str) -> Result<T::Texture, ThumbnailError> {
        if let Some(poster) = self.poster(url).await {
            return Ok(poster);
        }
        let frame = self.grab_frame(url).await?;
        upload_encoded(&self.textures, frame, self.max_edge).await
    }

    fn release(&self, texture: &T::Texture) {
        self.textures.release(texture);
    }
}

/// Frame source backed by the `ffprobe` and `ffmpeg` executables. Child
/// processes die with their future, so a timed-out grab frees its decoder.
pub struct FfmpegFrames {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    base_url: String,
}

impl FfmpegFrames {
    pub fn new(ffmpeg: PathBuf, ffprobe: PathBuf, base_url: &str) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn input(&self, url: &str) -> String {
        if url.contains("://") {
            url.to_owned()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }

    async fn run(&self, command: &mut Command) -> Result<Vec<u8>, ThumbnailError> {
        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| ThumbnailError::Frame(error.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ThumbnailError::Frame(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

impl FrameSource for FfmpegFrames {
    async fn duration(&self, url: &str) -> Result<Option<f64>, ThumbnailError> {
        let input = self.input(url);
        let stdout = self
            .run(Command::new(&self.ffprobe).args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                input.as_str(),
            ]))
            .await?;
        Ok(String::from_utf8_lossy(&stdout).trim().parse::<f64>().ok())
    }

    async fn frame_at(&self, url: &str, seconds: f64) -> Result<Vec<u8>, ThumbnailError> {
        let input = self.input(url);
        let seek = format!("{seconds:.3}");
        let frame = self
            .run(Command::new(&self.ffmpeg).args([
                "-v",
                "error",
                "-ss",
                seek.as_str(),
                "-i",
                input.as_str(),
                "-frames:v",
                "1",
                "-f",
                "image2pipe",
                "-vcodec",
                "png",
                "-",
            ]))
            .await?;
        if frame.is_empty() {
            return Err(ThumbnailError::Frame(format!("no frame decoded from {url}")));
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, PoisonError};

    use super::*;
    use crate::systems::thumbnails::{
        image_loader::testing::{MemorySource, SizeTextures},
        raster::encode_png,
    };

    #[test]
    fn poster_candidates_replace_extension() {
        assert_eq!(
            poster_candidates("assets/clips/intro.mp4"),
            vec![
                "assets/clips/intro.png",
                "assets/clips/intro.jpg",
                "assets/clips/intro.jpeg",
                "assets/clips/intro.webp",
            ]
        );
        assert_eq!(poster_candidates("https://h.org/v/a.b.webm?t=3")[0], "https://h.org/v/a.b.png");
        assert_eq!(poster_candidates("dir.d/clip")[1], "dir.d/clip.jpg");
    }

    #[test]
    fn seek_target_is_early_and_capped() {
        assert!((seek_target(Some(20.0)) - 0.6).abs() < 1e-9);
        assert!((seek_target(Some(600.0)) - 1.5).abs() < 1e-9);
        assert!((seek_target(None) - 0.1).abs() < 1e-9);
        assert!((seek_target(Some(f64::NAN)) - 0.1).abs() < 1e-9);
        assert!((seek_target(Some(0.0)) - 0.1).abs() < 1e-9);
    }

    /// Serves frames as PNGs and records requested timestamps.
    struct ScriptedFrames {
        duration: Option<f64>,
        fail_seek: bool,
        fail_probe: bool,
        seeks: Mutex<Vec<f64>>,
    }

    impl ScriptedFrames {
        fn new(duration: Option<f64>, fail_seek: bool) -> Self {
            Self {
                duration,
                fail_seek,
                fail_probe: false,
                seeks: Mutex::default(),
            }
        }

        fn without_probe() -> Self {
            Self {
                fail_probe: true,
                ..Self::new(Some(30.0), false)
            }
        }

        fn seeks(&self) -> Vec<f64> {
            self.seeks.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }
    }

    impl FrameSource for Arc<ScriptedFrames> {
        async fn duration(&self, _url: &str) -> Result<Option<f64>, ThumbnailError> {
            if self.fail_probe {
                return Err(ThumbnailError::Frame("ffprobe missing".into()));
            }
            Ok(self.duration)
        }

        async fn frame_at(&self, _url: &str, seconds: f64) -> Result<Vec<u8>, ThumbnailError> {
            self.seeks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(seconds);
            if self.fail_seek && seconds > 0.0 {
                return Err(ThumbnailError::Frame("seek past end".into()));
            }
            Ok(encode_png(64, 36))
        }
    }

    #[tokio::test]
    async fn poster_is_preferred_over_decoding() {
        let source = Arc::new(MemorySource::with(&[("v/clip.jpg", encode_png(32, 32))]));
        let frames = Arc::new(ScriptedFrames::new(Some(10.0), false));
        let loader =
            VideoThumbnails::new(Arc::clone(&source), Arc::clone(&frames), SizeTextures, 512);

        assert!(matches!(loader.load("v/clip.mp4").await, Ok((32, 32, 6))));
        assert!(frames.seeks().is_empty());
        assert_eq!(source.requests(), vec!["HEAD v/clip.png", "HEAD v/clip.jpg", "GET v/clip.jpg"]);
    }

    #[tokio::test]
    async fn without_poster_grabs_frame_at_seek_target() {
        let source = Arc::new(MemorySource::default());
        let frames = Arc::new(ScriptedFrames::new(Some(20.0), false));
        let loader = VideoThumbnails::new(source, Arc::clone(&frames), SizeTextures, 32);

        assert!(matches!(loader.load("clip.mp4").await, Ok((32, 18, 6))));
        assert_eq!(frames.seeks().len(), 1);
        assert!((frames.seeks()[0] - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failed_seek_falls_back_to_first_frame() {
        let source = Arc::new(MemorySource::default());
        let frames = Arc::new(ScriptedFrames::new(None, true));
        let loader = VideoThumbnails::new(source, Arc::clone(&frames), SizeTextures, 512);

        assert!(loader.load("clip.mp4").await.is_ok());
        assert_eq!(frames.seeks(), vec![0.1, 0.0]);
    }

    #[tokio::test]
    async fn failed_metadata_still_grabs_a_frame() {
        let source = Arc::new(MemorySource::default());
        let frames = Arc::new(ScriptedFrames::without_probe());
        let loader = VideoThumbnails::new(source, Arc::clone(&frames), SizeTextures, 512);

        assert!(loader.load("clip.mp4").await.is_ok());
        assert_eq!(frames.seeks(), vec![0.1]);
    }
}
