use std::sync::Arc;

use super::{
    cache::ThumbnailLoader, fetch::MediaSource, raster, texture::TextureStore, ThumbnailError,
};

/// Fetches an image, then decodes and mip-maps it on a blocking thread.
pub struct ImageThumbnails<S, T> {
    source: Arc<S>,
    textures: T,
    max_edge: u32,
}

impl<S: MediaSource, T: TextureStore> ImageThumbnails<S, T> {
    pub fn new(source: Arc<S>, textures: T, max_edge: u32) -> Self {
        Self {
            source,
            textures,
            max_edge,
        }
    }
}

/// Shared decode step for every loader that ends with encoded image bytes.
pub(super) async fn upload_encoded<T: TextureStore>(
    textures: &T,
    bytes: Vec<u8>,
    max_edge: u32,
) -> Result<T::Texture, ThumbnailError> {
    let chain = tokio::task::spawn_blocking(move || raster::prepare(&bytes, max_edge))
        .await
        .map_err(|error| ThumbnailError::Join(error.to_string()))??;
    Ok(textures.upload(chain))
}

impl<S: MediaSource, T: TextureStore> ThumbnailLoader for ImageThumbnails<S, T> {
    type Texture = T::Texture;

    async fn load(&self, url: &str) -> Result<T::Texture, ThumbnailError> {
        let bytes = self.source.fetch(url).await?;
        upload_encoded(&self.textures, bytes, self.max_edge).await
    }

    fn release(&self, texture: &T::Texture) {
        self.textures.release(texture);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        collections::HashMap,
        sync::{Mutex, PoisonError},
    };

    use super::*;
    use crate::systems::thumbnails::raster::MipChain;

    /// In-memory files plus a log of which URLs were fetched or probed.
    #[derive(Default)]
    pub struct MemorySource {
        pub files: HashMap<String, Vec<u8>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MemorySource {
        pub fn with(files: &[(&str, Vec<u8>)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(name, bytes)| ((*name).to_owned(), bytes.clone()))
                    .collect(),
                requests: Mutex::default(),
            }
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        fn log(&self, entry: String) {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(entry);
        }
    }

    impl MediaSource for MemorySource {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, ThumbnailError> {
            self.log(format!("GET {url}"));
            self.files
                .get(url)
                .cloned()
                .ok_or_else(|| ThumbnailError::Fetch(format!("{url}: 404")))
        }

        async fn exists(&self, url: &str) -> bool {
            self.log(format!("HEAD {url}"));
            self.files.contains_key(url)
        }
    }

    /// Records uploads as their dimensions.
    #[derive(Default)]
    pub struct SizeTextures;

    impl TextureStore for SizeTextures {
        type Texture = (u32, u32, u32);

        fn upload(&self, chain: MipChain) -> (u32, u32, u32) {
            (chain.width, chain.height, chain.levels)
        }

        fn release(&self, _texture: &(u32, u32, u32)) {}
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::*, *};
    use crate::systems::thumbnails::raster::encode_png;

    #[tokio::test]
    async fn image_is_bounded_and_mip_mapped() {
        let source = Arc::new(MemorySource::with(&[("a.png", encode_png(1024, 256))]));
        let loader = ImageThumbnails::new(source, SizeTextures, 512);
        let texture = loader.load("a.png").await;
        assert!(matches!(texture, Ok((512, 128, 10))));
    }

    #[tokio::test]
    async fn missing_and_corrupt_images_fail() {
        let source = Arc::new(MemorySource::with(&[("bad.png", b"nope".to_vec())]));
        let loader = ImageThumbnails::new(source, SizeTextures, 512);
        assert!(matches!(loader.load("gone.png").await, Err(ThumbnailError::Fetch(_))));
        assert!(matches!(loader.load("bad.png").await, Err(ThumbnailError::Decode(_))));
    }
}
