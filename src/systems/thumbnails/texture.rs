use std::sync::{Arc, Mutex, PoisonError};

use bevy::{
    asset::RenderAssetUsages,
    image::ImageSampler,
    prelude::*,
    render::render_resource::{Extent3d, TextureDimension, TextureFormat},
};

use super::raster::MipChain;

/// Where prepared thumbnails are uploaded and later freed.
pub trait TextureStore: Send + Sync + 'static {
    type Texture: Clone + Send + Sync + 'static;

    fn upload(&self, chain: MipChain) -> Self::Texture;
    fn release(&self, texture: &Self::Texture);
}

/// Image ids the caches gave up, waiting for `drain_released_textures`.
#[derive(Resource, Clone, Default)]
pub struct TextureReleaseQueue(Arc<Mutex<Vec<AssetId<Image>>>>);

impl TextureReleaseQueue {
    pub fn push(&self, id: AssetId<Image>) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(id);
    }

    pub fn take(&self) -> Vec<AssetId<Image>> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Uploads through the asset server, which is safe to call off the main
/// thread. Releases are queued for the ECS to apply.
#[derive(Clone)]
pub struct BevyTextures {
    assets: AssetServer,
    released: TextureReleaseQueue,
}

impl BevyTextures {
    pub fn new(assets: AssetServer, released: TextureReleaseQueue) -> Self {
        Self { assets, released }
    }
}

impl TextureStore for BevyTextures {
    type Texture = Handle<Image>;

    fn upload(&self, chain: MipChain) -> Handle<Image> {
        self.assets.add(thumbnail_image(chain))
    }

    fn release(&self, texture: &Handle<Image>) {
        self.released.push(texture.id());
    }
}

/// sRGB texture with a linear, mip-mapped sampler. Pixels stay readable in
/// the main world so a selection can be copied out before eviction.
pub fn thumbnail_image(chain: MipChain) -> Image {
    let mut image = Image::new_uninit(
        Extent3d {
            width: chain.width,
            height: chain.height,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::default(),
    );
    image.texture_descriptor.mip_level_count = chain.levels;
    image.data = Some(chain.data);
    image.sampler = ImageSampler::linear();
    image
}

pub fn drain_released_textures(queue: Res<TextureReleaseQueue>, mut images: ResMut<Assets<Image>>) {
    let released = queue.take();
    if released.is_empty() {
        return;
    }
    for id in &released {
        images.remove(*id);
    }
    debug!("released {} thumbnail texture(s)", released.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::thumbnails::raster::build_mip_chain;

    #[test]
    fn thumbnail_image_carries_mips_and_srgb() {
        let chain = build_mip_chain(image::RgbaImage::new(16, 8));
        let image = thumbnail_image(chain);
        assert_eq!(image.texture_descriptor.format, TextureFormat::Rgba8UnormSrgb);
        assert_eq!(image.texture_descriptor.mip_level_count, 5);
        assert_eq!(image.width(), 16);
        assert_eq!(image.height(), 8);
        assert!(matches!(image.sampler, ImageSampler::Descriptor(_)));
    }

    #[test]
    fn drain_removes_queued_images() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.init_resource::<Assets<Image>>();
        app.init_resource::<TextureReleaseQueue>();
        app.add_systems(Update, drain_released_textures);

        let chain = build_mip_chain(image::RgbaImage::new(4, 4));
        let handle = app
            .world_mut()
            .resource_mut::<Assets<Image>>()
            .add(thumbnail_image(chain));
        app.world().resource::<TextureReleaseQueue>().push(handle.id());
        app.update();

        assert!(app.world().resource::<Assets<Image>>().get(&handle).is_none());
        assert!(app.world().resource::<TextureReleaseQueue>().take().is_empty());
    }
}
