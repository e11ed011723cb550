use image::{imageops::FilterType, RgbaImage};

use super::ThumbnailError;

/// RGBA8 pixels for every mip level, largest first, packed back to back.
#[derive(Debug, Clone, PartialEq)]
pub struct MipChain {
    pub width: u32,
    pub height: u32,
    pub levels: u32,
    pub data: Vec<u8>,
}

/// Number of levels in a full chain down to 1×1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

/// Size that fits within `max_edge` on the long side, keeping aspect ratio.
/// Images already small enough keep their size.
pub fn bounded_size(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let long = width.max(height);
    if long <= max_edge || long == 0 {
        return (width, height);
    }
    let scale = max_edge as f64 / long as f64;
    let fit = |side: u32| ((side as f64 * scale).round() as u32).max(1);
    (fit(width), fit(height))
}

pub fn decode(bytes: &[u8]) -> Result<RgbaImage, ThumbnailError> {
    image::load_from_memory(bytes)
        .map(|decoded| decoded.to_rgba8())
        .map_err(|error| ThumbnailError::Decode(error.to_string()))
}

pub fn downscale(image: RgbaImage, max_edge: u32) -> RgbaImage {
    let (width, height) = bounded_size(image.width(), image.height(), max_edge);
    if (width, height) == image.dimensions() {
        return image;
    }
    image::imageops::resize(&image, width, height, FilterType::Lanczos3)
}

pub fn build_mip_chain(base: RgbaImage) -> MipChain {
    let (width, height) = base.dimensions();
    let levels = mip_level_count(width, height);
    let mut data = base.as_raw().clone();
    let mut previous = base;
    for level in 1..levels {
        let next = image::imageops::resize(
            &previous,
            (width >> level).max(1),
            (height >> level).max(1),
            FilterType::Triangle,
        );
        data.extend_from_slice(next.as_raw());
        previous = next;
    }
    MipChain {
        width,
        height,
        levels,
        data,
    }
}

/// Encoded bytes to an upload-ready chain. CPU heavy; run off the async threads.
pub fn prepare(bytes: &[u8], max_edge: u32) -> Result<MipChain, ThumbnailError> {
    let decoded = decode(bytes)?;
    Ok(build_mip_chain(downscale(decoded, max_edge)))
}

#[cfg(test)]
pub(crate) fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .map(|_| bytes.into_inner())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_count_covers_down_to_one_pixel() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(512, 256), 10);
        assert_eq!(mip_level_count(300, 17), 9);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn bounded_size_keeps_aspect_and_never_upscales() {
        assert_eq!(bounded_size(4096, 2048, 512), (512, 256));
        assert_eq!(bounded_size(1000, 3000, 300), (100, 300));
        assert_eq!(bounded_size(200, 100, 512), (200, 100));
        assert_eq!(bounded_size(5000, 3, 500), (500, 1));
    }

    #[test]
    fn chain_packs_every_level() {
        let chain = build_mip_chain(RgbaImage::new(8, 4));
        assert_eq!(chain.levels, 4);
        // 8x4 + 4x2 + 2x1 + 1x1 pixels
        assert_eq!(chain.data.len(), (32 + 8 + 2 + 1) * 4);
    }

    #[test]
    fn prepare_decodes_and_downscales() {
        let bytes = encode_png(64, 32);
        let chain = prepare(&bytes, 16);
        assert!(chain.as_ref().is_ok_and(|chain| (chain.width, chain.height) == (16, 8)));
        assert!(chain.is_ok_and(|chain| chain.levels == 5));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(prepare(b"not an image", 16), Err(ThumbnailError::Decode(_))));
    }
}
