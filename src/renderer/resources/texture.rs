use std::path::Path;
use ash::vk;
use image::RgbaImage;
use crate::renderer::error::{LoadError, RenderError};

/// Decodes any supported image file into tightly packed RGBA8 pixels
pub fn decode(path: &Path) -> Result<RgbaImage, LoadError> {
    let image = image::open(path).map_err(|source| LoadError::Texture {
        path: path.to_path_buf(),
        source,
    })?;
    let pixels = image.to_rgba8();
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(LoadError::EmptyTexture {
            width: pixels.width(),
            height: pixels.height(),
        });
    }
    log::info!("Decoded {}x{} texture {:?}", pixels.width(), pixels.height(), path);
    Ok(pixels)
}

/// Plain white texture used until the user supplies one, so vertex colors
/// show through unchanged
pub fn default_texture() -> RgbaImage {
    RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 255]))
}

fn sampler_info() -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .mip_lod_bias(0.0)
        .anisotropy_enable(false)
        .max_anisotropy(1.0)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .min_lod(0.0)
        .max_lod(0.0)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
}

/// Linear filtering with repeat addressing, shared by every texture
pub fn create_texture_sampler(device: &ash::Device) -> Result<vk::Sampler, RenderError> {
    Ok(unsafe { device.create_sampler(&sampler_info(), None)? })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_repeats_with_linear_filtering() {
        let info = sampler_info();

        assert_eq!(info.mag_filter, vk::Filter::LINEAR);
        assert_eq!(info.min_filter, vk::Filter::LINEAR);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.address_mode_v, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.anisotropy_enable, vk::FALSE);
        assert_eq!(info.max_lod, 0.0);
    }

    #[test]
    fn decoded_images_are_rgba8() {
        let path = std::env::temp_dir().join(format!("objview-texture-{}.png", std::process::id()));
        image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let pixels = decode(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(pixels.dimensions(), (3, 2));
        assert_eq!(pixels.as_raw().len(), 3 * 2 * 4);
        assert_eq!(pixels.get_pixel(2, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn undecodable_files_are_load_errors() {
        let err = decode(Path::new("/nonexistent/texture.png")).unwrap_err();
        assert!(matches!(err, LoadError::Texture { .. }));
    }
}
