use super::color::Rgb;
use super::RenderError;
use image::imageops::FilterType;
use image::{load_from_memory, DynamicImage, GenericImageView};

/// Resolution images are resampled to when they are larger than their box.
pub const IMAGE_DPI: f32 = 300.0;

/// Opaque 8-bit RGB pixels, row-major, ready to embed in the PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl RasterImage {
    /// A single pixel; stretched over an area it paints a solid fill.
    pub fn solid(color: Rgb) -> Self {
        Self {
            width: 1,
            height: 1,
            rgb: vec![color.r, color.g, color.b],
        }
    }

    /// Decodes an uploaded image, shrinks it to what a `box_w` x `box_h` point
    /// box can show at [`IMAGE_DPI`], and flattens transparency over white.
    pub fn decode_for_box(bytes: &[u8], box_w: f32, box_h: f32) -> Result<Self, RenderError> {
        let img = load_from_memory(bytes)?;
        let (orig_w, orig_h) = img.dimensions();
        let orig_w_f = orig_w as f32;
        let orig_h_f = orig_h as f32;

        let target_w_px = box_w.max(1.0) / 72.0 * IMAGE_DPI;
        let target_h_px = box_h.max(1.0) / 72.0 * IMAGE_DPI;

        // Scale with the most restrictive side, never upscale.
        let scale = (target_w_px / orig_w_f)
            .min(target_h_px / orig_h_f)
            .min(1.0);

        let resized: DynamicImage = if scale >= 1.0 {
            img
        } else {
            let new_w = (orig_w_f * scale).max(1.0).round() as u32;
            let new_h = (orig_h_f * scale).max(1.0).round() as u32;
            img.resize_exact(new_w, new_h, FilterType::Lanczos3)
        };

        // Flatten alpha channel over white background and convert to RGB
        let rgba = resized.to_rgba8();
        let (w, h) = rgba.dimensions();
        let mut background = image::RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
        image::imageops::overlay(&mut background, &rgba, 0, 0);
        let rgb_image = DynamicImage::ImageRgba8(background).to_rgb8();

        Ok(Self {
            width: w,
            height: h,
            rgb: rgb_image.into_raw(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn transparent_pixels_become_white() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        let raster = RasterImage::decode_for_box(&png_bytes(&img), 100.0, 100.0).unwrap();
        assert_eq!((raster.width, raster.height), (4, 4));
        assert!(raster.rgb.iter().all(|&v| v == 255));
    }

    #[test]
    fn oversized_images_are_shrunk_to_the_box() {
        // a 10pt box holds ~42px at 300 DPI
        let img = RgbaImage::from_pixel(400, 200, Rgba([10, 20, 30, 255]));
        let raster = RasterImage::decode_for_box(&png_bytes(&img), 10.0, 10.0).unwrap();
        assert!(raster.width <= 42 && raster.height <= 42);
        assert_eq!(raster.width, raster.height * 2);
        assert_eq!(raster.rgb.len(), (raster.width * raster.height * 3) as usize);
        assert_eq!(&raster.rgb[..3], &[10, 20, 30]);
    }

    #[test]
    fn garbage_is_an_image_error() {
        let err = RasterImage::decode_for_box(b"not an image", 10.0, 10.0).unwrap_err();
        assert!(matches!(err, RenderError::Image(_)));
    }
}
