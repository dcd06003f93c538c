use super::raster::RasterImage;
use super::RenderError;
use qrcode::{Color, QrCode};

/// Pixels per QR module.
const MODULE_PX: usize = 10;
/// Quiet zone, in modules.
const BORDER_MODULES: usize = 1;

/// Encodes `data` as a black-on-white QR code raster.
pub fn qr_raster(data: &str) -> Result<RasterImage, RenderError> {
    let code = QrCode::new(data.as_bytes())?;
    let modules = code.width();
    let colors = code.to_colors();

    let side = (modules + 2 * BORDER_MODULES) * MODULE_PX;
    let mut rgb = vec![255u8; side * side * 3];

    for (index, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let left = (index % modules + BORDER_MODULES) * MODULE_PX;
        let top = (index / modules + BORDER_MODULES) * MODULE_PX;
        for y in top..top + MODULE_PX {
            let row = y * side * 3;
            rgb[row + left * 3..row + (left + MODULE_PX) * 3].fill(0);
        }
    }

    Ok(RasterImage {
        width: side as u32,
        height: side as u32,
        rgb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_is_square_with_a_white_border() {
        let raster = qr_raster("http://localhost:8080/verify/abc").unwrap();
        assert_eq!(raster.width, raster.height);
        assert_eq!(raster.width as usize % MODULE_PX, 0);
        assert_eq!(raster.rgb.len(), (raster.width * raster.height * 3) as usize);
        // top-left pixel sits in the quiet zone
        assert_eq!(&raster.rgb[..3], &[255, 255, 255]);
        // the finder pattern starts right after the border
        let offset = (BORDER_MODULES * MODULE_PX) * (raster.width as usize + 1) * 3;
        assert_eq!(&raster.rgb[offset..offset + 3], &[0, 0, 0]);
    }

    #[test]
    fn same_input_same_code() {
        let a = qr_raster("CERT-2024-000001").unwrap();
        let b = qr_raster("CERT-2024-000001").unwrap();
        assert_eq!(a, b);
    }
}
