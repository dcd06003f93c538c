use super::fonts::StandardFont;
use super::plan::{Area, AssetRole, DrawOp, ImageSource, RenderPlan, TextRun};
use super::qr::qr_raster;
use super::raster::{RasterImage, IMAGE_DPI};
use super::RenderError;
use printpdf::image_crate::{DynamicImage, RgbImage};
use printpdf::lopdf::content::Operation;
use printpdf::lopdf::{self, Dictionary, Object};
use printpdf::{
    Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Pt,
    Rgb as PdfRgb, TextMatrix,
};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct PaintedDocument {
    pub bytes: Vec<u8>,
    /// Assets that were skipped because their file was missing.
    pub warnings: Vec<String>,
}

fn mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

fn pdf_error(err: printpdf::Error) -> RenderError {
    RenderError::Pdf(format!("{:?}", err))
}

fn lopdf_error(err: lopdf::Error) -> RenderError {
    RenderError::Pdf(err.to_string())
}

/// Resource name of the graphics state for one fill alpha.
fn alpha_state_name(alpha: f32) -> String {
    format!("CfAlpha{}", (alpha.clamp(0.0, 1.0) * 1000.0).round() as u32)
}

/// Image files already decoded for a given box, keyed by path and box size.
/// A batch keeps one cache so a shared logo is resampled once, not per page.
#[derive(Debug, Default)]
pub struct RasterCache {
    entries: HashMap<(PathBuf, u32, u32), Option<RasterImage>>,
}

impl RasterCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    /// `Ok(None)` when the file has disappeared. Misses are remembered too.
    fn file(
        &mut self,
        role: AssetRole,
        path: &Path,
        area: &Area,
    ) -> Result<Option<RasterImage>, RenderError> {
        let key = (path.to_path_buf(), area.width.to_bits(), area.height.to_bits());
        if let Some(cached) = self.entries.get(&key) {
            return Ok(cached.clone());
        }
        let raster = match fs::read(path) {
            Ok(bytes) => match RasterImage::decode_for_box(&bytes, area.width, area.height) {
                Ok(raster) => Some(raster),
                Err(RenderError::Image(source)) if role.is_upload() => {
                    return Err(RenderError::UnreadableUpload {
                        role: role.label(),
                        source,
                    });
                }
                Err(e) => return Err(e),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("{} image {} not found", role.label(), path.display());
                None
            }
            Err(e) => return Err(e.into()),
        };
        self.entries.insert(key, raster.clone());
        Ok(raster)
    }
}

/// Executes a render plan into a single-page PDF.
pub fn paint(
    plan: &RenderPlan,
    title: &str,
    cache: &mut RasterCache,
) -> Result<PaintedDocument, RenderError> {
    let (doc, page, layer) = PdfDocument::new(
        title,
        mm(plan.page.width),
        mm(plan.page.height),
        "Certificate",
    );
    let layer = doc.get_page(page).get_layer(layer);
    let mut fonts: HashMap<StandardFont, IndirectFontRef> = HashMap::new();
    let mut alpha_states: BTreeMap<String, f32> = BTreeMap::new();
    let mut warnings = Vec::new();

    for op in &plan.ops {
        match op {
            DrawOp::Image { role, source, area } => {
                match load_raster(*role, source, area, cache)? {
                    Some(raster) => place_raster(&layer, raster, area)?,
                    None => warnings.push(format!("{} file not found, skipped", role.label())),
                }
            }
            DrawOp::Text(run) => {
                let font = match fonts.get(&run.font) {
                    Some(font) => font.clone(),
                    None => {
                        let font = doc.add_builtin_font(run.font.builtin()).map_err(pdf_error)?;
                        fonts.insert(run.font, font.clone());
                        font
                    }
                };
                if run.opacity < 1.0 {
                    alpha_states.insert(alpha_state_name(run.opacity), run.opacity.clamp(0.0, 1.0));
                }
                draw_text(&layer, &font, run);
            }
        }
    }

    let bytes = doc.save_to_bytes().map_err(pdf_error)?;
    let bytes = attach_alpha_states(bytes, &alpha_states)?;
    Ok(PaintedDocument { bytes, warnings })
}

fn load_raster(
    role: AssetRole,
    source: &ImageSource,
    area: &Area,
    cache: &mut RasterCache,
) -> Result<Option<RasterImage>, RenderError> {
    match source {
        ImageSource::Solid(color) => Ok(Some(RasterImage::solid(*color))),
        ImageSource::QrCode(data) => Ok(Some(qr_raster(data)?)),
        ImageSource::File(path) => cache.file(role, path, area),
    }
}

fn place_raster(
    layer: &PdfLayerReference,
    raster: RasterImage,
    area: &Area,
) -> Result<(), RenderError> {
    let (width, height) = (raster.width, raster.height);
    let buffer = RgbImage::from_raw(width, height, raster.rgb)
        .ok_or_else(|| RenderError::Pdf("raster buffer does not match its size".into()))?;
    let image = Image::from_dynamic_image(&DynamicImage::ImageRgb8(buffer));

    // Size the image takes at IMAGE_DPI before scaling, in points.
    let natural_w = width as f32 / IMAGE_DPI * 72.0;
    let natural_h = height as f32 / IMAGE_DPI * 72.0;

    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(mm(area.x)),
            translate_y: Some(mm(area.y)),
            scale_x: Some(area.width / natural_w),
            scale_y: Some(area.height / natural_h),
            dpi: Some(IMAGE_DPI),
            ..Default::default()
        },
    );
    Ok(())
}

/// printpdf 0.7 keeps page graphics states private, so the alpha states the
/// content stream names with `gs` are added to the saved page's resources.
fn attach_alpha_states(
    bytes: Vec<u8>,
    states: &BTreeMap<String, f32>,
) -> Result<Vec<u8>, RenderError> {
    if states.is_empty() {
        return Ok(bytes);
    }
    let mut pdf = lopdf::Document::load_mem(&bytes).map_err(lopdf_error)?;
    let page_id = pdf
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| RenderError::Pdf("document has no page".into()))?;

    let existing = pdf
        .get_dictionary(page_id)
        .and_then(|page| page.get(b"Resources"))
        .and_then(Object::as_reference);
    let resources_id = match existing {
        Ok(id) => id,
        Err(_) => {
            let id = pdf.add_object(Dictionary::new());
            pdf.get_dictionary_mut(page_id)
                .map_err(lopdf_error)?
                .set("Resources", Object::Reference(id));
            id
        }
    };

    let resources = pdf.get_dictionary_mut(resources_id).map_err(lopdf_error)?;
    let mut ext_states = resources
        .get(b"ExtGState")
        .and_then(Object::as_dict)
        .cloned()
        .unwrap_or_default();
    for (name, alpha) in states {
        let mut state = Dictionary::new();
        state.set("Type", "ExtGState");
        state.set("ca", *alpha);
        state.set("CA", *alpha);
        ext_states.set(name.as_bytes().to_vec(), Object::Dictionary(state));
    }
    resources.set("ExtGState", Object::Dictionary(ext_states));

    let mut out = Vec::new();
    pdf.save_to(&mut out).map_err(|err| RenderError::Pdf(err.to_string()))?;
    Ok(out)
}

fn draw_text(layer: &PdfLayerReference, font: &IndirectFontRef, run: &TextRun) {
    let translucent = run.opacity < 1.0;
    if translucent {
        layer.save_graphics_state();
        layer.add_operation(Operation::new(
            "gs",
            vec![Object::Name(alpha_state_name(run.opacity).into_bytes())],
        ));
    }

    let (r, g, b) = run.color.to_unit();
    layer.set_fill_color(Color::Rgb(PdfRgb::new(r, g, b, None)));

    if run.angle == 0.0 {
        layer.use_text(run.text.clone(), run.size, mm(run.x), mm(run.y), font);
    } else {
        layer.begin_text_section();
        layer.set_font(font, run.size);
        layer.set_text_matrix(TextMatrix::TranslateRotate(Pt(run.x), Pt(run.y), run.angle));
        layer.write_text(run.text.clone(), font);
        layer.end_text_section();
    }

    if translucent {
        layer.restore_graphics_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::color::Rgb;
    use crate::render::plan::PageSize;
    use common::model::template::Orientation;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn text(text: &str, angle: f32, opacity: f32) -> DrawOp {
        DrawOp::Text(TextRun {
            text: text.into(),
            font: StandardFont::TimesBold,
            size: 24.0,
            color: Rgb::BLACK,
            opacity,
            x: 100.0,
            y: 100.0,
            angle,
        })
    }

    #[test]
    fn paints_text_images_and_qr() {
        let page = PageSize::a4(Orientation::Landscape);
        let plan = RenderPlan {
            page,
            ops: vec![
                DrawOp::Image {
                    role: AssetRole::Background,
                    source: ImageSource::Solid(Rgb::WHITE),
                    area: Area { x: 0.0, y: 0.0, width: page.width, height: page.height },
                },
                text("WATERMARK", 45.0, 0.1),
                text("Jane Doe", 0.0, 1.0),
                DrawOp::Image {
                    role: AssetRole::QrCode,
                    source: ImageSource::QrCode("http://localhost/verify/abc".into()),
                    area: Area { x: 50.0, y: 50.0, width: 80.0, height: 80.0 },
                },
            ],
            warnings: Vec::new(),
        };

        let painted = paint(&plan, "test", &mut RasterCache::new()).unwrap();
        assert!(painted.bytes.starts_with(b"%PDF"));
        assert!(painted.warnings.is_empty());
        assert!(contains(&painted.bytes, b"/ExtGState"));

        let pdf = lopdf::Document::load_mem(&painted.bytes).unwrap();
        let page_id = *pdf.get_pages().values().next().unwrap();
        let resources_id = pdf
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Resources")
            .unwrap()
            .as_reference()
            .unwrap();
        let resources = pdf.get_dictionary(resources_id).unwrap();
        let states = resources.get(b"ExtGState").unwrap().as_dict().unwrap();
        let state = states.get(b"CfAlpha100").unwrap().as_dict().unwrap();
        assert!((state.get(b"ca").unwrap().as_f32().unwrap() - 0.1).abs() < 1e-6);
        // The page still carries its font and QR image.
        assert!(resources.get(b"Font").is_ok());
        assert!(resources.get(b"XObject").is_ok());
    }

    #[test]
    fn opaque_text_needs_no_graphics_state() {
        let plan = RenderPlan {
            page: PageSize::a4(Orientation::Portrait),
            ops: vec![text("Jane Doe", 0.0, 1.0)],
            warnings: Vec::new(),
        };
        let painted = paint(&plan, "test", &mut RasterCache::new()).unwrap();
        assert!(!contains(&painted.bytes, b"/ExtGState"));
    }

    #[test]
    fn real_images_are_decoded_once_and_placed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        image::RgbaImage::from_pixel(640, 320, image::Rgba([200, 30, 30, 255]))
            .save(&path)
            .unwrap();
        let logo = DrawOp::Image {
            role: AssetRole::Logo,
            source: ImageSource::File(path.clone()),
            area: Area { x: 50.0, y: 700.0, width: 120.0, height: 60.0 },
        };
        let plan = RenderPlan {
            page: PageSize::a4(Orientation::Portrait),
            ops: vec![logo.clone(), logo],
            warnings: Vec::new(),
        };

        let mut cache = RasterCache::new();
        let first = paint(&plan, "test", &mut cache).unwrap();
        assert!(first.warnings.is_empty());
        assert_eq!(cache.len(), 1);

        // A second page reuses the decoded logo even after the file is gone.
        fs::remove_file(&path).unwrap();
        let second = paint(&plan, "test", &mut cache).unwrap();
        assert!(second.warnings.is_empty());
        assert!(second.bytes.len() > 1000);
        assert!(contains(&second.bytes, b"/XObject"));
    }

    #[test]
    fn missing_files_are_skipped_with_a_warning() {
        let plan = RenderPlan {
            page: PageSize::a4(Orientation::Portrait),
            ops: vec![DrawOp::Image {
                role: AssetRole::Logo,
                source: ImageSource::File("does/not/exist.png".into()),
                area: Area { x: 10.0, y: 10.0, width: 50.0, height: 50.0 },
            }],
            warnings: Vec::new(),
        };
        let painted = paint(&plan, "test", &mut RasterCache::new()).unwrap();
        assert!(painted.bytes.starts_with(b"%PDF"));
        assert_eq!(painted.warnings, vec!["logo file not found, skipped".to_string()]);
    }

    #[test]
    fn undecodable_files_fail_the_render() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"definitely not a png").unwrap();
        let plan_for = |role| RenderPlan {
            page: PageSize::a4(Orientation::Portrait),
            ops: vec![DrawOp::Image {
                role,
                source: ImageSource::File(path.clone()),
                area: Area { x: 10.0, y: 10.0, width: 50.0, height: 50.0 },
            }],
            warnings: Vec::new(),
        };

        assert!(matches!(
            paint(&plan_for(AssetRole::Logo), "test", &mut RasterCache::new()),
            Err(RenderError::UnreadableUpload { role: "logo", .. })
        ));
        assert!(matches!(
            paint(&plan_for(AssetRole::Background), "test", &mut RasterCache::new()),
            Err(RenderError::Image(_))
        ));
    }
}
