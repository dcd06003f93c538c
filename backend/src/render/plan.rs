//! Turns a template layout and a set of certificate values into an ordered
//! list of draw operations. Planning does no I/O, so the same inputs always
//! give the same plan.

use super::color::Rgb;
use super::fonts::StandardFont;
use super::CertificateValues;
use crate::storage::Storage;
use common::model::layout::{ImageBox, TextBox, Watermark};
use common::model::template::{Orientation, Template};
use std::path::PathBuf;

/// A4 in points.
pub const A4_WIDTH_PT: f32 = 595.2756;
pub const A4_HEIGHT_PT: f32 = 841.8898;

const WATERMARK_FONT: StandardFont = StandardFont::Helvetica;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn a4(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Portrait => Self {
                width: A4_WIDTH_PT,
                height: A4_HEIGHT_PT,
            },
            Orientation::Landscape => Self {
                width: A4_HEIGHT_PT,
                height: A4_WIDTH_PT,
            },
        }
    }
}

/// Rectangle in points, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl From<&ImageBox> for Area {
    fn from(b: &ImageBox) -> Self {
        Self {
            x: b.x,
            y: b.y,
            width: b.width,
            height: b.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRole {
    Background,
    Logo,
    Signature,
    QrCode,
}

impl AssetRole {
    pub fn label(&self) -> &'static str {
        match self {
            AssetRole::Background => "background",
            AssetRole::Logo => "logo",
            AssetRole::Signature => "signature",
            AssetRole::QrCode => "qr code",
        }
    }

    /// Logos and signatures come from the request, the rest from the server.
    pub fn is_upload(&self) -> bool {
        matches!(self, AssetRole::Logo | AssetRole::Signature)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    File(PathBuf),
    Solid(Rgb),
    QrCode(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font: StandardFont,
    pub size: f32,
    pub color: Rgb,
    /// Fill alpha, `1.0` for opaque ink.
    pub opacity: f32,
    /// Baseline origin of the first glyph.
    pub x: f32,
    pub y: f32,
    /// Degrees, counter-clockwise.
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Image {
        role: AssetRole,
        source: ImageSource,
        area: Area,
    },
    Text(TextRun),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub page: PageSize,
    pub ops: Vec<DrawOp>,
    /// Degraded configuration noticed while planning (unknown fonts, ...).
    pub warnings: Vec<String>,
}

impl RenderPlan {
    /// The visible text of the document, in paint order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text(run) => Some(run.text.as_str()),
            DrawOp::Image { .. } => None,
        })
    }
}

struct Planner<'a> {
    storage: &'a Storage,
    page: PageSize,
    ops: Vec<DrawOp>,
    warnings: Vec<String>,
}

/// Builds the draw list: background, watermark, centred recipient/title/course,
/// date/issuer/serial, logo and signature, then the QR code.
pub fn plan(template: &Template, values: &CertificateValues, storage: &Storage) -> RenderPlan {
    let config = &template.config;
    let mut planner = Planner {
        storage,
        page: PageSize::a4(template.orientation),
        ops: Vec::new(),
        warnings: Vec::new(),
    };

    planner.background(template.background.as_deref());
    if let Some(watermark) = &config.watermark {
        planner.watermark(watermark);
    }

    planner.centered(&config.recipient, &values.recipient, "recipient");
    planner.centered(&config.title, &values.title, "title");
    planner.centered(&config.course, &values.course, "course");

    planner.left(&config.date, format!("Date: {}", values.date), "date");
    planner.left(&config.issuer, format!("Issuer: {}", values.issuer), "issuer");
    planner.left(&config.serial, format!("Serial: {}", values.serial), "serial");

    if let Some(path) = &values.logo {
        planner.image(AssetRole::Logo, config.logo.as_ref(), path);
    }
    if let Some(path) = &values.signature {
        planner.image(AssetRole::Signature, config.signature.as_ref(), path);
    }

    let qr = &config.qr;
    planner.ops.push(DrawOp::Image {
        role: AssetRole::QrCode,
        source: ImageSource::QrCode(values.verify_url.clone()),
        area: Area {
            x: qr.x,
            y: qr.y,
            width: qr.size,
            height: qr.size,
        },
    });

    RenderPlan {
        page: planner.page,
        ops: planner.ops,
        warnings: planner.warnings,
    }
}

impl Planner<'_> {
    fn full_page(&self) -> Area {
        Area {
            x: 0.0,
            y: 0.0,
            width: self.page.width,
            height: self.page.height,
        }
    }

    /// Queues a solid fill for a hex colour, otherwise an image from
    /// `backgrounds/`.
    fn background(&mut self, background: Option<&str>) {
        let Some(background) = background else {
            return;
        };
        if let Ok(color) = Rgb::from_hex(background) {
            self.ops.push(DrawOp::Image {
                role: AssetRole::Background,
                source: ImageSource::Solid(color),
                area: self.full_page(),
            });
            return;
        }
        match self.storage.background_path(background) {
            Some(path) => self.ops.push(DrawOp::Image {
                role: AssetRole::Background,
                source: ImageSource::File(path),
                area: self.full_page(),
            }),
            None => self
                .warnings
                .push(format!("background '{}' is not a plain file name, skipped", background)),
        }
    }

    fn watermark(&mut self, watermark: &Watermark) {
        if watermark.text.trim().is_empty() {
            return;
        }
        let width = WATERMARK_FONT.text_width(&watermark.text, watermark.size);
        let radians = watermark.angle.to_radians();
        let (cx, cy) = (self.page.width / 2.0, self.page.height / 2.0);
        // Centre of the text run sits on the page centre along the rotated baseline.
        self.ops.push(DrawOp::Text(TextRun {
            text: watermark.text.clone(),
            font: WATERMARK_FONT,
            size: watermark.size,
            color: Rgb::BLACK,
            opacity: watermark.opacity.clamp(0.0, 1.0),
            x: cx - width / 2.0 * radians.cos(),
            y: cy - width / 2.0 * radians.sin(),
            angle: watermark.angle,
        }));
    }

    fn centered(&mut self, field: &TextBox, text: &str, name: &str) {
        let font = self.font(field, name);
        let width = font.text_width(text, field.size);
        let run = TextRun {
            text: text.to_string(),
            font,
            size: field.size,
            color: self.color(field, name),
            opacity: 1.0,
            x: field.x - width / 2.0,
            y: field.y,
            angle: 0.0,
        };
        self.ops.push(DrawOp::Text(run));
    }

    fn left(&mut self, field: &TextBox, text: String, name: &str) {
        let run = TextRun {
            text,
            font: self.font(field, name),
            size: field.size,
            color: self.color(field, name),
            opacity: 1.0,
            x: field.x,
            y: field.y,
            angle: 0.0,
        };
        self.ops.push(DrawOp::Text(run));
    }

    fn image(&mut self, role: AssetRole, area: Option<&ImageBox>, path: &std::path::Path) {
        match area {
            Some(area) => self.ops.push(DrawOp::Image {
                role,
                source: ImageSource::File(path.to_path_buf()),
                area: area.into(),
            }),
            None => self.warnings.push(format!(
                "{} supplied but the template has no position for it, skipped",
                role.label()
            )),
        }
    }

    fn font(&mut self, field: &TextBox, name: &str) -> StandardFont {
        StandardFont::from_name(&field.font).unwrap_or_else(|| {
            self.warnings.push(format!(
                "{}: unknown font '{}', using Helvetica",
                name, field.font
            ));
            StandardFont::Helvetica
        })
    }

    fn color(&mut self, field: &TextBox, name: &str) -> Rgb {
        Rgb::from_hex(&field.color).unwrap_or_else(|e| {
            self.warnings.push(format!("{}: {}, using black", name, e));
            Rgb::BLACK
        })
    }
}
