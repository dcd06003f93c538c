use serde::{Deserialize, Serialize};

/// Placement of a single line of text on the page.
///
/// Coordinates are PDF points with the origin at the bottom-left corner of the
/// page. `font` is one of the PDF standard font names (`Helvetica-Bold`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub x: f32,
    pub y: f32,
    pub font: String,
    pub size: f32,
    /// `#rrggbb` or `#rgb`.
    pub color: String,
}

/// Bounding box an image is stretched into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Square area for the verification QR code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrBox {
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

/// Diagonal text painted behind everything else.
///
/// Every key is optional in the stored JSON; absent keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Watermark {
    pub text: String,
    pub opacity: f32,
    /// Degrees, counter-clockwise.
    pub angle: f32,
    pub size: f32,
}

impl Default for Watermark {
    fn default() -> Self {
        Self {
            text: "ORIGINAL".to_string(),
            opacity: 0.1,
            angle: 45.0,
            size: 60.0,
        }
    }
}

/// The field layout of a template, as stored in `templates.config_json`.
///
/// The JSON key names are part of the stored format and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub recipient: TextBox,
    pub title: TextBox,
    pub course: TextBox,
    pub date: TextBox,
    pub issuer: TextBox,
    #[serde(rename = "serial_pos")]
    pub serial: TextBox,
    #[serde(rename = "signature_pos", default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<ImageBox>,
    #[serde(rename = "logo_pos", default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<ImageBox>,
    #[serde(rename = "qr_pos")]
    pub qr: QrBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<Watermark>,
}

fn text_box(x: f32, y: f32, font: &str, size: f32, color: &str) -> TextBox {
    TextBox {
        x,
        y,
        font: font.to_string(),
        size,
        color: color.to_string(),
    }
}

impl Default for TemplateConfig {
    /// The layout every catalog template is seeded with.
    fn default() -> Self {
        Self {
            recipient: text_box(400.0, 300.0, "Helvetica-Bold", 36.0, "#000000"),
            title: text_box(400.0, 450.0, "Helvetica-Bold", 48.0, "#1a1a1a"),
            course: text_box(400.0, 250.0, "Helvetica", 24.0, "#333333"),
            date: text_box(200.0, 100.0, "Helvetica", 14.0, "#666666"),
            issuer: text_box(600.0, 100.0, "Helvetica", 14.0, "#666666"),
            serial: text_box(700.0, 50.0, "Helvetica", 10.0, "#999999"),
            signature: Some(ImageBox {
                x: 550.0,
                y: 150.0,
                width: 100.0,
                height: 50.0,
            }),
            logo: Some(ImageBox {
                x: 350.0,
                y: 500.0,
                width: 100.0,
                height: 100.0,
            }),
            qr: QrBox {
                x: 50.0,
                y: 50.0,
                size: 80.0,
            },
            watermark: Some(Watermark {
                text: "ORIGINAL CERTIFICATE".to_string(),
                ..Watermark::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_key_names_round_trip() {
        let json = serde_json::to_value(TemplateConfig::default()).unwrap();
        assert!(json.get("serial_pos").is_some());
        assert!(json.get("qr_pos").is_some());
        assert!(json.get("logo_pos").is_some());
        assert!(json.get("signature_pos").is_some());
        assert_eq!(json["watermark"]["text"], "ORIGINAL CERTIFICATE");
    }

    #[test]
    fn partial_watermark_takes_defaults() {
        let mut json = serde_json::to_value(TemplateConfig::default()).unwrap();
        json["watermark"] = serde_json::json!({ "text": "COPY" });
        let config: TemplateConfig = serde_json::from_value(json).unwrap();
        let watermark = config.watermark.unwrap();
        assert_eq!(watermark.text, "COPY");
        assert_eq!(watermark.opacity, 0.1);
        assert_eq!(watermark.angle, 45.0);
        assert_eq!(watermark.size, 60.0);
    }

    #[test]
    fn image_boxes_and_watermark_are_optional() {
        let mut json = serde_json::to_value(TemplateConfig::default()).unwrap();
        let object = json.as_object_mut().unwrap();
        object.remove("logo_pos");
        object.remove("signature_pos");
        object.remove("watermark");
        let config: TemplateConfig = serde_json::from_value(json).unwrap();
        assert!(config.logo.is_none());
        assert!(config.signature.is_none());
        assert!(config.watermark.is_none());
    }
}
