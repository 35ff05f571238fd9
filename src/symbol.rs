use serde_derive::{Deserialize, Serialize};

use crate::{
    fonts::{get_font_settings, FontRequest, FontWeight},
    geometry::Geometry,
};

pub type Rgba = [u8; 4];

pub const DEFAULT_TEXT_COLOR: Rgba = [0, 0, 0, 255];

/// Text style as reported by `getComputedStyle` on the note element
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedTextStyle {
    pub color: String,
    pub background_color: String,
    pub font_family: String,
    pub font_style: String,
    pub font_weight: String,
    pub font_size: String,
}

impl ComputedTextStyle {
    pub fn font_request(&self) -> FontRequest {
        let some = |s: &String| if s.trim().is_empty() { None } else { Some(s.clone()) };
        FontRequest {
            font_family: some(&self.font_family),
            font_style: some(&self.font_style),
            font_weight: some(&self.font_weight).map(FontWeight::Named),
            font_size: some(&self.font_size),
        }
    }
}

/// Parses any CSS color (`rgb(...)`, `rgba(...)`, `#fff`, names) into
/// 0-255 channels, alpha included
pub fn css_color_to_rgba(s: &str) -> Option<Rgba> {
    let c = csscolorparser::parse(s.trim()).ok()?;
    let channel = |v: f64| (v.max(0.0).min(1.0) * 255.0).round() as u8;
    Some([channel(c.r), channel(c.g), channel(c.b), channel(c.a)])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolFont {
    pub size: String,
    pub style: String,
    pub weight: String,
    pub family: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSymbol {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub color: Rgba,
    pub font: SymbolFont,
    pub halo_size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halo_color: Option<Rgba>,
    pub horizontal_alignment: String,
    pub vertical_alignment: String,
    pub xoffset: f64,
    pub yoffset: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteAttributes {
    #[serde(rename = "OBJECTID")]
    pub object_id: u32,
    pub text: String,
}

/// A note materialized as a map-native text graphic, positioned at the
/// note's anchor and shifted by a screen offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteGraphic {
    pub geometry: Geometry,
    pub symbol: TextSymbol,
    pub attributes: NoteAttributes,
}

impl TextSymbol {

    /// The background of the note becomes a halo, since text symbols have no
    /// background. Unset, transparent or same-as-text backgrounds get no halo.
    pub fn from_style(text: &str, style: &ComputedTextStyle, xoffset: f64, yoffset: f64) -> TextSymbol {
        let color = css_color_to_rgba(&style.color).unwrap_or(DEFAULT_TEXT_COLOR);
        let halo_color = css_color_to_rgba(&style.background_color)
            .filter(|bg| bg[3] > 0)
            .filter(|bg| *bg != color);
        let font = get_font_settings(&style.font_request());

        TextSymbol {
            kind: "text".to_string(),
            text: text.to_string(),
            color,
            font: SymbolFont {
                size: font.font_size,
                style: font.font_style,
                weight: font.font_weight,
                family: font.font_family,
            },
            halo_size: if halo_color.is_some() { 1.0 } else { 0.0 },
            halo_color,
            horizontal_alignment: "center".to_string(),
            vertical_alignment: "middle".to_string(),
            xoffset,
            yoffset,
        }
    }
}
