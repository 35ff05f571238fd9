use std::sync::OnceLock;

use serde_derive::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, PartialOrd, Eq, Ord)]
pub struct SupportedFont {
    pub family: String,
    pub style: String,
    pub weight: String,
}

pub const DEFAULT_FONT_FAMILY: &str = "Arial";
pub const DEFAULT_FONT_STYLE: &str = "normal";
pub const DEFAULT_FONT_WEIGHT: &str = "normal";
pub const DEFAULT_FONT_SIZE: &str = "16px";

/// Fonts a text symbol can be rendered with on the target map service
pub fn supported_fonts() -> &'static [SupportedFont] {
    static FONTS: OnceLock<Vec<SupportedFont>> = OnceLock::new();
    FONTS.get_or_init(|| {
        let fonts: Vec<SupportedFont> = include!(concat!(env!("OUT_DIR"), "/fonts.rs"));
        fonts
    })
}

pub fn is_font_supported(family: &str, style: &str, weight: &str) -> bool {
    supported_fonts().iter().any(|f| f.family == family && f.style == style && f.weight == weight)
}

/// Weight as it comes from computed CSS (`"700"`) or from a caller (`700`, `"bold"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontWeight {
    Numeric(f64),
    Named(String),
}

impl FontWeight {

    /// Text symbols only know bold and normal
    pub fn to_symbol_weight(&self) -> &'static str {
        let bold = match self {
            FontWeight::Numeric(n) => *n >= 700.0,
            FontWeight::Named(s) => match s.trim().parse::<f64>() {
                Ok(n) => n >= 700.0,
                Err(_) => matches!(s.trim(), "bold" | "bolder"),
            },
        };
        if bold { "bold" } else { DEFAULT_FONT_WEIGHT }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontRequest {
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_style: Option<String>,
    #[serde(default)]
    pub font_weight: Option<FontWeight>,
    #[serde(default)]
    pub font_size: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSettings {
    pub font_family: String,
    pub font_style: String,
    pub font_weight: String,
    pub font_size: String,
}

/// First family of a CSS font list, without quotes: `"'Vast Shadow', serif"` -> `"Vast Shadow"`
pub fn strip_font_family(family: &str) -> String {
    family
        .split(',')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| *c != '"' && *c != '\'')
        .collect::<String>()
        .trim()
        .to_string()
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Maps a requested font onto one the map service supports. Unsupported
/// family / style / weight combinations fall back to the default font, an
/// explicitly requested size is kept.
pub fn get_font_settings(request: &FontRequest) -> FontSettings {
    let weight = request.font_weight.as_ref()
        .map(FontWeight::to_symbol_weight)
        .unwrap_or(DEFAULT_FONT_WEIGHT);
    let style = non_empty(&request.font_style).unwrap_or(DEFAULT_FONT_STYLE);
    let size = non_empty(&request.font_size).unwrap_or(DEFAULT_FONT_SIZE);
    let family = non_empty(&request.font_family).map(strip_font_family).unwrap_or_default();

    if !is_font_supported(&family, style, weight) {
        return FontSettings {
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_style: DEFAULT_FONT_STYLE.to_string(),
            font_weight: DEFAULT_FONT_WEIGHT.to_string(),
            font_size: size.to_string(),
        };
    }

    FontSettings {
        font_family: family,
        font_style: style.to_string(),
        font_weight: weight.to_string(),
        font_size: size.to_string(),
    }
}
