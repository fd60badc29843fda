use std::path::PathBuf;

/// EMU per centimetre.
const EMU_PER_CM: f64 = 360_000.0;

/// Fixed presentation size of every inserted image, in EMU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    pub width_emu: u64,
    pub height_emu: u64,
}

impl ImageSize {
    pub fn from_cm(width: f64, height: f64) -> Self {
        ImageSize {
            width_emu: (width * EMU_PER_CM).round() as u64,
            height_emu: (height * EMU_PER_CM).round() as u64,
        }
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        ImageSize::from_cm(11.56, 6.92)
    }
}

/// Everything one generation needs besides the template and the findings.
#[derive(Clone, Debug)]
pub struct GenerateConfig {
    /// Directory holding one asset folder per finding.
    pub asset_base: Option<PathBuf>,
    /// Extensions tried, in order, for step image `<n>.<ext>`.
    pub image_extensions: Vec<String>,
    pub image_size: ImageSize,
    /// Font for runs created from scratch (cleared cells, links, step text).
    pub value_font: Option<String>,
    pub max_template_bytes: u64,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        GenerateConfig {
            asset_base: None,
            image_extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
            image_size: ImageSize::default(),
            value_font: Some("Tahoma".into()),
            max_template_bytes: 50 * 1024 * 1024,
        }
    }
}

impl GenerateConfig {
    pub fn with_asset_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.asset_base = Some(base.into());
        self
    }
}
