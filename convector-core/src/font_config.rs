//! Font database configuration for glyph outlines.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Where glyph outlines for `char_path` come from.
#[derive(Clone, Debug)]
pub struct FontConfig {
    /// Raw font files (TTF/OTF) to register.
    pub custom_fonts: Vec<Arc<Vec<u8>>>,
    /// Whether to load system fonts (default: true).
    pub load_system_fonts: bool,
    /// Additional directories to scan for font files.
    pub font_dirs: Vec<PathBuf>,
    /// Preferred concrete families for the generic families, in priority order.
    pub sans_serif: Vec<String>,
    pub serif: Vec<String>,
    pub monospace: Vec<String>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            custom_fonts: Vec::new(),
            load_system_fonts: true,
            font_dirs: Vec::new(),
            sans_serif: vec![
                "Helvetica".into(),
                "Arial".into(),
                "Liberation Sans".into(),
                "DejaVu Sans".into(),
            ],
            serif: vec![
                "Times".into(),
                "Times New Roman".into(),
                "Liberation Serif".into(),
                "DejaVu Serif".into(),
            ],
            monospace: vec![
                "Courier".into(),
                "Courier New".into(),
                "Liberation Mono".into(),
                "DejaVu Sans Mono".into(),
            ],
        }
    }
}

impl FontConfig {
    /// Configuration that only uses the given font files.
    pub fn with_fonts(fonts: Vec<Vec<u8>>) -> Self {
        Self {
            custom_fonts: fonts.into_iter().map(Arc::new).collect(),
            load_system_fonts: false,
            ..Self::default()
        }
    }

    /// Scan fonts once; the result can be shared between canvases.
    pub fn resolve(&self) -> ResolvedFontConfig {
        ResolvedFontConfig::new(self)
    }
}

/// A [`FontConfig`] loaded into a shared font database.
#[derive(Clone)]
pub struct ResolvedFontConfig {
    pub(crate) fontdb: Arc<fontdb::Database>,
}

impl ResolvedFontConfig {
    pub fn new(config: &FontConfig) -> Self {
        Self {
            fontdb: Arc::new(font_config_to_fontdb(config)),
        }
    }

    pub fn face_count(&self) -> usize {
        self.fontdb.len()
    }
}

/// Build a [`fontdb::Database`] from a [`FontConfig`].
pub fn font_config_to_fontdb(config: &FontConfig) -> fontdb::Database {
    let mut db = fontdb::Database::new();
    if config.load_system_fonts {
        db.load_system_fonts();
    }
    for dir in &config.font_dirs {
        db.load_fonts_dir(dir);
    }
    for data in &config.custom_fonts {
        db.load_font_data(Vec::from(data.as_slice()));
    }

    let available: HashSet<String> = db
        .faces()
        .flat_map(|face| face.families.iter().map(|(family, _)| family.clone()))
        .collect();
    let pick = |candidates: &[String]| candidates.iter().find(|f| available.contains(*f)).cloned();
    if let Some(family) = pick(&config.sans_serif) {
        db.set_sans_serif_family(family);
    }
    if let Some(family) = pick(&config.serif) {
        db.set_serif_family(family);
    }
    if let Some(family) = pick(&config.monospace) {
        db.set_monospace_family(family);
    }
    log::debug!(target: "canvas", "font database with {} faces", db.len());
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FontConfig::default();
        assert!(config.load_system_fonts);
        assert!(config.custom_fonts.is_empty());
        assert_eq!(config.sans_serif[0], "Helvetica");
    }

    #[test]
    fn test_no_system_fonts_gives_empty_db() {
        let config = FontConfig::with_fonts(Vec::new());
        assert_eq!(config.resolve().face_count(), 0);
    }

    #[test]
    fn test_invalid_font_data_is_skipped() {
        let config = FontConfig::with_fonts(vec![b"not a font".to_vec()]);
        assert_eq!(config.resolve().face_count(), 0);
    }
}
