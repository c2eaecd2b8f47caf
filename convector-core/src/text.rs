//! Glyph outlines appended to the canvas path.

use crate::canvas::Canvas;
use fontdb::{Family, Query, Stretch, Style, Weight};
use kurbo::{Affine, BezPath, PathEl, Point};

/// Collects a glyph outline in user space.
struct OutlineCollector {
    path: BezPath,
    transform: Affine,
}

impl OutlineCollector {
    fn point(&self, x: f32, y: f32) -> Point {
        self.transform * Point::new(x as f64, y as f64)
    }
}

impl ttf_parser::OutlineBuilder for OutlineCollector {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.point(x, y);
        self.path.move_to(p);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.point(x, y);
        self.path.line_to(p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let c = self.point(x1, y1);
        let p = self.point(x, y);
        self.path.quad_to(c, p);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let c1 = self.point(x1, y1);
        let c2 = self.point(x2, y2);
        let p = self.point(x, y);
        self.path.curve_to(c1, c2, p);
    }

    fn close(&mut self) {
        self.path.close_path();
    }
}

/// Font request derived from a family name such as `Helvetica-BoldOblique`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FontRequest {
    pub name: String,
    pub generic: Option<GenericFamily>,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum GenericFamily {
    SansSerif,
    Serif,
    Monospace,
}

impl GenericFamily {
    fn family(self) -> Family<'static> {
        match self {
            GenericFamily::SansSerif => Family::SansSerif,
            GenericFamily::Serif => Family::Serif,
            GenericFamily::Monospace => Family::Monospace,
        }
    }
}

pub(crate) fn parse_family(family: &str) -> FontRequest {
    let family = family.trim().trim_start_matches('/').trim_matches(|c| c == '"' || c == '\'');
    let lower = family.to_ascii_lowercase();
    let (base, variant) = match family.split_once('-') {
        Some((base, variant)) if !lower.starts_with("sans-") => (base, variant.to_ascii_lowercase()),
        _ => (family, String::new()),
    };
    let base_lower = base.to_ascii_lowercase();
    let generic = if base_lower == "sans-serif" || base_lower.starts_with("helvetica") || base_lower.starts_with("arial") {
        Some(GenericFamily::SansSerif)
    } else if base_lower == "serif" || base_lower.starts_with("times") {
        Some(GenericFamily::Serif)
    } else if base_lower == "monospace" || base_lower.starts_with("courier") {
        Some(GenericFamily::Monospace)
    } else {
        None
    };
    FontRequest {
        name: base.to_string(),
        generic,
        bold: variant.contains("bold") || lower.contains(" bold"),
        italic: variant.contains("italic")
            || variant.contains("oblique")
            || lower.contains(" italic"),
    }
}

impl Canvas {
    /// Append the outlines of `text` at the current point in the current font.
    ///
    /// Glyphs are laid out along the user-space X axis with the font's Y axis
    /// pointing up. The current point advances past the last glyph.
    pub fn char_path(&mut self, text: &str) {
        log::debug!(target: "canvas", "charPath {:?}", text);
        let Some(db) = self.fonts.clone() else {
            log::warn!(target: "canvas", "no font database, text {:?} not drawn", text);
            return;
        };
        let request = parse_family(&self.state.font.family);
        let mut families = vec![Family::Name(&request.name)];
        if let Some(generic) = request.generic {
            families.push(generic.family());
        }
        families.push(Family::SansSerif);
        let query = Query {
            families: &families,
            weight: if request.bold { Weight::BOLD } else { Weight::NORMAL },
            stretch: Stretch::Normal,
            style: if request.italic { Style::Italic } else { Style::Normal },
        };
        let Some(id) = db.query(&query) else {
            log::warn!(target: "canvas", "no font matches {:?}, text not drawn", self.state.font.family);
            return;
        };

        let origin = self.current_point().unwrap_or(Point::ORIGIN);
        let size = self.state.font.size;
        let outlines = db
            .with_face_data(id, |data, index| {
                let face = ttf_parser::Face::parse(data, index).ok()?;
                let scale = size / face.units_per_em() as f64;
                let mut path = BezPath::new();
                let mut advance = 0.0;
                for ch in text.chars() {
                    let Some(glyph) = face.glyph_index(ch) else {
                        continue;
                    };
                    let mut collector = OutlineCollector {
                        path: BezPath::new(),
                        transform: Affine::translate((origin.x + advance, origin.y))
                            * Affine::scale(scale),
                    };
                    face.outline_glyph(glyph, &mut collector);
                    path.extend(collector.path.elements().iter().copied());
                    advance += face.glyph_hor_advance(glyph).unwrap_or(0) as f64 * scale;
                }
                Some((path, advance))
            })
            .flatten();
        let Some((glyphs, advance)) = outlines else {
            log::warn!(target: "canvas", "font face could not be parsed, text not drawn");
            return;
        };

        let ctm = Affine::from(self.state.transform);
        for el in glyphs.elements() {
            match *el {
                PathEl::MoveTo(p) => {
                    self.path.move_to(ctm * p);
                    self.subpath_start = Some(ctm * p);
                    self.subpath_closed = false;
                }
                PathEl::LineTo(p) => self.path.line_to(ctm * p),
                PathEl::QuadTo(c, p) => self.path.quad_to(ctm * c, ctm * p),
                PathEl::CurveTo(c1, c2, p) => self.path.curve_to(ctm * c1, ctm * c2, ctm * p),
                PathEl::ClosePath => self.path.close_path(),
            }
        }
        let end = self.state.transform.apply(origin.x + advance, origin.y);
        self.current = Some(end);
        self.subpath_start = Some(end);
        self.subpath_closed = true;
        self.last_control = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font_config::FontConfig;

    #[test]
    fn test_parse_postscript_names() {
        let request = parse_family("/Helvetica-BoldOblique");
        assert_eq!(request.name, "Helvetica");
        assert_eq!(request.generic, Some(GenericFamily::SansSerif));
        assert!(request.bold);
        assert!(request.italic);

        let request = parse_family("Times-Roman");
        assert_eq!(request.generic, Some(GenericFamily::Serif));
        assert!(!request.bold);
    }

    #[test]
    fn test_parse_generic_and_plain_names() {
        assert_eq!(parse_family("sans-serif").generic, Some(GenericFamily::SansSerif));
        assert_eq!(parse_family("'Courier New'").generic, Some(GenericFamily::Monospace));
        let request = parse_family("Fira Sans");
        assert_eq!(request.name, "Fira Sans");
        assert_eq!(request.generic, None);
    }

    #[test]
    fn test_char_path_without_fonts_draws_nothing() {
        let mut canvas = Canvas::new();
        canvas.move_to(10.0, 10.0);
        canvas.char_path("Hello");
        assert_eq!(canvas.path().elements().len(), 1);
    }

    #[test]
    fn test_char_path_with_empty_database_draws_nothing() {
        let mut canvas = Canvas::with_config(&FontConfig::with_fonts(Vec::new()));
        canvas.char_path("Hello");
        assert!(canvas.path().elements().is_empty());
    }
}
