//! Style types and enums for canvas operations.

use std::fmt;

/// Paint below this opacity is treated as invisible.
pub const MIN_ALPHA: f64 = 0.25;

/// 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Color from unit-range components, clamped.
    pub fn from_unit(r: f64, g: f64, b: f64, a: f64) -> Self {
        fn channel(v: f64) -> u8 {
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        Self::rgba(channel(r), channel(g), channel(b), channel(a))
    }

    pub fn alpha(&self) -> f64 {
        self.a as f64 / 255.0
    }

    /// Same color with its opacity multiplied by `factor`.
    pub fn with_opacity(self, factor: f64) -> Self {
        Self {
            a: (self.a as f64 * factor.clamp(0.0, 1.0)).round() as u8,
            ..self
        }
    }

    pub fn is_visible(&self) -> bool {
        self.alpha() >= MIN_ALPHA
    }

    /// Unit-range RGB components.
    pub fn to_unit_rgb(&self) -> (f64, f64, f64) {
        (
            self.r as f64 / 255.0,
            self.g as f64 / 255.0,
            self.b as f64 / 255.0,
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl fmt::Display for Color {
    /// `#rrggbb`, opacity omitted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Paint selected for one painting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Paint {
    /// Use the base color.
    #[default]
    Base,
    /// Paint nothing.
    None,
    /// Solid color.
    Color(Color),
}

impl From<Color> for Paint {
    fn from(color: Color) -> Self {
        Paint::Color(color)
    }
}

/// Which of the three canvas colors a paint setter addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Base,
    Fill,
    Stroke,
}

/// Line cap style for stroke operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    /// Flat edge at the endpoint.
    #[default]
    Butt,
    /// Rounded edge extending past the endpoint.
    Round,
    /// Square edge extending past the endpoint.
    Square,
}

impl From<LineCap> for kurbo::Cap {
    fn from(cap: LineCap) -> Self {
        match cap {
            LineCap::Butt => kurbo::Cap::Butt,
            LineCap::Round => kurbo::Cap::Round,
            LineCap::Square => kurbo::Cap::Square,
        }
    }
}

/// Line join style for stroke operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    /// Sharp corner.
    #[default]
    Miter,
    /// Rounded corner.
    Round,
    /// Beveled corner.
    Bevel,
}

impl From<LineJoin> for kurbo::Join {
    fn from(join: LineJoin) -> Self {
        match join {
            LineJoin::Miter => kurbo::Join::Miter,
            LineJoin::Round => kurbo::Join::Round,
            LineJoin::Bevel => kurbo::Join::Bevel,
        }
    }
}

/// Fill rule for path operations.
///
/// Determines how the interior of a self-intersecting path is calculated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindingRule {
    /// Non-zero winding rule (default).
    #[default]
    NonZero,
    /// Even-odd rule.
    EvenOdd,
}

impl WindingRule {
    /// Whether a point with the given winding number is inside.
    pub fn contains(&self, winding: i32) -> bool {
        match self {
            WindingRule::NonZero => winding != 0,
            WindingRule::EvenOdd => winding % 2 != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_display_is_hex() {
        assert_eq!(Color::rgb(255, 0, 16).to_string(), "#ff0010");
    }

    #[test]
    fn test_visibility_threshold() {
        assert!(Color::rgba(0, 0, 0, 64).is_visible());
        assert!(!Color::rgba(0, 0, 0, 63).is_visible());
        assert!(!Color::BLACK.with_opacity(0.2).is_visible());
    }

    #[test]
    fn test_winding_rule_contains() {
        assert!(WindingRule::NonZero.contains(2));
        assert!(!WindingRule::EvenOdd.contains(2));
        assert!(WindingRule::EvenOdd.contains(-1));
    }
}
