use crate::format::{CodecSettings, Format};
use crate::importers::Importer;
use anyhow::{anyhow, bail, Context};
use convector_core::{
    export, Canvas, Drawing, ExportOptions, FontConfig, ResolvedFontConfig,
};
use std::path::Path;

lazy_static! {
    /// System fonts, scanned on first use and shared by every converter
    /// without its own font configuration.
    static ref SYSTEM_FONTS: ResolvedFontConfig = FontConfig::default().resolve();
}

/// Conversion settings.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub export: ExportOptions,
    /// Fonts used for text. `None` selects the system fonts.
    pub fonts: Option<FontConfig>,
    /// Pen width for paths read from G-code, in millimetres.
    pub gcode_stroke_width: f64,
    /// Distance between the polargraph motors, in machine steps.
    pub polargraph_width: f64,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            export: ExportOptions::default(),
            fonts: None,
            gcode_stroke_width: 1.0,
            polargraph_width: crate::exporters::polargraph::DEFAULT_MACHINE_WIDTH,
        }
    }
}

/// Converts documents between formats.
///
/// # Examples
///
/// ```no_run
/// use convector_rs::{Converter, Format};
///
/// let converter = Converter::default();
/// let svg = b"<svg xmlns='http://www.w3.org/2000/svg'><rect width='10' height='10'/></svg>";
/// let gcode = converter.convert(svg, Format::Svg, Format::GCode).unwrap();
/// assert!(gcode.starts_with(b"G21\n"));
/// ```
pub struct Converter {
    options: ConvertOptions,
    fonts: ResolvedFontConfig,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        let fonts = match &options.fonts {
            Some(config) => config.resolve(),
            None => SYSTEM_FONTS.clone(),
        };
        log::debug!(target: "convert", "{} font faces available", fonts.face_count());
        Self { options, fonts }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    fn settings(&self) -> CodecSettings {
        CodecSettings {
            gcode_stroke_width: self.options.gcode_stroke_width,
            polargraph_width: self.options.polargraph_width,
        }
    }

    /// Decode `input` into a drawing.
    pub fn decode(&self, input: &[u8], from: Format) -> anyhow::Result<Drawing> {
        let mut importer: Box<dyn Importer> = from
            .importer(&self.settings())
            .ok_or_else(|| anyhow!("{} input is not supported", from))?;
        let mut canvas = Canvas::with_resolved(&self.fonts);
        importer
            .process(input, &mut canvas)
            .with_context(|| format!("Failed to read {} input", from))?;
        let drawing = canvas.into_drawing();
        log::debug!(target: "convert", "decoded {} splashes from {}", drawing.len(), from);
        Ok(drawing)
    }

    /// Encode a drawing.
    pub fn encode(&self, drawing: Drawing, to: Format) -> anyhow::Result<Vec<u8>> {
        let mut exporter = to
            .exporter(&self.settings())
            .ok_or_else(|| anyhow!("{} output is not supported", to))?;
        let mut out = Vec::new();
        export(exporter.as_mut(), drawing, &self.options.export, &mut out)
            .with_context(|| format!("Failed to write {} output", to))?;
        Ok(out)
    }

    pub fn convert(&self, input: &[u8], from: Format, to: Format) -> anyhow::Result<Vec<u8>> {
        // Fail before decoding when there is nothing to encode with
        if to.exporter(&self.settings()).is_none() {
            bail!("{} output is not supported", to);
        }
        let drawing = self.decode(input, from)?;
        self.encode(drawing, to)
    }

    /// Convert between files, choosing formats by extension. The output file
    /// is only created once the conversion has succeeded.
    pub fn convert_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> anyhow::Result<()> {
        let (input, output) = (input.as_ref(), output.as_ref());
        let from = Format::from_path(input)
            .ok_or_else(|| anyhow!("Unknown input format: {}", input.display()))?;
        let to = Format::from_path(output)
            .ok_or_else(|| anyhow!("Unknown output format: {}", output.display()))?;
        let data = std::fs::read(input)
            .with_context(|| format!("Failed to read input file: {}", input.display()))?;
        let result = self.convert(&data, from, to)?;
        std::fs::write(output, result)
            .with_context(|| format!("Failed to write output file: {}", output.display()))?;
        Ok(())
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConvertOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convector_core::ConvectorError;

    fn converter() -> Converter {
        Converter::new(ConvertOptions {
            fonts: Some(FontConfig::with_fonts(Vec::new())),
            ..ConvertOptions::default()
        })
    }

    #[test]
    fn test_svg_to_gcode() {
        let svg = b"<svg xmlns='http://www.w3.org/2000/svg'><rect width='10' height='10'/></svg>";
        let out = converter().convert(svg, Format::Svg, Format::GCode).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("G21\nG0 "));
        assert!(text.ends_with("M30\n"));
    }

    #[test]
    fn test_unreadable_format() {
        let err = converter()
            .convert(b"", Format::Pdf, Format::Svg)
            .unwrap_err();
        assert!(err.to_string().contains("pdf input is not supported"));
    }

    #[test]
    fn test_typed_error_is_kept() {
        let err = converter()
            .convert(b"G2 X1 Y1", Format::GCode, Format::Svg)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvectorError>(),
            Some(ConvectorError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_failed_conversion_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.ps");
        let output = dir.path().join("out.svg");
        std::fs::write(&input, "1 add").unwrap();
        assert!(converter().convert_file(&input, &output).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_unknown_extension() {
        let err = converter().convert_file("a.txt", "b.svg").unwrap_err();
        assert!(err.to_string().contains("Unknown input format"));
    }
}
