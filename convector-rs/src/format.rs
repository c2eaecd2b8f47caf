//! Formats known to the converter and the extension table that selects them.

use crate::exporters::{
    dov::DovExporter, gcode::GCodeExporter, mvg::MvgExporter, pdf::PdfExporter,
    png::PngExporter, polargraph::PolargraphExporter, ps::PsExporter, svg::SvgExporter,
};
use crate::importers::{
    dov::DovImporter, gcode::GCodeImporter, ps::PsImporter, svg::SvgImporter, Importer,
};
use convector_core::Exporter;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    GCode,
    Svg,
    PostScript,
    Pdf,
    Dov,
    Mvg,
    Polargraph,
    Png,
}

struct FormatEntry {
    format: Format,
    name: &'static str,
    extensions: &'static [&'static str],
}

const FORMATS: &[FormatEntry] = &[
    FormatEntry {
        format: Format::GCode,
        name: "gcode",
        extensions: &["ngc", "glc", "gcode"],
    },
    FormatEntry {
        format: Format::Svg,
        name: "svg",
        extensions: &["svg"],
    },
    FormatEntry {
        format: Format::PostScript,
        name: "ps",
        extensions: &["ps", "pfa", "pfb", "gsf", "eps"],
    },
    FormatEntry {
        format: Format::Pdf,
        name: "pdf",
        extensions: &["pdf"],
    },
    FormatEntry {
        format: Format::Dov,
        name: "dov",
        extensions: &["dov"],
    },
    FormatEntry {
        format: Format::Mvg,
        name: "mvg",
        extensions: &["mvg"],
    },
    FormatEntry {
        format: Format::Polargraph,
        name: "polargraph",
        extensions: &["pg"],
    },
    FormatEntry {
        format: Format::Png,
        name: "png",
        extensions: &["png"],
    },
];

/// Settings the encoders and decoders take at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecSettings {
    pub gcode_stroke_width: f64,
    pub polargraph_width: f64,
}

impl Format {
    pub fn all() -> impl Iterator<Item = Format> {
        FORMATS.iter().map(|e| e.format)
    }

    fn entry(self) -> &'static FormatEntry {
        // Every variant has one row in FORMATS
        FORMATS
            .iter()
            .find(|e| e.format == self)
            .unwrap_or(&FORMATS[0])
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn extensions(self) -> &'static [&'static str] {
        self.entry().extensions
    }

    /// Case-insensitive lookup of a file extension, without the dot.
    pub fn from_extension(extension: &str) -> Option<Format> {
        let extension = extension.to_ascii_lowercase();
        FORMATS
            .iter()
            .find(|e| e.extensions.contains(&extension.as_str()))
            .map(|e| e.format)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Format::from_extension)
    }

    /// Decoder for the format, if it can be read.
    pub fn importer(self, settings: &CodecSettings) -> Option<Box<dyn Importer>> {
        Some(match self {
            Format::GCode => Box::new(GCodeImporter::new(settings.gcode_stroke_width)),
            Format::Svg => Box::new(SvgImporter::new()),
            Format::PostScript => Box::new(PsImporter::new()),
            Format::Dov => Box::new(DovImporter::new()),
            Format::Pdf | Format::Mvg | Format::Polargraph | Format::Png => return None,
        })
    }

    /// Encoder for the format, if it can be written.
    pub fn exporter(self, settings: &CodecSettings) -> Option<Box<dyn Exporter>> {
        Some(match self {
            Format::GCode => Box::new(GCodeExporter::new()),
            Format::Svg => Box::new(SvgExporter::new()),
            Format::PostScript => Box::new(PsExporter::new()),
            Format::Pdf => Box::new(PdfExporter::new()),
            Format::Dov => Box::new(DovExporter::new()),
            Format::Mvg => Box::new(MvgExporter::new()),
            Format::Polargraph => Box::new(PolargraphExporter::new(settings.polargraph_width)),
            Format::Png => Box::new(PngExporter::new()),
        })
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFormat(pub String);

impl fmt::Display for UnknownFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown format: {}", self.0)
    }
}

impl std::error::Error for UnknownFormat {}

impl FromStr for Format {
    type Err = UnknownFormat;

    /// A format name or one of its extensions.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        FORMATS
            .iter()
            .find(|e| e.name == lower)
            .map(|e| e.format)
            .or_else(|| Format::from_extension(&lower))
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("drawing.ngc", Some(Format::GCode))]
    #[case("drawing.GCODE", Some(Format::GCode))]
    #[case("dir.v2/drawing.Svg", Some(Format::Svg))]
    #[case("font.pfb", Some(Format::PostScript))]
    #[case("page.eps", Some(Format::PostScript))]
    #[case("out.pg", Some(Format::Polargraph))]
    #[case("out.dov", Some(Format::Dov))]
    #[case("out.txt", None)]
    #[case("no_extension", None)]
    fn test_from_path(#[case] path: &str, #[case] expected: Option<Format>) {
        assert_eq!(Format::from_path(path), expected);
    }

    #[test]
    fn test_names_round_trip() {
        for format in Format::all() {
            assert_eq!(format.to_string().parse::<Format>(), Ok(format));
        }
        assert_eq!("PS".parse::<Format>(), Ok(Format::PostScript));
        assert!("jpeg".parse::<Format>().is_err());
    }

    #[test]
    fn test_codec_availability() {
        let settings = CodecSettings {
            gcode_stroke_width: 1.0,
            polargraph_width: 1000.0,
        };
        for format in Format::all() {
            assert!(format.exporter(&settings).is_some(), "{}", format);
        }
        let readable: Vec<Format> = Format::all()
            .filter(|f| f.importer(&settings).is_some())
            .collect();
        assert_eq!(
            readable,
            vec![Format::GCode, Format::Svg, Format::PostScript, Format::Dov]
        );
    }
}
