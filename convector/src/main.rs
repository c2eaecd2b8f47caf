use anyhow::Context;
use clap::Parser;
use convector_rs::convector_core::{ExportOptions, FontConfig, DEFAULT_FLATNESS};
use convector_rs::{ConvertOptions, Converter, Format};
use std::path::PathBuf;
use std::process::ExitCode;

/// convector: A utility for converting vector drawings between pen plotter
/// and interchange formats
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the input drawing. Its extension selects the decoder
    pub input: PathBuf,

    /// Path to the output file to be created. Its extension selects the encoder
    pub output: PathBuf,

    /// Maximum deviation of flattened curves, in units of 1/65535 of the drawing size
    #[clap(long, default_value_t = DEFAULT_FLATNESS)]
    pub flatness: f64,

    /// Distance between the polargraph motors, in machine steps
    #[clap(long, default_value_t = 1000.0)]
    pub polargraph_width: f64,

    /// Pen width used for paths read from G-code, in millimetres
    #[clap(long, default_value_t = 1.0)]
    pub pen_width: f64,

    /// Do not load system fonts
    #[clap(long)]
    pub no_system_fonts: bool,

    /// Additional directory to load fonts from. May be repeated
    #[clap(long)]
    pub font_dir: Vec<PathBuf>,

    /// Print debug logging
    #[clap(short, long)]
    pub verbose: bool,
}

fn main() -> ExitCode {
    let args: Args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    // Report unknown extensions before scanning fonts
    for path in [&args.input, &args.output] {
        if Format::from_path(path).is_none() {
            anyhow::bail!(
                "Unknown format for {}. Known extensions: {}",
                path.display(),
                known_extensions()
            );
        }
    }

    let fonts = if args.no_system_fonts || !args.font_dir.is_empty() {
        Some(FontConfig {
            load_system_fonts: !args.no_system_fonts,
            font_dirs: args.font_dir.clone(),
            ..FontConfig::default()
        })
    } else {
        None
    };

    let converter = Converter::new(ConvertOptions {
        export: ExportOptions {
            flatness: args.flatness,
        },
        fonts,
        gcode_stroke_width: args.pen_width,
        polargraph_width: args.polargraph_width,
    });
    converter
        .convert_file(&args.input, &args.output)
        .with_context(|| format!("Failed to convert {}", args.input.display()))?;
    log::info!("wrote {}", args.output.display());
    Ok(())
}

fn known_extensions() -> String {
    Format::all()
        .flat_map(|f| f.extensions().iter().copied())
        .collect::<Vec<_>>()
        .join(", ")
}
