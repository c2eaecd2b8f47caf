// Allow uninlined format args for cleaner anyhow!/bail! macros
#![allow(clippy::uninlined_format_args)]
#![doc = include_str!("../README.md")]

pub mod converter;
pub mod exporters;
pub mod format;
pub mod importers;

#[macro_use]
extern crate lazy_static;

pub use anyhow;
pub use convector_core;
pub use converter::{ConvertOptions, Converter};
pub use format::Format;
pub use importers::Importer;
