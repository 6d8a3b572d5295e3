//! Fluxify - File Format Conversion Engine
//!
//! Routes an (input extension, target format) pair to one of several
//! conversion strategies, each driving an external, format-specific tool
//! (ffmpeg, LibreOffice, poppler, tesseract, pandoc, ImageMagick, pdflatex)
//! or an in-process codec. Fragile conversions run through ordered fallback
//! chains.

pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod fallback;
pub mod registry;
pub mod tool;

pub use convert::{ConversionOptions, ConversionOutput, ConversionRequest, ConverterTrait};
pub use error::{FluxifyError, Result};
pub use registry::{Registry, RegistryBuilder};
