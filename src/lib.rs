//! Convert Leica `.lif` containers into OME-TIFF files, one per series and channel.
//!
//! Bio-Formats (through a JVM) reads the container, every channel of every series is
//! stacked along its Raman shift (t) axis and written as an OME-TIFF with the `tiff` encoder.
//!
//! ```no_run
//! use lif2ometiff::convert::{ConvertOptions, convert_path};
//!
//! let written = convert_path("scans/", "converted/", &ConvertOptions::default())?;
//! println!("{} files written", written.len());
//! # Ok::<(), lif2ometiff::error::Error>(())
//! ```

mod bioformats;

pub mod convert;
pub mod error;
pub mod metadata;
pub mod ome_tiff;
pub mod reader;
pub mod stack;

pub use bioformats::{BIOFORMATS_VERSION, download_bioformats};
