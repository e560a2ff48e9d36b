use anyhow::Result;
use clap::{Parser, Subcommand};
use lif2ometiff::convert::{ConvertOptions, convert_path, find_inputs};
use lif2ometiff::error::Error;
use lif2ometiff::metadata::SeriesMetadata;
use lif2ometiff::ome_tiff::{TiffCompression, TiffOptions};
use lif2ometiff::reader::{PixelType, Reader};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(arg_required_else_help = true, version, about, long_about = None, propagate_version = true)]
struct Cli {
    /// Print debug output
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a .lif file, or all .lif files in a directory, into OME-TIFF files
    Convert {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(value_name = "OUTPUT_DIR")]
        output: PathBuf,
        #[arg(short, long, value_name = "OVERWRITE")]
        overwrite: bool,
        /// Compression: deflate (zlib), lzw or none
        #[arg(short, long, value_name = "COMPRESSION", default_value = "deflate")]
        compression: TiffCompression,
        /// Pixel type to write (u8, u16, float, ...), default is the type in the file
        #[arg(short, long, value_name = "PIXEL_TYPE")]
        pixel_type: Option<PixelType>,
        /// Show a progress bar while writing
        #[arg(short, long)]
        bar: bool,
        /// Convert several files at the same time
        #[arg(long)]
        parallel: bool,
    },
    /// Print some metadata for every series
    Info {
        #[arg(value_name = "FILE", num_args(1..))]
        file: Vec<PathBuf>,
    },
    /// Download the BioFormats jar into the correct folder
    DownloadBioFormats {
        #[arg(short, long, value_name = "GPL_FORMATS")]
        gpl_formats: bool,
    },
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "lif2ometiff=debug"
    } else {
        "lif2ometiff=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .init();
}

pub(crate) fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Convert {
            input,
            output,
            overwrite,
            compression,
            pixel_type,
            bar,
            parallel,
        } => {
            let tiff = TiffOptions::new(*bar, *compression, *overwrite)?;
            let options = ConvertOptions {
                tiff,
                pixel_type: *pixel_type,
                parallel: *parallel,
            };
            match convert_path(input, output, &options) {
                Ok(written) => info!("{} files written", written.len()),
                Err(Error::NoInput(path)) => warn!(
                    "{path} is neither a .lif file nor a directory containing .lif files"
                ),
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Info { file } => {
            for f in file {
                for path in find_inputs(f)? {
                    let mut reader = Reader::new(&path, 0)?;
                    let ome = reader.get_ome()?;
                    println!("path/filename: {}", path.display());
                    for series in 0..reader.series_count()? {
                        reader.set_series(series)?;
                        let metadata = SeriesMetadata::from_ome(&ome, series)?;
                        print!("{}", metadata.summary());
                        println!("dtype:         {:?}\n", reader.pixel_type);
                    }
                }
            }
        }
        Commands::DownloadBioFormats { gpl_formats } => {
            lif2ometiff::download_bioformats(*gpl_formats)?
        }
    }

    Ok(())
}
