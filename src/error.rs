use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    J4rs(#[from] j4rs::errors::J4RsError),
    /// ome-metadata reports parse and unit conversion failures as anyhow errors
    #[error(transparent)]
    Ome(#[from] anyhow::Error),
    #[error(transparent)]
    TemplateError(#[from] indicatif::style::TemplateError),
    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),
    #[error("cannot cast {0} to {1}")]
    Cast(String, String),
    #[error("file already exists {0}")]
    FileAlreadyExists(String),
    #[error("not a valid file name")]
    InvalidFileName,
    #[error("unknown pixel type {0}")]
    UnknownPixelType(String),
    #[error("no image or pixels found for series {0}")]
    NoImageOrPixels(usize),
    #[error("series {0} out of bounds, file has {1} series")]
    SeriesOutOfBounds(usize, usize),
    #[error("channel {0} out of bounds, series has {1} channels")]
    ChannelOutOfBounds(usize, usize),
    #[error("{0} is neither a .lif file nor a directory containing .lif files")]
    NoInput(String),
    #[error("invalid compression: {0}")]
    InvalidCompression(String),
}
