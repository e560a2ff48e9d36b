use crate::error::Error;
use crate::metadata::SeriesMetadata;
use crate::reader::PixelType;
use ::tiff::encoder::colortype::{
    ColorType, Gray8, Gray16, Gray32, Gray32Float, Gray64Float, GrayI8, GrayI16, GrayI32,
};
use ::tiff::encoder::compression::{Compression, Deflate, DeflateLevel, Lzw, Uncompressed};
use ::tiff::encoder::{Rational, TiffEncoder, TiffValue};
use ::tiff::tags::{ResolutionUnit, Tag};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array3, Axis};
use quick_xml::escape::escape;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tracing::debug;

const OME_NAMESPACE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06";

/// Compression of the tiff strips
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TiffCompression {
    /// zlib, as tifffile's compression='zlib'
    #[default]
    Deflate,
    Lzw,
    None,
}

impl std::str::FromStr for TiffCompression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deflate" | "zlib" => Ok(TiffCompression::Deflate),
            "lzw" => Ok(TiffCompression::Lzw),
            "none" | "uncompressed" => Ok(TiffCompression::None),
            _ => Err(Error::InvalidCompression(s.to_string())),
        }
    }
}

#[derive(Clone, Default)]
pub struct TiffOptions {
    bar: Option<ProgressStyle>,
    compression: TiffCompression,
    overwrite: bool,
}

impl TiffOptions {
    pub fn new(bar: bool, compression: TiffCompression, overwrite: bool) -> Result<Self, Error> {
        let mut options = Self {
            bar: None,
            compression,
            overwrite,
        };
        if bar {
            options.enable_bar()?;
        }
        Ok(options)
    }

    /// show a progress bar while saving tiff
    pub fn enable_bar(&mut self) -> Result<(), Error> {
        self.bar = Some(ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}, {percent}%] [{wide_bar:.green/lime}] {pos:>7}/{len:7} ({eta_precise}, {per_sec:<5})",
        )?.progress_chars("▰▱▱"));
        Ok(())
    }

    pub fn set_overwrite(&mut self, overwrite: bool) {
        self.overwrite = overwrite;
    }
}

/// Pixel types that can be written as single sample grayscale tiff pages.
pub trait Sample: Copy + 'static {
    type Color: ColorType<Inner = Self>;
}

macro_rules! impl_sample {
    ($($t:ty: $c:ty $(,)?)*) => {
        $(
            impl Sample for $t {
                type Color = $c;
            }
        )*
    };
}

impl_sample! {
    i8: GrayI8
    u8: Gray8
    i16: GrayI16
    u16: Gray16
    i32: GrayI32
    u32: Gray32
    f32: Gray32Float
    f64: Gray64Float
}

/// pixels per centimeter for a pixel size in µm
fn resolution(pixel_size: f64) -> Rational {
    let d = 1000u32;
    let n = (1e7 / pixel_size).round().clamp(1.0, u32::MAX as f64) as u32;
    Rational { n, d }
}

/// Small metadata block attached to every output file, the stack axes are always (Z)TYX.
#[derive(Clone, Debug, PartialEq)]
pub struct OmeBlock {
    pub name: String,
    pub acquisition_date: Option<String>,
    /// µm
    pub physical_size_x: Option<f64>,
    /// µm
    pub physical_size_y: Option<f64>,
    pub pixel_type: PixelType,
    pub size_x: usize,
    pub size_y: usize,
    pub size_z: usize,
    pub size_t: usize,
}

impl OmeBlock {
    pub fn new(metadata: &SeriesMetadata, channel: usize, pixel_type: PixelType) -> Self {
        Self {
            name: metadata.channel_label(channel),
            acquisition_date: metadata.acquisition_date.clone(),
            physical_size_x: metadata.physical_size_x,
            physical_size_y: metadata.physical_size_y,
            pixel_type,
            size_x: metadata.size_x,
            size_y: metadata.size_y,
            size_z: metadata.size_z.max(1),
            size_t: metadata.size_t,
        }
    }

    pub fn axes(&self) -> &'static str {
        if self.size_z > 1 { "ZTYX" } else { "TYX" }
    }

    /// mean of x and y pixel size in µm
    pub fn pixel_size(&self) -> Option<f64> {
        match (self.physical_size_x, self.physical_size_y) {
            (Some(x), Some(y)) => Some((x + y) / 2.0),
            (Some(x), None) => Some(x),
            (None, Some(y)) => Some(y),
            (None, None) => None,
        }
    }

    /// Render as a minimal single image OME-XML document.
    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><OME xmlns="{OME_NAMESPACE}"><Image ID="Image:0" Name="{}">"#,
            escape(self.name.as_str())
        );
        if let Some(date) = &self.acquisition_date {
            xml.push_str(&format!(
                "<AcquisitionDate>{}</AcquisitionDate>",
                escape(date.as_str())
            ));
        }
        xml.push_str(&format!(
            r#"<Pixels ID="Pixels:0" DimensionOrder="XYZCT" Type="{}" SizeX="{}" SizeY="{}" SizeZ="{}" SizeC="1" SizeT="{}""#,
            self.pixel_type.ome_name(),
            self.size_x,
            self.size_y,
            self.size_z,
            self.size_t
        ));
        if let Some(x) = self.physical_size_x {
            xml.push_str(&format!(r#" PhysicalSizeX="{x}" PhysicalSizeXUnit="µm""#));
        }
        if let Some(y) = self.physical_size_y {
            xml.push_str(&format!(r#" PhysicalSizeY="{y}" PhysicalSizeYUnit="µm""#));
        }
        xml.push_str(&format!(
            r#"><Channel ID="Channel:0:0" SamplesPerPixel="1"/><TiffData IFD="0" PlaneCount="{}"/></Pixels></Image></OME>"#,
            self.size_z * self.size_t
        ));
        xml
    }
}

/// Save one stack per z-slice, each of shape (t, y, x), as a multi-page OME-TIFF.
///
/// Pages are ordered z fastest, then t (DimensionOrder XYZCT with a single channel); the OME-XML
/// block is the ImageDescription of the first page.
pub fn save_stacks<T, P>(
    path: P,
    stacks: &[Array3<T>],
    block: &OmeBlock,
    options: &TiffOptions,
) -> Result<(), Error>
where
    P: AsRef<Path>,
    T: Sample,
    [T]: TiffValue,
{
    let path = path.as_ref().to_path_buf();
    if path.exists() {
        if options.overwrite {
            std::fs::remove_file(&path)?;
        } else {
            return Err(Error::FileAlreadyExists(path.display().to_string()));
        }
    }
    debug!("writing {} ({})", path.display(), block.axes());
    let mut writer = BufWriter::new(File::create(&path)?);
    match options.compression {
        TiffCompression::Deflate => write_pages(
            &mut writer,
            stacks,
            block,
            options,
            Deflate::with_level(DeflateLevel::Balanced),
        )?,
        TiffCompression::Lzw => write_pages(&mut writer, stacks, block, options, Lzw::default())?,
        TiffCompression::None => {
            write_pages(&mut writer, stacks, block, options, Uncompressed::default())?
        }
    }
    writer.flush()?;
    Ok(())
}

fn write_pages<W, T, D>(
    writer: &mut W,
    stacks: &[Array3<T>],
    block: &OmeBlock,
    options: &TiffOptions,
    compression: D,
) -> Result<(), Error>
where
    W: Write + Seek,
    T: Sample,
    [T]: TiffValue,
    D: Compression + Clone,
{
    let size_t = stacks.first().map(|s| s.len_of(Axis(0))).unwrap_or(0);
    if stacks.iter().any(|s| s.len_of(Axis(0)) != size_t) {
        return Err(ndarray::ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into());
    }
    let description = block.to_xml();
    let mut encoder = TiffEncoder::new(writer)?;
    let bar = options
        .bar
        .as_ref()
        .map(|style| ProgressBar::new((size_t * stacks.len()) as u64).with_style(style.clone()));
    for t in 0..size_t {
        for (z, stack) in stacks.iter().enumerate() {
            let plane = stack.index_axis(Axis(0), t);
            let (height, width) = plane.dim();
            let data = plane.iter().copied().collect::<Vec<T>>();
            let mut image = encoder.new_image_with_compression::<T::Color, D>(
                width as u32,
                height as u32,
                compression.clone(),
            )?;
            if t == 0 && z == 0 {
                image
                    .encoder()
                    .write_tag(Tag::ImageDescription, description.as_str())?;
            }
            if let Some(pixel_size) = block.pixel_size() {
                image.resolution(ResolutionUnit::Centimeter, resolution(pixel_size));
            }
            image.write_data(&data)?;
            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }
    }
    if let Some(bar) = bar {
        bar.finish();
    }
    Ok(())
}

/// Save a single (t, y, x) stack as a multi-page OME-TIFF.
pub fn save_stack<T, P>(
    path: P,
    stack: &Array3<T>,
    block: &OmeBlock,
    options: &TiffOptions,
) -> Result<(), Error>
where
    P: AsRef<Path>,
    T: Sample,
    [T]: TiffValue,
{
    save_stacks(path, std::slice::from_ref(stack), block, options)
}
