use crate::error::Error;
use crate::metadata::SeriesMetadata;
use crate::ome_tiff::{OmeBlock, Sample, TiffOptions, save_stacks};
use crate::reader::{PixelType, Reader};
use crate::stack::read_stack;
use ndarray::Array3;
use num::{FromPrimitive, Zero};
use rayon::prelude::*;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tiff::encoder::TiffValue;
use tracing::{info, warn};

const LIF_EXTENSION: &str = "lif";

#[derive(Clone, Default)]
pub struct ConvertOptions {
    pub tiff: TiffOptions,
    /// write this pixel type instead of the one in the file, values must fit
    pub pixel_type: Option<PixelType>,
    /// convert several files at once
    pub parallel: bool,
}

fn is_lif(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(LIF_EXTENSION))
}

/// A .lif file, or all .lif files directly inside a directory, sorted by name.
pub fn find_inputs<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>, Error> {
    let path = path.as_ref();
    if is_lif(path) {
        Ok(vec![path.to_path_buf()])
    } else if path.is_dir() {
        let mut files = path
            .read_dir()?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|p| is_lif(p))
            .collect::<Vec<_>>();
        files.sort();
        Ok(files)
    } else {
        Err(Error::NoInput(path.display().to_string()))
    }
}

/// Create base/stem, or base/stem(1), base/stem(2), ... if that is taken.
pub fn unique_output_dir<P: AsRef<Path>>(base: P, stem: &str) -> Result<PathBuf, Error> {
    let base = base.as_ref();
    std::fs::create_dir_all(base)?;
    let mut dir = base.join(stem);
    let mut counter = 1;
    loop {
        // create_dir is the existence check, so concurrent callers never get the same directory
        match std::fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                dir = base.join(format!("{stem}({counter})"));
                counter += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Series_#_Ch#_label.ome.tiff with 1-based numbers
pub fn output_file_name(series: usize, channel: usize, label: &str) -> String {
    let label = label
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>();
    format!("Series_{}_Ch{}_{}.ome.tiff", series + 1, channel + 1, label)
}

fn write_channel<T>(
    reader: &Reader,
    metadata: &SeriesMetadata,
    channel: usize,
    pixel_type: PixelType,
    path: &Path,
    options: &TiffOptions,
) -> Result<(), Error>
where
    T: Sample + FromPrimitive + Zero,
    [T]: TiffValue,
{
    let stacks = (0..reader.size_z.max(1))
        .map(|z| read_stack::<T>(reader, channel, z))
        .collect::<Result<Vec<Array3<T>>, Error>>()?;
    let block = OmeBlock::new(metadata, channel, pixel_type);
    save_stacks(path, &stacks, &block, options)
}

fn convert_channel(
    reader: &Reader,
    metadata: &SeriesMetadata,
    channel: usize,
    path: &Path,
    options: &ConvertOptions,
) -> Result<(), Error> {
    let pixel_type = options.pixel_type.unwrap_or(reader.pixel_type);
    let tiff = &options.tiff;
    match pixel_type {
        PixelType::I8 => write_channel::<i8>(reader, metadata, channel, pixel_type, path, tiff),
        PixelType::U8 => write_channel::<u8>(reader, metadata, channel, pixel_type, path, tiff),
        PixelType::I16 => write_channel::<i16>(reader, metadata, channel, pixel_type, path, tiff),
        PixelType::U16 => write_channel::<u16>(reader, metadata, channel, pixel_type, path, tiff),
        PixelType::I32 => write_channel::<i32>(reader, metadata, channel, pixel_type, path, tiff),
        PixelType::U32 => write_channel::<u32>(reader, metadata, channel, pixel_type, path, tiff),
        PixelType::F32 => write_channel::<f32>(reader, metadata, channel, pixel_type, path, tiff),
        PixelType::F64 => write_channel::<f64>(reader, metadata, channel, pixel_type, path, tiff),
    }
}

/// Convert every series and channel in one file into base/stem/Series_#_Ch#_label.ome.tiff.
pub fn convert_file<P, Q>(path: P, output_base: Q, options: &ConvertOptions) -> Result<Vec<PathBuf>, Error>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path = path.as_ref();
    info!("Processing file: {}", path.display());
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or(Error::InvalidFileName)?;
    let output_dir = unique_output_dir(output_base, stem)?;

    let mut reader = Reader::new(path, 0)?;
    let ome = reader.get_ome()?;
    let series_count = reader.series_count()?;
    info!("Total series in file: {series_count}");

    let mut written = Vec::new();
    for series in 0..series_count {
        reader.set_series(series)?;
        let metadata = SeriesMetadata::from_ome(&ome, series)?;
        info!(
            "Series {series} has channels: {}, X: {:?}, Y: {:?}, Size: ({}, {}), Raman shifts: {}",
            reader.size_c,
            metadata.physical_size_x,
            metadata.physical_size_y,
            reader.size_x,
            reader.size_y,
            reader.size_t
        );
        if reader.size_z > 1 {
            warn!("Series {series} has {} z-slices, writing ZTYX stacks", reader.size_z);
        }
        for channel in 0..reader.size_c {
            let label = metadata.channel_label(channel);
            let output_path = output_dir.join(output_file_name(series, channel, &label));
            convert_channel(&reader, &metadata, channel, &output_path, options)?;
            info!("Saved {}", output_path.display());
            written.push(output_path);
        }
    }
    Ok(written)
}

/// Convert a .lif file or every .lif file in a directory.
pub fn convert_path<P, Q>(input: P, output_base: Q, options: &ConvertOptions) -> Result<Vec<PathBuf>, Error>
where
    P: AsRef<Path>,
    Q: AsRef<Path> + Sync,
{
    let files = find_inputs(input)?;
    if files.is_empty() {
        warn!("no .lif files found");
    }
    let written = if options.parallel {
        files
            .par_iter()
            .map(|f| convert_file(f, &output_base, options))
            .collect::<Result<Vec<_>, Error>>()?
    } else {
        files
            .iter()
            .map(|f| convert_file(f, &output_base, options))
            .collect::<Result<Vec<_>, Error>>()?
    };
    Ok(written.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names() {
        assert_eq!(
            output_file_name(0, 0, "Region 1"),
            "Series_1_Ch1_Region 1.ome.tiff"
        );
        assert_eq!(
            output_file_name(2, 1, "Channel_1"),
            "Series_3_Ch2_Channel_1.ome.tiff"
        );
        assert_eq!(
            output_file_name(0, 0, "TileScan 1/Position 2"),
            "Series_1_Ch1_TileScan 1_Position 2.ome.tiff"
        );
    }

    #[test]
    fn output_dir_collisions() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("out");
        let first = unique_output_dir(&base, "sample")?;
        let second = unique_output_dir(&base, "sample")?;
        let third = unique_output_dir(&base, "sample")?;
        assert_eq!(first, base.join("sample"));
        assert_eq!(second, base.join("sample(1)"));
        assert_eq!(third, base.join("sample(2)"));
        assert!(third.is_dir());
        Ok(())
    }

    #[test]
    fn output_dir_concurrent() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("out");
        let mut dirs = (0..16)
            .into_par_iter()
            .map(|_| unique_output_dir(&base, "a"))
            .collect::<Result<Vec<_>, Error>>()?;
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), 16);
        assert!(dirs.contains(&base.join("a")));
        assert!(dirs.contains(&base.join("a(15)")));
        Ok(())
    }

    #[test]
    fn inputs_from_directory() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        for name in ["b.lif", "a.lif", "c.LIF", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"")?;
        }
        std::fs::create_dir(dir.path().join("nested.lif"))?;
        std::fs::create_dir(dir.path().join("sub"))?;
        std::fs::write(dir.path().join("sub").join("d.lif"), b"")?;
        let files = find_inputs(dir.path())?;
        let names = files
            .iter()
            .filter_map(|f| f.file_name()?.to_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.lif", "b.lif", "c.LIF"]);
        Ok(())
    }

    #[test]
    fn inputs_single_file() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("scan.lif");
        std::fs::write(&file, b"")?;
        assert_eq!(find_inputs(&file)?, vec![file]);
        Ok(())
    }

    #[test]
    fn inputs_neither() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("scan.czi");
        std::fs::write(&file, b"")?;
        assert!(matches!(find_inputs(&file), Err(Error::NoInput(_))));
        assert!(matches!(
            find_inputs(dir.path().join("missing")),
            Err(Error::NoInput(_))
        ));
        Ok(())
    }

    #[test]
    #[ignore = "needs a JVM with bioformats and tests/files/raman.lif"]
    fn convert_sample() -> Result<(), Error> {
        let input = std::env::current_dir()?
            .join("tests")
            .join("files")
            .join("raman.lif");
        let dir = tempfile::tempdir()?;
        let written = convert_path(&input, dir.path(), &ConvertOptions::default())?;
        assert!(!written.is_empty());
        for file in written {
            assert!(file.starts_with(dir.path().join("raman")));
            assert!(file.exists());
        }
        Ok(())
    }
}
