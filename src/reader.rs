use crate::bioformats::{ChannelSeparator, DebugTools, ImageReader, MetadataTools};
use crate::error::Error;
use ndarray::Array2;
use num::{FromPrimitive, Zero};
use ome_metadata::Ome;
use std::any::type_name;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Pixel types (u)int(8/16/32) or float(32/64), numbered as in bioformats
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl PixelType {
    /// bytes per pixel
    pub fn size(&self) -> usize {
        match self {
            PixelType::I8 | PixelType::U8 => 1,
            PixelType::I16 | PixelType::U16 => 2,
            PixelType::I32 | PixelType::U32 | PixelType::F32 => 4,
            PixelType::F64 => 8,
        }
    }

    /// name as used in the Type attribute of OME Pixels
    pub fn ome_name(&self) -> &'static str {
        match self {
            PixelType::I8 => "int8",
            PixelType::U8 => "uint8",
            PixelType::I16 => "int16",
            PixelType::U16 => "uint16",
            PixelType::I32 => "int32",
            PixelType::U32 => "uint32",
            PixelType::F32 => "float",
            PixelType::F64 => "double",
        }
    }
}

impl TryFrom<i32> for PixelType {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PixelType::I8),
            1 => Ok(PixelType::U8),
            2 => Ok(PixelType::I16),
            3 => Ok(PixelType::U16),
            4 => Ok(PixelType::I32),
            5 => Ok(PixelType::U32),
            6 => Ok(PixelType::F32),
            7 => Ok(PixelType::F64),
            _ => Err(Error::UnknownPixelType(value.to_string())),
        }
    }
}

impl FromStr for PixelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "int8" | "i8" => Ok(PixelType::I8),
            "uint8" | "u8" => Ok(PixelType::U8),
            "int16" | "i16" => Ok(PixelType::I16),
            "uint16" | "u16" => Ok(PixelType::U16),
            "int32" | "i32" => Ok(PixelType::I32),
            "uint32" | "u32" => Ok(PixelType::U32),
            "float" | "f32" | "float32" => Ok(PixelType::F32),
            "double" | "f64" | "float64" => Ok(PixelType::F64),
            _ => Err(Error::UnknownPixelType(s.to_string())),
        }
    }
}

/// Struct containing frame data in one of eight pixel types. Cast to `Array2<T>` using try_into.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug)]
pub enum Frame {
    I8(Array2<i8>),
    U8(Array2<u8>),
    I16(Array2<i16>),
    U16(Array2<u16>),
    I32(Array2<i32>),
    U32(Array2<u32>),
    F32(Array2<f32>),
    F64(Array2<f64>),
}

macro_rules! impl_frame_cast {
    ($($t:tt: $s:ident $(,)?)*) => {
        $(
            impl From<Array2<$t>> for Frame {
                fn from(value: Array2<$t>) -> Self {
                    Frame::$s(value)
                }
            }
        )*
    };
}

impl_frame_cast! {
    i8: I8
    u8: U8
    i16: I16
    u16: U16
    i32: I32
    u32: U32
    f32: F32
    f64: F64
}

impl<T> TryInto<Array2<T>> for Frame
where
    T: FromPrimitive + Zero + 'static,
{
    type Error = Error;

    fn try_into(self) -> Result<Array2<T>, Self::Error> {
        let mut err = Ok(());

        macro_rules! cast {
            ($v:expr, $from:ident) => {
                $v.mapv_into_any(|x| {
                    T::$from(x).unwrap_or_else(|| {
                        err = Err(Error::Cast(x.to_string(), type_name::<T>().to_string()));
                        T::zero()
                    })
                })
            };
        }

        let arr = match self {
            Frame::I8(v) => cast!(v, from_i8),
            Frame::U8(v) => cast!(v, from_u8),
            Frame::I16(v) => cast!(v, from_i16),
            Frame::U16(v) => cast!(v, from_u16),
            Frame::I32(v) => cast!(v, from_i32),
            Frame::U32(v) => cast!(v, from_u32),
            Frame::F32(v) => cast!(v, from_f32),
            Frame::F64(v) => cast!(v, from_f64),
        };
        err.map(|()| arr)
    }
}

/// pick every size_c-th sample starting at channel out of an interleaved plane
fn deinterleave(bytes: &[u8], pixel_type: PixelType, size_c: usize, channel: usize) -> Vec<u8> {
    bytes
        .chunks(pixel_type.size())
        .skip(channel)
        .step_by(size_c.max(1))
        .flat_map(|a| a.to_vec())
        .collect()
}

/// decode the raw bytes of one plane into a Frame of shape (size_y, size_x)
pub(crate) fn decode_plane(
    bytes: &[u8],
    pixel_type: PixelType,
    little_endian: bool,
    size_y: usize,
    size_x: usize,
) -> Result<Frame, Error> {
    macro_rules! get_frame {
        ($t:tt, $n:expr) => {
            Ok(Frame::from(Array2::from_shape_vec(
                (size_y, size_x),
                bytes
                    .chunks_exact($n)
                    .map(|x| {
                        let mut a = [0u8; $n];
                        a.copy_from_slice(x);
                        if little_endian {
                            $t::from_le_bytes(a)
                        } else {
                            $t::from_be_bytes(a)
                        }
                    })
                    .collect(),
            )?))
        };
    }

    if bytes.len() != size_y * size_x * pixel_type.size() {
        return Err(ndarray::ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into());
    }

    match pixel_type {
        PixelType::I8 => get_frame!(i8, 1),
        PixelType::U8 => get_frame!(u8, 1),
        PixelType::I16 => get_frame!(i16, 2),
        PixelType::U16 => get_frame!(u16, 2),
        PixelType::I32 => get_frame!(i32, 4),
        PixelType::U32 => get_frame!(u32, 4),
        PixelType::F32 => get_frame!(f32, 4),
        PixelType::F64 => get_frame!(f64, 8),
    }
}

/// Reader interface to a container file. Select a series with set_series, use get_frame to get data.
pub struct Reader {
    image_reader: ImageReader,
    /// path to file
    pub path: PathBuf,
    /// which of the series in the file is selected
    pub series: usize,
    /// size x (horizontal)
    pub size_x: usize,
    /// size y (vertical)
    pub size_y: usize,
    /// size c (# channels)
    pub size_c: usize,
    /// size z (# slices)
    pub size_z: usize,
    /// size t (# time points, or Raman shifts)
    pub size_t: usize,
    /// pixel type ((u)int(8/16/32) or float(32/64))
    pub pixel_type: PixelType,
    little_endian: bool,
}

impl Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("path", &self.path)
            .field("series", &self.series)
            .field("size_x", &self.size_x)
            .field("size_y", &self.size_y)
            .field("size_c", &self.size_c)
            .field("size_z", &self.size_z)
            .field("size_t", &self.size_t)
            .field("pixel_type", &self.pixel_type)
            .field("little_endian", &self.little_endian)
            .finish()
    }
}

impl Reader {
    /// Create a new reader for the image file at a path, and open series #.
    pub fn new<P>(path: P, series: usize) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        DebugTools::set_root_level("ERROR")?;
        let path = path.as_ref().to_path_buf();
        let image_reader = ImageReader::new()?;
        let ome_meta = MetadataTools::new()?.create_ome_xml_metadata()?;
        image_reader.set_metadata_store(ome_meta)?;
        image_reader.set_id(path.to_str().ok_or(Error::InvalidFileName)?)?;
        debug!("opened {}", path.display());
        let mut reader = Reader {
            image_reader,
            path,
            series,
            size_x: 0,
            size_y: 0,
            size_c: 0,
            size_z: 0,
            size_t: 0,
            pixel_type: PixelType::U8,
            little_endian: false,
        };
        reader.set_series(series)?;
        Ok(reader)
    }

    /// number of series in the file
    pub fn series_count(&self) -> Result<usize, Error> {
        Ok(self.image_reader.get_series_count()? as usize)
    }

    /// Select another series in the same file and refresh the sizes.
    pub fn set_series(&mut self, series: usize) -> Result<(), Error> {
        let count = self.series_count()?;
        if series >= count {
            return Err(Error::SeriesOutOfBounds(series, count));
        }
        self.image_reader.set_series(series as i32)?;
        self.series = series;
        self.size_x = self.image_reader.get_size_x()? as usize;
        self.size_y = self.image_reader.get_size_y()? as usize;
        self.size_c = self.image_reader.get_size_c()? as usize;
        self.size_z = self.image_reader.get_size_z()? as usize;
        self.size_t = self.image_reader.get_size_t()? as usize;
        self.pixel_type = PixelType::try_from(self.image_reader.get_pixel_type()?)?;
        self.little_endian = self.image_reader.is_little_endian()?;
        debug!("selected {:?}", self);
        Ok(())
    }

    /// Get ome metadata as xml string, all series included
    pub fn get_ome_xml(&self) -> Result<String, Error> {
        self.image_reader.ome_xml()
    }

    /// Get ome metadata as ome structure, all series included
    pub fn get_ome(&self) -> Result<Ome, Error> {
        Ok(self.get_ome_xml()?.parse::<Ome>()?)
    }

    /// Retrieve frame at channel c, slice z and time t, without rescaling.
    #[allow(clippy::if_same_then_else)]
    pub fn get_frame(&self, c: usize, z: usize, t: usize) -> Result<Frame, Error> {
        if c >= self.size_c {
            return Err(Error::ChannelOutOfBounds(c, self.size_c));
        }
        let reader = &self.image_reader;
        let bytes = if reader.is_rgb()? && reader.is_interleaved()? {
            let index = reader.get_index(z as i32, 0, t as i32)?;
            deinterleave(&reader.open_bytes(index)?, self.pixel_type, self.size_c, c)
        } else if reader.get_rgb_channel_count()? > 1 {
            let channel_separator = ChannelSeparator::new(reader)?;
            let index = channel_separator.get_index(z as i32, c as i32, t as i32)?;
            channel_separator.open_bytes(index)?
        } else if reader.is_indexed()? {
            // raw indices, the lookup table is not applied
            let index = reader.get_index(z as i32, c as i32, t as i32)?;
            reader.open_bytes(index)?
        } else {
            let index = reader.get_index(z as i32, c as i32, t as i32)?;
            reader.open_bytes(index)?
        };
        decode_plane(
            &bytes,
            self.pixel_type,
            self.little_endian,
            self.size_y,
            self.size_x,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_type_from_str() -> Result<(), Error> {
        assert_eq!("u8".parse::<PixelType>()?, PixelType::U8);
        assert_eq!("UINT16".parse::<PixelType>()?, PixelType::U16);
        assert_eq!("float".parse::<PixelType>()?, PixelType::F32);
        assert_eq!("float64".parse::<PixelType>()?, PixelType::F64);
        assert!("u128".parse::<PixelType>().is_err());
        Ok(())
    }

    #[test]
    fn pixel_type_from_bioformats() -> Result<(), Error> {
        assert_eq!(PixelType::try_from(3)?, PixelType::U16);
        assert_eq!(PixelType::try_from(7)?, PixelType::F64);
        assert!(matches!(
            PixelType::try_from(8),
            Err(Error::UnknownPixelType(_))
        ));
        Ok(())
    }

    #[test]
    fn decode_u16_both_endians() -> Result<(), Error> {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let le: Array2<u16> = decode_plane(&bytes, PixelType::U16, true, 2, 2)?.try_into()?;
        let be: Array2<u16> = decode_plane(&bytes, PixelType::U16, false, 2, 2)?.try_into()?;
        assert_eq!(le[[0, 0]], 0x0201);
        assert_eq!(le[[1, 1]], 0x0807);
        assert_eq!(be[[0, 0]], 0x0102);
        assert_eq!(be[[1, 0]], 0x0506);
        Ok(())
    }

    #[test]
    fn decode_wrong_length() {
        let bytes = [0u8; 7];
        assert!(matches!(
            decode_plane(&bytes, PixelType::U16, true, 2, 2),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn frame_cast_checked() -> Result<(), Error> {
        let frame = Frame::from(Array2::from_shape_vec((1, 3), vec![0u16, 200, 255])?);
        let arr: Array2<u8> = frame.try_into()?;
        assert_eq!(arr.into_raw_vec_and_offset().0, vec![0u8, 200, 255]);

        let frame = Frame::from(Array2::from_shape_vec((1, 2), vec![1u16, 300])?);
        let res: Result<Array2<u8>, Error> = frame.try_into();
        assert!(matches!(res, Err(Error::Cast(..))));
        Ok(())
    }

    #[test]
    fn deinterleave_rgb() {
        let bytes = [1u8, 2, 3, 4, 5, 6];
        assert_eq!(deinterleave(&bytes, PixelType::U8, 3, 0), vec![1, 4]);
        assert_eq!(deinterleave(&bytes, PixelType::U8, 3, 2), vec![3, 6]);
        let bytes = [1u8, 0, 2, 0, 3, 0, 4, 0];
        assert_eq!(deinterleave(&bytes, PixelType::U16, 2, 1), vec![2, 0, 4, 0]);
    }

    #[test]
    #[ignore = "needs a JVM with bioformats and tests/files/raman.lif"]
    fn read_series() -> Result<(), Error> {
        let path = std::env::current_dir()?
            .join("tests")
            .join("files")
            .join("raman.lif");
        let mut reader = Reader::new(&path, 0)?;
        println!("reader: {:?}", reader);
        let count = reader.series_count()?;
        assert!(count > 0);
        reader.set_series(count - 1)?;
        let frame = reader.get_frame(0, 0, 0)?;
        println!("frame: {:?}", frame);
        assert!(matches!(
            reader.set_series(count),
            Err(Error::SeriesOutOfBounds(..))
        ));
        Ok(())
    }
}
