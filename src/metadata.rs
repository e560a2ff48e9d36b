use crate::error::Error;
use ome_metadata::Ome;
use ome_metadata::ome::{Convert, Image, Pixels, UnitsLength};

/// The part of the OME metadata that is carried into each output file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeriesMetadata {
    /// 0-based index of the series in the file
    pub series: usize,
    pub name: Option<String>,
    pub acquisition_date: Option<String>,
    pub size_x: usize,
    pub size_y: usize,
    pub size_c: usize,
    pub size_z: usize,
    /// number of Raman shifts
    pub size_t: usize,
    /// µm
    pub physical_size_x: Option<f64>,
    /// µm
    pub physical_size_y: Option<f64>,
}

fn get_image(ome: &Ome, series: usize) -> Option<&Image> {
    ome.image.as_ref()?.get(series)
}

fn physical_size<F: Into<f64>>(unit: &UnitsLength, size: Option<F>) -> Result<Option<f64>, Error> {
    match size {
        Some(s) => Ok(Some(unit.convert(&UnitsLength::um, s.into())?)),
        None => Ok(None),
    }
}

impl SeriesMetadata {
    pub fn from_ome(ome: &Ome, series: usize) -> Result<Self, Error> {
        let image = get_image(ome, series).ok_or(Error::NoImageOrPixels(series))?;
        let pixels: &Pixels = &image.pixels;
        Ok(SeriesMetadata {
            series,
            name: image.name.as_ref().map(|n| n.to_string()),
            acquisition_date: image.acquisition_date.as_ref().map(|d| d.to_string()),
            size_x: pixels.size_x as usize,
            size_y: pixels.size_y as usize,
            size_c: pixels.size_c as usize,
            size_z: pixels.size_z as usize,
            size_t: pixels.size_t as usize,
            physical_size_x: physical_size(&pixels.physical_size_x_unit, pixels.physical_size_x)?,
            physical_size_y: physical_size(&pixels.physical_size_y_unit, pixels.physical_size_y)?,
        })
    }

    /// Label used in output file names and as image name: the series name, or Channel_# if it has none.
    pub fn channel_label(&self, channel: usize) -> String {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("Channel_{channel}"),
        }
    }

    pub fn summary(&self) -> String {
        let mut s = "".to_string();
        s.push_str(&format!("series:        {}\n", self.series));
        if let Some(name) = &self.name {
            s.push_str(&format!("name:          {name}\n"));
        }
        if let Some(date) = &self.acquisition_date {
            s.push_str(&format!("acquired:      {date}\n"));
        }
        s.push_str(&format!(
            "shape (ctyx):  {} x {} x {} x {}\n",
            self.size_c, self.size_t, self.size_y, self.size_x
        ));
        if self.size_z > 1 {
            s.push_str(&format!("z-slices:      {}\n", self.size_z));
        }
        match (self.physical_size_x, self.physical_size_y) {
            (Some(x), Some(y)) => s.push_str(&format!("pixel size:    {x:.4} x {y:.4} µm\n")),
            (Some(x), None) => s.push_str(&format!("pixel size x:  {x:.4} µm\n")),
            (None, Some(y)) => s.push_str(&format!("pixel size y:  {y:.4} µm\n")),
            (None, None) => {}
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(name: Option<&str>) -> SeriesMetadata {
        SeriesMetadata {
            series: 2,
            name: name.map(|n| n.to_string()),
            acquisition_date: Some("2024-03-01T10:00:00".to_string()),
            size_x: 64,
            size_y: 32,
            size_c: 2,
            size_z: 1,
            size_t: 90,
            physical_size_x: Some(0.5),
            physical_size_y: None,
        }
    }

    #[test]
    fn label_from_name() {
        assert_eq!(metadata(Some("Region 1")).channel_label(1), "Region 1");
    }

    #[test]
    fn label_without_name() {
        assert_eq!(metadata(None).channel_label(0), "Channel_0");
        assert_eq!(metadata(Some("  ")).channel_label(3), "Channel_3");
    }

    #[test]
    fn summary_lists_shape() {
        let s = metadata(Some("Region 1")).summary();
        assert!(s.contains("name:          Region 1"));
        assert!(s.contains("2 x 90 x 32 x 64"));
        assert!(s.contains("pixel size x:  0.5000 µm"));
        assert!(!s.contains("z-slices"));
    }
}
