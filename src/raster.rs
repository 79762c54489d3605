//! Reading gridded crop-model output.
//!
//! Rasters are stored with one band per year. Bands are numbered from 1.
use crate::centroids::{BoundingBox, GridMeta};
use crate::error::HazardError;
use anyhow::Result;
use ndarray::Array2;
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::path::Path;

pub mod csv;
pub use self::csv::CsvRasterSource;
#[cfg(feature = "netcdf")]
pub mod netcdf;
#[cfg(feature = "netcdf")]
pub use self::netcdf::NetcdfRasterSource;

/// Values of the requested bands, restricted to the cells inside a bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    /// The grid the cells belong to
    pub meta: GridMeta,
    /// One row per requested band, one column per cell (row-major over the grid)
    pub values: Array2<f64>,
}

/// Something which can read bands of a raster file
pub trait RasterSource {
    /// Read the given 1-based `bands` of the raster at `path`, restricted to `bbox`
    fn load(&self, path: &Path, bands: &[usize], bbox: &BoundingBox) -> Result<RasterGrid>;
}

/// The on-disk format of the input rasters
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, SerializeLabeledStringEnum, DeserializeLabeledStringEnum,
)]
pub enum RasterFormat {
    /// NetCDF files, as written by the crop models
    #[default]
    #[string = "netcdf"]
    Netcdf,
    /// CSV files with one row per cell and one column per band
    #[string = "csv"]
    Csv,
}

impl RasterFormat {
    /// The file extension of input files in this format
    pub fn extension(self) -> &'static str {
        match self {
            Self::Netcdf => "nc",
            Self::Csv => "csv",
        }
    }

    /// Get a reader for rasters of this format
    pub fn source(self) -> Result<Box<dyn RasterSource + Send + Sync>> {
        match self {
            Self::Csv => Ok(Box::new(CsvRasterSource)),
            #[cfg(feature = "netcdf")]
            Self::Netcdf => Ok(Box::new(NetcdfRasterSource)),
            #[cfg(not(feature = "netcdf"))]
            Self::Netcdf => Err(HazardError::format(
                "reading NetCDF rasters requires building with the `netcdf` feature",
            )
            .into()),
        }
    }
}

/// Check that the raster at `path` exists before trying to open it
pub(crate) fn check_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(HazardError::discovery(path, "raster file not found").into());
    }

    Ok(())
}

/// Select the requested 1-based bands from rows of per-band values
pub(crate) fn select_bands(
    path: &Path,
    n_bands: usize,
    bands: &[usize],
) -> Result<Vec<usize>> {
    bands
        .iter()
        .map(|&band| {
            if band == 0 || band > n_bands {
                Err(HazardError::format(format!(
                    "{} has {n_bands} bands, but band {band} was requested",
                    path.display()
                ))
                .into())
            } else {
                Ok(band - 1)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    #[test]
    fn test_select_bands() {
        let path = Path::new("yield.csv");
        assert_eq!(select_bands(path, 3, &[1, 3]).unwrap(), [0, 2]);
        assert_error!(
            select_bands(path, 3, &[3, 4]),
            "invalid format: yield.csv has 3 bands, but band 4 was requested"
        );
        assert!(select_bands(path, 3, &[0]).is_err());
    }

    #[test]
    fn test_raster_format_extension() {
        assert_eq!(RasterFormat::default().extension(), "nc");
        assert_eq!(RasterFormat::Csv.extension(), "csv");
    }

    #[test]
    fn test_check_exists() {
        let err = check_exists(Path::new("does/not/exist.nc")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HazardError>(),
            Some(HazardError::Discovery { .. })
        ));
    }
}
