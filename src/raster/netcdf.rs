//! Reading rasters from NetCDF files.
//!
//! The yield variable is the first three-dimensional `(time, lat, lon)` variable in the file. Each
//! time step is one band.
use super::{RasterGrid, RasterSource, check_exists, select_bands};
use crate::centroids::{BoundingBox, GridMeta};
use crate::error::HazardError;
use anyhow::{Context, Result};
use ndarray::Array2;
use std::path::Path;

/// Aliases of the latitude coordinate variable
const LAT_ALIASES: &[&str] = &["lat", "latitude"];

/// Aliases of the longitude coordinate variable
const LON_ALIASES: &[&str] = &["lon", "longitude"];

/// Attributes which mark cells without data
const FILL_ATTRIBUTES: &[&str] = &["_FillValue", "missing_value"];

/// Reads NetCDF rasters
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfRasterSource;

impl RasterSource for NetcdfRasterSource {
    fn load(&self, path: &Path, bands: &[usize], bbox: &BoundingBox) -> Result<RasterGrid> {
        check_exists(path)?;
        let file = ::netcdf::open(path).map_err(|err| netcdf_err(path, &err))?;

        let lat = read_axis(&file, LAT_ALIASES, path)?;
        let lon = read_axis(&file, LON_ALIASES, path)?;
        let var = file
            .variables()
            .find(|var| var.dimensions().len() == 3)
            .ok_or_else(|| {
                HazardError::format(format!("{} has no (time, lat, lon) variable", path.display()))
            })?;

        let dims = var.dimensions();
        let (n_time, n_lat, n_lon) = (dims[0].len(), dims[1].len(), dims[2].len());
        if n_lat != lat.len() || n_lon != lon.len() {
            return Err(HazardError::format(format!(
                "{}: variable '{}' has shape ({n_lat}, {n_lon}) but the grid is ({}, {})",
                path.display(),
                var.name(),
                lat.len(),
                lon.len()
            ))
            .into());
        }
        let band_idx = select_bands(path, n_time, bands)?;

        let fill_values: Vec<f64> = FILL_ATTRIBUTES
            .iter()
            .filter_map(|name| var.attribute_value(name))
            .filter_map(|value| value.ok())
            .filter_map(|value| match value {
                ::netcdf::AttributeValue::Double(v) => Some(v),
                ::netcdf::AttributeValue::Float(v) => Some(v as f64),
                _ => None,
            })
            .collect();

        // Indices of the grid rows and columns inside the bounding box
        let lat_idx: Vec<usize> = (0..n_lat)
            .filter(|&i| (bbox.lat_min..=bbox.lat_max).contains(&lat[i]))
            .collect();
        let lon_idx: Vec<usize> = (0..n_lon)
            .filter(|&j| (bbox.lon_min..=bbox.lon_max).contains(&lon[j]))
            .collect();
        if lat_idx.is_empty() || lon_idx.is_empty() {
            return Err(HazardError::format(format!(
                "{} has no cells inside the bounding box",
                path.display()
            ))
            .into());
        }

        let n_cells = lat_idx.len() * lon_idx.len();
        let mut values = Array2::zeros((band_idx.len(), n_cells));
        for (row, &band) in band_idx.iter().enumerate() {
            let data = var
                .get_values::<f64, _>([band..band + 1, 0..n_lat, 0..n_lon])
                .map_err(|err| netcdf_err(path, &err))
                .with_context(|| format!("Failed to read band {} of {}", band + 1, path.display()))?;
            let cells = lat_idx
                .iter()
                .flat_map(|&i| lon_idx.iter().map(move |&j| i * n_lon + j));
            for (col, cell) in cells.enumerate() {
                let value = data[cell];
                values[[row, col]] = if value.is_finite() && !fill_values.contains(&value) {
                    value
                } else {
                    0.0
                };
            }
        }

        let meta = GridMeta {
            lat: lat_idx.iter().map(|&i| lat[i]).collect(),
            lon: lon_idx.iter().map(|&j| lon[j]).collect(),
        };

        Ok(RasterGrid { meta, values })
    }
}

/// Read a 1-D coordinate variable, trying each alias in order
fn read_axis(file: &::netcdf::File, aliases: &[&str], path: &Path) -> Result<Vec<f64>> {
    for &alias in aliases {
        if let Some(var) = file.variable(alias) {
            return var
                .get_values::<f64, _>(..)
                .map_err(|err| netcdf_err(path, &err).into());
        }
    }

    Err(HazardError::format(format!(
        "variable '{}' not found in {}",
        aliases[0],
        path.display()
    ))
    .into())
}

/// Convert an error from the NetCDF library
fn netcdf_err(path: &Path, err: &::netcdf::Error) -> HazardError {
    HazardError::io(path, std::io::Error::other(err.to_string()))
}
