//! Reading rasters stored as CSV tables.
//!
//! The first two columns hold the latitude and longitude of each cell and every further column
//! holds one band. Cells must be listed in row-major order of a regular grid.
use super::{RasterGrid, RasterSource, check_exists, select_bands};
use crate::centroids::{BoundingBox, GridMeta};
use crate::error::HazardError;
use anyhow::{Context, Result};
use ndarray::Array2;
use std::path::Path;

/// Reads CSV rasters
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvRasterSource;

impl RasterSource for CsvRasterSource {
    fn load(&self, path: &Path, bands: &[usize], bbox: &BoundingBox) -> Result<RasterGrid> {
        check_exists(path)?;
        let mut reader = ::csv::Reader::from_path(path).map_err(|err| HazardError::io(path, err))?;

        let n_columns = reader
            .headers()
            .map_err(|err| HazardError::io(path, err))?
            .len();
        if n_columns < 3 {
            return Err(HazardError::format(format!(
                "{} must have lat, lon and at least one band column",
                path.display()
            ))
            .into());
        }
        let band_idx = select_bands(path, n_columns - 2, bands)?;

        let mut cells = Vec::new();
        let mut values = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|err| HazardError::io(path, err))?;
            let field = |col: usize| parse_value(record.get(col).unwrap_or_default())
                .with_context(|| format!("Invalid value in row {} of {}", row + 1, path.display()));

            let lat = field(0)?;
            let lon = field(1)?;
            if !bbox.contains(lat, lon) {
                continue;
            }

            cells.push((lat, lon));
            for &idx in &band_idx {
                values.push(field(idx + 2)?);
            }
        }

        let meta = grid_from_cells(path, &cells)?;
        let values = Array2::from_shape_vec((cells.len(), band_idx.len()), values)?
            .reversed_axes()
            .as_standard_layout()
            .into_owned();

        Ok(RasterGrid { meta, values })
    }
}

/// Parse a cell value. Empty and non-finite cells have no data and read as zero yield, as in the
/// NetCDF source.
fn parse_value(s: &str) -> Result<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0.0);
    }

    let value: f64 = s
        .parse()
        .map_err(|_| HazardError::format(format!("'{s}' is not a number")))?;

    Ok(if value.is_finite() { value } else { 0.0 })
}

/// Recover the axes of the regular grid which `cells` were listed from
fn grid_from_cells(path: &Path, cells: &[(f64, f64)]) -> Result<GridMeta> {
    if cells.is_empty() {
        return Err(HazardError::format(format!(
            "{} has no cells inside the bounding box",
            path.display()
        ))
        .into());
    }

    let mut lat: Vec<f64> = Vec::new();
    for &(cell_lat, _) in cells {
        if lat.last() != Some(&cell_lat) {
            lat.push(cell_lat);
        }
    }
    let n_lon = cells.len() / lat.len();
    let lon = cells.iter().take(n_lon).map(|&(_, cell_lon)| cell_lon).collect();
    let meta = GridMeta { lat, lon };

    let is_regular = meta.size() == cells.len()
        && meta
            .centroids_from_metadata()
            .iter()
            .eq(cells.iter().copied());
    if !is_regular {
        return Err(HazardError::format(format!(
            "{} does not list the cells of a regular grid in row-major order",
            path.display()
        ))
        .into());
    }

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use ndarray::array;
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    const RASTER: &str = "lat,lon,1861,1862,1863
10.0,-1.0,1.0,2.0,3.0
10.0,1.0,4.0,5.0,6.0
-10.0,-1.0,7.0,,9.0
-10.0,1.0,10.0,11.0,12.0
";

    #[test]
    fn test_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("yield.csv");
        fs::write(&path, RASTER).unwrap();

        let grid = CsvRasterSource
            .load(&path, &[1, 3], &BoundingBox::default())
            .unwrap();
        assert_eq!(grid.meta.lat, [10.0, -10.0]);
        assert_eq!(grid.meta.lon, [-1.0, 1.0]);
        assert_eq!(
            grid.values,
            array![[1.0, 4.0, 7.0, 10.0], [3.0, 6.0, 9.0, 12.0]]
        );
    }

    #[test]
    fn test_load_bbox_and_missing_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("yield.csv");
        fs::write(&path, RASTER).unwrap();

        let bbox = BoundingBox::new(-180.0, -85.0, 180.0, 0.0).unwrap();
        let grid = CsvRasterSource.load(&path, &[2], &bbox).unwrap();
        assert_eq!(grid.meta.lat, [-10.0]);
        assert_eq!(grid.values.dim(), (1, 2));
        assert_eq!(grid.values, array![[0.0, 11.0]]);
    }

    #[rstest]
    #[case("2.5", 2.5)]
    #[case(" 3 ", 3.0)]
    #[case("", 0.0)]
    #[case("NaN", 0.0)]
    #[case("inf", 0.0)]
    fn test_parse_value(#[case] s: &str, #[case] expected: f64) {
        assert_eq!(parse_value(s).unwrap(), expected);
    }

    #[test]
    fn test_parse_value_invalid() {
        assert_error!(parse_value("n/a"), "invalid format: 'n/a' is not a number");
    }

    #[test]
    fn test_load_missing_band() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("yield.csv");
        fs::write(&path, RASTER).unwrap();

        let err = CsvRasterSource
            .load(&path, &[4], &BoundingBox::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HazardError>(),
            Some(HazardError::Format { .. })
        ));
    }

    #[test]
    fn test_grid_from_cells_irregular() {
        let path = Path::new("yield.csv");
        assert_error!(
            grid_from_cells(path, &[(1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
            "invalid format: yield.csv does not list the cells of a regular grid in row-major order"
        );
        assert!(grid_from_cells(path, &[(1.0, 0.0), (0.0, 1.0)]).is_err());
        assert!(grid_from_cells(path, &[]).is_err());
    }
}
