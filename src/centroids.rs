//! Grid cells at which hazard intensity is defined.
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// A geographic bounding box: `[lon_min, lat_min, lon_max, lat_max]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    /// Western edge
    pub lon_min: f64,
    /// Southern edge
    pub lat_min: f64,
    /// Eastern edge
    pub lon_max: f64,
    /// Northern edge
    pub lat_max: f64,
}

impl BoundingBox {
    /// Create a new [`BoundingBox`], checking the edges are ordered
    pub fn new(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> Result<Self> {
        ensure!(
            lon_min < lon_max && lat_min < lat_max,
            "Bounding box edges are not ordered: [{lon_min}, {lat_min}, {lon_max}, {lat_max}]"
        );

        Ok(Self {
            lon_min,
            lat_min,
            lon_max,
            lat_max,
        })
    }

    /// Whether the point lies inside the box (edges included)
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat) && (self.lon_min..=self.lon_max).contains(&lon)
    }
}

impl Default for BoundingBox {
    /// Everything except the polar caps
    fn default() -> Self {
        Self {
            lon_min: -180.0,
            lat_min: -85.0,
            lon_max: 180.0,
            lat_max: 85.0,
        }
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = anyhow::Error;

    fn try_from([lon_min, lat_min, lon_max, lat_max]: [f64; 4]) -> Result<Self> {
        Self::new(lon_min, lat_min, lon_max, lat_max)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.lon_min, bbox.lat_min, bbox.lon_max, bbox.lat_max]
    }
}

/// The axes of a regular latitude/longitude grid, as read from raster metadata
#[derive(Debug, Clone, PartialEq)]
pub struct GridMeta {
    /// Latitude of each grid row
    pub lat: Vec<f64>,
    /// Longitude of each grid column
    pub lon: Vec<f64>,
}

impl GridMeta {
    /// Number of grid cells
    pub fn size(&self) -> usize {
        self.lat.len() * self.lon.len()
    }

    /// Flatten the grid axes into one centroid per cell, in row-major order
    pub fn centroids_from_metadata(&self) -> Centroids {
        let (lat, lon) = self
            .lat
            .iter()
            .flat_map(|&lat| self.lon.iter().map(move |&lon| (lat, lon)))
            .unzip();

        Centroids { lat, lon }
    }
}

/// Flat latitude/longitude arrays, one entry per hazard column
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Centroids {
    /// Latitude of each centroid
    pub lat: Vec<f64>,
    /// Longitude of each centroid
    pub lon: Vec<f64>,
}

impl Centroids {
    /// Number of centroids
    pub fn len(&self) -> usize {
        self.lat.len()
    }

    /// Whether there are no centroids
    pub fn is_empty(&self) -> bool {
        self.lat.is_empty()
    }

    /// Iterate over `(lat, lon)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.lat.iter().copied().zip(self.lon.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    #[test]
    fn test_centroids_from_metadata() {
        let meta = GridMeta {
            lat: vec![10.0, 9.5],
            lon: vec![-1.0, -0.5, 0.0],
        };
        let centroids = meta.centroids_from_metadata();
        assert_eq!(centroids.len(), meta.size());
        assert_eq!(centroids.lat, [10.0, 10.0, 10.0, 9.5, 9.5, 9.5]);
        assert_eq!(centroids.lon, [-1.0, -0.5, 0.0, -1.0, -0.5, 0.0]);
    }

    #[test]
    fn test_bounding_box_contains() {
        let bbox = BoundingBox::new(-10.0, 40.0, 10.0, 60.0).unwrap();
        assert!(bbox.contains(50.0, 0.0));
        assert!(bbox.contains(40.0, 10.0));
        assert!(!bbox.contains(39.9, 0.0));
        assert!(!bbox.contains(50.0, -10.5));
    }

    #[test]
    fn test_bounding_box_unordered() {
        assert_error!(
            BoundingBox::new(10.0, 40.0, -10.0, 60.0),
            "Bounding box edges are not ordered: [10, 40, -10, 60]"
        );
    }
}
