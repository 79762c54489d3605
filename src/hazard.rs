//! Hazard layers: yearly crop-yield indicators on a grid of centroids.
use crate::centroids::{BoundingBox, Centroids};
use crate::combination::CombinationKey;
use crate::error::HazardError;
use crate::parameters::BatchParameters;
use crate::raster::RasterSource;
use crate::year::{Event, YearRange, bands_and_events};
use anyhow::{Context, Result, ensure};
use log::debug;
use ndarray::{Array1, Array2, ArrayView1};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::path::Path;
use std::sync::Arc;

/// What the intensity values of a hazard layer represent
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, SerializeLabeledStringEnum, DeserializeLabeledStringEnum,
)]
pub enum IndicatorKind {
    /// Absolute annual yield
    #[string = "Yearly Yield"]
    AbsoluteYield,
    /// Yield divided by a per-centroid baseline
    #[string = "Relative Yield"]
    RelativeYield,
    /// Rank within a reference distribution, scaled to [0, 1]
    #[string = "Percentile"]
    Percentile,
}

impl IndicatorKind {
    /// The units of intensity values
    pub fn units(self) -> &'static str {
        match self {
            Self::AbsoluteYield => "t/y/ha",
            Self::RelativeYield | Self::Percentile => "",
        }
    }

    /// Whether `value` lies in the valid domain for this kind of indicator.
    ///
    /// NaN values are always allowed, as they mark cells without a signal.
    pub fn is_valid_value(self, value: f64) -> bool {
        match self {
            _ if value.is_nan() => true,
            Self::AbsoluteYield => true,
            Self::RelativeYield => value >= 0.0,
            Self::Percentile => (0.0..=1.0).contains(&value),
        }
    }
}

/// One derived product: yearly intensities for every centroid of a grid.
///
/// Rows of `intensity` and `fraction` are events and columns are centroids.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardLayer {
    /// The crop the layer describes
    pub crop: String,
    /// One event per year, in increasing order
    pub events: Vec<Event>,
    /// Occurrence frequency of each event
    pub frequency: Array1<f64>,
    /// Intensity per event and centroid
    pub intensity: Array2<f64>,
    /// Exposed fraction per event and centroid (always one)
    pub fraction: Array2<f64>,
    /// What `intensity` represents
    pub indicator: IndicatorKind,
    /// The observed (min, max) of `intensity` after the relative-yield transform
    pub intensity_range: Option<(f64, f64)>,
    /// The shared grid the columns refer to
    pub centroids: Arc<Centroids>,
}

impl HazardLayer {
    /// Create a new absolute-yield [`HazardLayer`].
    ///
    /// # Arguments
    ///
    /// * `crop` - The crop type
    /// * `events` - One event per intensity row
    /// * `intensity` - Yield per event (row) and centroid (column)
    /// * `centroids` - The grid the columns refer to
    pub fn new(
        crop: &str,
        events: Vec<Event>,
        intensity: Array2<f64>,
        centroids: Arc<Centroids>,
    ) -> Result<Self> {
        let n_events = events.len();
        let hazard = Self {
            crop: crop.to_string(),
            frequency: Array1::from_elem(n_events, 1.0 / n_events as f64),
            fraction: Array2::ones(intensity.raw_dim()),
            events,
            intensity,
            indicator: IndicatorKind::AbsoluteYield,
            intensity_range: None,
            centroids,
        };
        hazard.check()?;

        Ok(hazard)
    }

    /// Read one combination's raster and build its absolute-yield layer.
    ///
    /// # Arguments
    ///
    /// * `source` - Raster reader
    /// * `input_dir` - Folder containing the input files
    /// * `parameters` - Batch parameters (year chunks, bounding box, file naming)
    /// * `key` - The combination to read
    /// * `year_range` - The years to extract
    pub fn from_single_run<S: RasterSource + ?Sized>(
        source: &S,
        input_dir: &Path,
        parameters: &BatchParameters,
        key: &CombinationKey,
        year_range: YearRange,
    ) -> Result<Self> {
        let chunk = parameters.year_chunk(&key.scenario)?;
        let file_name = key.input_file_name(
            &parameters.var_str,
            chunk,
            parameters.raster_format.extension(),
        );

        Self::from_file(
            source,
            &input_dir.join(file_name),
            chunk,
            &parameters.bbox,
            &key.crop_irrigation.crop,
            year_range,
        )
    }

    /// Read the years `year_range` from the raster at `path`, whose first band is
    /// `chunk.start`.
    pub fn from_file<S: RasterSource + ?Sized>(
        source: &S,
        path: &Path,
        chunk: YearRange,
        bbox: &BoundingBox,
        crop: &str,
        year_range: YearRange,
    ) -> Result<Self> {
        if !chunk.contains_range(&year_range) {
            return Err(HazardError::range(format!(
                "years {year_range} are not covered by {} (which covers {chunk})",
                path.display()
            ))
            .into());
        }

        let selection = bands_and_events(year_range, chunk.start)?;
        let grid = source
            .load(path, &selection.bands, bbox)
            .with_context(|| format!("Failed to read raster {}", path.display()))?;
        debug!(
            "Read {} bands and {} cells from {}",
            selection.bands.len(),
            grid.meta.size(),
            path.display()
        );

        let centroids = Arc::new(grid.meta.centroids_from_metadata());
        Self::new(crop, selection.events, grid.values, centroids)
    }

    /// Number of events (rows)
    pub fn n_events(&self) -> usize {
        self.events.len()
    }

    /// Number of centroids (columns)
    pub fn n_centroids(&self) -> usize {
        self.centroids.len()
    }

    /// The units of the intensity values
    pub fn units(&self) -> &'static str {
        self.indicator.units()
    }

    /// The intensities of the event with the given id
    pub fn event_intensity(&self, event_id: &str) -> Option<ArrayView1<'_, f64>> {
        let row = self.events.iter().position(|e| e.id == event_id)?;
        Some(self.intensity.row(row))
    }

    /// Check the shape and value-domain invariants of the layer
    pub fn check(&self) -> Result<()> {
        let shape = (self.n_events(), self.n_centroids());
        ensure!(
            self.intensity.dim() == shape,
            "Intensity has shape {:?} but there are {} events and {} centroids",
            self.intensity.dim(),
            shape.0,
            shape.1
        );
        ensure!(
            self.fraction.dim() == shape,
            "Fraction has shape {:?} but intensity has shape {:?}",
            self.fraction.dim(),
            shape
        );
        ensure!(
            self.frequency.len() == shape.0,
            "There are {} frequencies but {} events",
            self.frequency.len(),
            shape.0
        );
        ensure!(
            self.centroids.lon.len() == self.centroids.lat.len(),
            "Centroids have {} latitudes but {} longitudes",
            self.centroids.lat.len(),
            self.centroids.lon.len()
        );
        if let Some(value) = self
            .intensity
            .iter()
            .find(|&&v| !self.indicator.is_valid_value(v))
        {
            anyhow::bail!("Invalid intensity value for {:?}: {value}", self.indicator);
        }

        Ok(())
    }
}
