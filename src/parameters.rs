//! Defines the `BatchParameters` struct, which represents the contents of a batch config file.
use crate::centroids::BoundingBox;
use crate::combination::HISTORICAL_SCENARIO;
use crate::error::HazardError;
use crate::input::{input_err_msg, read_toml};
use crate::raster::RasterFormat;
use crate::year::YearRange;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(
    default_reference_range,
    YearRange,
    YearRange {
        start: 1976,
        end: 2005
    }
);
define_param_default!(default_var_str, String, "global_annual".to_string());

/// The year chunks covered by the ISIMIP input files
fn default_year_chunks() -> IndexMap<String, YearRange> {
    [
        (
            HISTORICAL_SCENARIO.to_string(),
            YearRange {
                start: 1861,
                end: 2005,
            },
        ),
        (
            "rcp60".to_string(),
            YearRange {
                start: 2006,
                end: 2099,
            },
        ),
    ]
    .into_iter()
    .collect()
}

/// Parameters which control how a batch of crop-model outputs is processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchParameters {
    /// Only cells inside this box are read: `[lon_min, lat_min, lon_max, lat_max]`
    #[serde(default)]
    pub bbox: BoundingBox,
    /// The historical years which the baselines average over
    #[serde(default = "default_reference_range")]
    pub reference_range: YearRange,
    /// The years covered by the input files of each scenario
    #[serde(default = "default_year_chunks")]
    pub year_chunks: IndexMap<String, YearRange>,
    /// The variable/time-step part of input file names
    #[serde(default = "default_var_str")]
    pub var_str: String,
    /// The format of the input rasters
    #[serde(default)]
    pub raster_format: RasterFormat,
}

impl Default for BatchParameters {
    fn default() -> Self {
        Self {
            bbox: BoundingBox::default(),
            reference_range: default_reference_range(),
            year_chunks: default_year_chunks(),
            var_str: default_var_str(),
            raster_format: RasterFormat::default(),
        }
    }
}

impl BatchParameters {
    /// Read batch parameters from a TOML file.
    ///
    /// Missing fields take their default values.
    ///
    /// # Arguments
    ///
    /// * `file_path` - Path to the config file
    ///
    /// # Returns
    ///
    /// The parameters or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(file_path: P) -> Result<BatchParameters> {
        let file_path = file_path.as_ref();
        let parameters: BatchParameters = read_toml(file_path)?;
        parameters
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(parameters)
    }

    /// Read parameters from `file_path` if given, otherwise use the defaults
    pub fn load(file_path: Option<&Path>) -> Result<BatchParameters> {
        match file_path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    /// The years covered by the input files of `scenario`
    pub fn year_chunk(&self, scenario: &str) -> Result<YearRange> {
        self.year_chunks.get(scenario).copied().ok_or_else(|| {
            HazardError::range(format!("no year chunk configured for scenario '{scenario}'"))
                .into()
        })
    }

    /// The future scenarios which have a configured year chunk, in configuration order
    pub fn future_scenarios(&self) -> impl Iterator<Item = (&str, YearRange)> {
        self.year_chunks
            .iter()
            .filter(|(scenario, _)| *scenario != HISTORICAL_SCENARIO)
            .map(|(scenario, chunk)| (scenario.as_str(), *chunk))
    }

    /// Check the parameters are consistent with one another
    pub fn validate(&self) -> Result<()> {
        // bbox and the year ranges are already checked while deserialising
        let historical = self
            .year_chunk(HISTORICAL_SCENARIO)
            .context("A year chunk for the historical scenario must be given")?;
        ensure!(
            historical.contains_range(&self.reference_range),
            "Reference range {} is outside the historical years {historical}",
            self.reference_range
        );
        ensure!(!self.var_str.is_empty(), "var_str cannot be empty");
        ensure!(
            !self.var_str.starts_with('_') && !self.var_str.ends_with('_'),
            "var_str cannot start or end with '_'"
        );

        Ok(())
    }
}
