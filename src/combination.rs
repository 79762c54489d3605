//! Combination keys parsed from crop-model output file names.
//!
//! Input files follow the pattern:
//!
//! ```text
//! <ag_model>_<cl_model>_ewembi_<scenario>_<soc>_<co2>_yield-<crop>-<irrigation>_<var_str>_<start_year>_<end_year>.<ext>
//! ```
//!
//! e.g. `gepic_gfdl-esm2m_ewembi_historical_2005soc_co2_yield-whe-noirr_global_annual_1861_2005.nc`.
use crate::error::HazardError;
use crate::year::YearRange;
use anyhow::Result;
use derive_more::Display;
use std::path::{Path, PathBuf};

/// The scenario name of historical runs
pub const HISTORICAL_SCENARIO: &str = "historical";

/// The fixed bias-correction token in input file names
const BIAS_CORRECTION: &str = "ewembi";

/// The prefix of the variable token in input file names
const YIELD_PREFIX: &str = "yield";

/// A crop type together with an irrigation regime (e.g. `whe-noirr`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{crop}-{irrigation}")]
pub struct CropIrrigation {
    /// Crop type (e.g. `whe` for wheat)
    pub crop: String,
    /// Irrigation regime (`irr` or `noirr`)
    pub irrigation: String,
}

impl CropIrrigation {
    /// The name of the aggregate baseline product for this crop over `reference_range`
    pub fn baseline_name(&self, reference_range: YearRange) -> String {
        format!("hist_mean_{self}_{reference_range}")
    }
}

/// The identifiers which together name one hazard product
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display("{ag_model}_{cl_model}_{scenario}_{soc}_{co2}_{crop_irrigation}")]
pub struct CombinationKey {
    /// Agricultural (crop) model, e.g. `gepic`
    pub ag_model: String,
    /// Climate model, e.g. `gfdl-esm2m`
    pub cl_model: String,
    /// Emission scenario, e.g. `historical` or `rcp60`
    pub scenario: String,
    /// Socio-economic trajectory, e.g. `2005soc`
    pub soc: String,
    /// CO2 forcing, e.g. `co2`
    pub co2: String,
    /// Crop and irrigation regime
    pub crop_irrigation: CropIrrigation,
}

impl CombinationKey {
    /// Whether this is a historical run
    pub fn is_historical(&self) -> bool {
        self.scenario == HISTORICAL_SCENARIO
    }

    /// The same combination under a different scenario
    pub fn with_scenario(&self, scenario: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            ..self.clone()
        }
    }

    /// The name of the hazard product for this combination over `year_range`
    pub fn hazard_name(&self, year_range: YearRange) -> String {
        format!("haz_{self}_{year_range}")
    }

    /// The input file name for this combination
    ///
    /// # Arguments
    ///
    /// * `var_str` - The variable string (e.g. `global_annual`)
    /// * `chunk` - The years covered by the file
    /// * `extension` - The file extension (e.g. `nc`)
    pub fn input_file_name(&self, var_str: &str, chunk: YearRange, extension: &str) -> String {
        format!(
            "{}_{}_{BIAS_CORRECTION}_{}_{}_{}_{YIELD_PREFIX}-{}-{}_{var_str}_{}_{}.{extension}",
            self.ag_model,
            self.cl_model,
            self.scenario,
            self.soc,
            self.co2,
            self.crop_irrigation.crop,
            self.crop_irrigation.irrigation,
            chunk.start,
            chunk.end
        )
    }
}

/// An input file whose name has been parsed
#[derive(Debug, Clone, PartialEq)]
pub struct InputFile {
    /// Path to the file
    pub path: PathBuf,
    /// The combination the file holds data for
    pub key: CombinationKey,
    /// The variable string between the yield token and the years
    pub var_str: String,
    /// The years covered by the file, as stated in its name
    pub chunk: YearRange,
}

impl InputFile {
    /// Parse the name of the file at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the input file
    /// * `extension` - The expected file extension (without the dot)
    pub fn from_path(path: &Path, extension: &str) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| HazardError::format(format!("invalid file name: {}", path.display())))?;
        let (key, var_str, chunk) = parse_file_name(file_name, extension)?;

        Ok(Self {
            path: path.to_path_buf(),
            key,
            var_str,
            chunk,
        })
    }
}

/// Parse an input file name into its combination key, variable string and year chunk
fn parse_file_name(file_name: &str, extension: &str) -> Result<(CombinationKey, String, YearRange)> {
    let format_err = |reason: &str| HazardError::format(format!("{file_name}: {reason}"));

    let stem = file_name
        .strip_suffix(extension)
        .and_then(|s| s.strip_suffix('.'))
        .ok_or_else(|| format_err(&format!("expected a .{extension} file")))?;

    // NB: The variable string may itself contain underscores (e.g. "global_annual")
    let tokens: Vec<&str> = stem.split('_').collect();
    if tokens.len() < 10 {
        return Err(format_err(&format!(
            "expected at least 10 fields separated by '_', found {}",
            tokens.len()
        ))
        .into());
    }
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(format_err("empty field").into());
    }
    if tokens[2] != BIAS_CORRECTION {
        return Err(format_err(&format!("expected '{BIAS_CORRECTION}' as third field")).into());
    }

    let crop_irrigation = match tokens[6].split('-').collect::<Vec<_>>()[..] {
        [YIELD_PREFIX, crop, irrigation] => CropIrrigation {
            crop: crop.to_string(),
            irrigation: irrigation.to_string(),
        },
        _ => {
            return Err(format_err(&format!(
                "expected '{YIELD_PREFIX}-<crop>-<irrigation>', found '{}'",
                tokens[6]
            ))
            .into());
        }
    };

    let n = tokens.len();
    let parse_year = |s: &str| {
        s.parse::<u32>()
            .map_err(|_| format_err(&format!("invalid year '{s}'")))
    };
    let start_year = parse_year(tokens[n - 2])?;
    let end_year = parse_year(tokens[n - 1])?;
    let chunk = YearRange::new(start_year, end_year)?;

    let key = CombinationKey {
        ag_model: tokens[0].to_string(),
        cl_model: tokens[1].to_string(),
        scenario: tokens[3].to_string(),
        soc: tokens[4].to_string(),
        co2: tokens[5].to_string(),
        crop_irrigation,
    };

    Ok((key, tokens[7..n - 2].join("_"), chunk))
}
