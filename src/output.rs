//! Writing hazard products and baselines to disk.
use crate::centroids::Centroids;
use crate::error::HazardError;
use crate::hazard::{HazardLayer, IndicatorKind};
use crate::input::input_err_msg;
use anyhow::{Context, Result, ensure};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which input-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "crop_potential_results";

/// The folder (inside the output directory) for aggregate baselines
pub const HIST_MEAN_DIR_NAME: &str = "Hist_mean";

/// Get the default output folder for the input files in `input_dir`
pub fn get_output_dir(input_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let input_dir = input_dir
        .canonicalize()
        .context("Could not resolve path to input folder")?;

    let input_name = input_dir
        .file_name()
        .context("Input folder cannot be the root folder")?
        .to_str()
        .context("Invalid chars in input folder name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, input_name].iter().collect())
}

/// Create a new output directory, optionally replacing an existing non-empty one.
///
/// # Returns
///
/// Whether an existing directory with contents is being overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    // If the folder already exists, then delete it (if allowed)
    let mut overwrite = false;
    if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
            Please delete the folder or pass the --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir).context("Could not delete folder")?;
        overwrite = true;
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Append `.<extension>` to `path`. Product names may contain dots, so nothing is replaced.
fn with_suffix(path: &Path, extension: &str) -> PathBuf {
    let mut path = path.as_os_str().to_owned();
    path.push(".");
    path.push(extension);
    path.into()
}

/// Somewhere hazard layers can be persisted
pub trait HazardStore {
    /// Persist `hazard` under `path` (without extension)
    fn write(&self, path: &Path, hazard: &HazardLayer) -> Result<()>;
}

/// Somewhere per-centroid baselines can be persisted and read back
pub trait BaselineStore {
    /// Persist a baseline under `path` (without extension)
    fn write_baseline(&self, path: &Path, mean: &Array1<f64>, centroids: &Centroids) -> Result<()>;

    /// Read back a baseline written by [`BaselineStore::write_baseline`]
    fn read_baseline(&self, path: &Path) -> Result<(Array1<f64>, Centroids)>;
}

/// Represents a row of a hazard CSV file
#[derive(Serialize, Debug, PartialEq)]
struct HazardRow<'a> {
    event_id: &'a str,
    date: String,
    centroid: usize,
    lat: f64,
    lon: f64,
    intensity: f64,
    fraction: f64,
}

/// Represents a row of a baseline CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct BaselineRow {
    centroid: usize,
    lat: f64,
    lon: f64,
    mean: f64,
}

/// Attributes of a hazard layer which are not per-cell, written next to its CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct HazardAttributes {
    /// What the intensity values represent
    indicator: IndicatorKind,
    /// Units of the intensity values
    units: String,
    /// The crop type
    crop: String,
    /// Number of events
    n_events: usize,
    /// Number of centroids
    n_centroids: usize,
    /// Occurrence frequency of each event
    frequency: Vec<f64>,
    /// Smallest intensity after the relative-yield transform
    #[serde(skip_serializing_if = "Option::is_none")]
    intensity_min: Option<f64>,
    /// Largest intensity after the relative-yield transform
    #[serde(skip_serializing_if = "Option::is_none")]
    intensity_max: Option<f64>,
}

impl HazardAttributes {
    fn new(hazard: &HazardLayer) -> Self {
        Self {
            indicator: hazard.indicator,
            units: hazard.units().to_string(),
            crop: hazard.crop.clone(),
            n_events: hazard.n_events(),
            n_centroids: hazard.n_centroids(),
            frequency: hazard.frequency.to_vec(),
            intensity_min: hazard.intensity_range.map(|(min, _)| min),
            intensity_max: hazard.intensity_range.map(|(_, max)| max),
        }
    }
}

/// Writes hazard products as CSV files with a TOML sidecar
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvHazardStore;

impl HazardStore for CsvHazardStore {
    fn write(&self, path: &Path, hazard: &HazardLayer) -> Result<()> {
        hazard
            .check()
            .with_context(|| format!("Refusing to write invalid hazard {}", path.display()))?;

        let csv_path = with_suffix(path, "csv");
        let mut writer =
            csv::Writer::from_path(&csv_path).map_err(|err| HazardError::io(&csv_path, err))?;
        for (event, (intensity, fraction)) in hazard
            .events
            .iter()
            .zip(hazard.intensity.rows().into_iter().zip(hazard.fraction.rows()))
        {
            let date = event.date.to_string();
            for (centroid, (lat, lon)) in hazard.centroids.iter().enumerate() {
                writer.serialize(HazardRow {
                    event_id: &event.id,
                    date: date.clone(),
                    centroid,
                    lat,
                    lon,
                    intensity: intensity[centroid],
                    fraction: fraction[centroid],
                })?;
            }
        }
        writer.flush().map_err(|err| HazardError::io(&csv_path, err))?;

        let toml_path = with_suffix(path, "toml");
        let attributes = toml::to_string(&HazardAttributes::new(hazard))?;
        fs::write(&toml_path, attributes).map_err(|err| HazardError::io(&toml_path, err))?;

        Ok(())
    }
}

impl BaselineStore for CsvHazardStore {
    fn write_baseline(&self, path: &Path, mean: &Array1<f64>, centroids: &Centroids) -> Result<()> {
        ensure!(
            mean.len() == centroids.len(),
            "Baseline has {} values but there are {} centroids",
            mean.len(),
            centroids.len()
        );

        let csv_path = with_suffix(path, "csv");
        let mut writer =
            csv::Writer::from_path(&csv_path).map_err(|err| HazardError::io(&csv_path, err))?;
        for (centroid, ((lat, lon), &mean)) in centroids.iter().zip(mean).enumerate() {
            writer.serialize(BaselineRow {
                centroid,
                lat,
                lon,
                mean,
            })?;
        }
        writer.flush().map_err(|err| HazardError::io(&csv_path, err))?;

        Ok(())
    }

    fn read_baseline(&self, path: &Path) -> Result<(Array1<f64>, Centroids)> {
        let csv_path = with_suffix(path, "csv");
        let mut reader =
            csv::Reader::from_path(&csv_path).map_err(|err| HazardError::io(&csv_path, err))?;

        let mut mean = Vec::new();
        let mut centroids = Centroids::default();
        for (idx, row) in reader.deserialize::<BaselineRow>().enumerate() {
            let row = row.with_context(|| input_err_msg(&csv_path))?;
            ensure!(
                row.centroid == idx,
                "{}: expected centroid {idx}, found {}",
                csv_path.display(),
                row.centroid
            );
            mean.push(row.mean);
            centroids.lat.push(row.lat);
            centroids.lon.push(row.lon);
        }

        Ok((Array1::from(mean), centroids))
    }
}
