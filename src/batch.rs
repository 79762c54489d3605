//! Derive hazard products for every combination of crop-model outputs in a folder.
//!
//! Historical files are processed first. Each one provides the baseline for its own relative-yield
//! product and for the matching future runs, and contributes to the aggregate baseline of its
//! crop/irrigation key. Aggregates are only written once every file has been processed.
use crate::baseline::{Baseline, BaselineAccumulator, mean_over_range, save_mean};
use crate::combination::{CombinationKey, CropIrrigation, HISTORICAL_SCENARIO, InputFile};
use crate::error::HazardError;
use crate::hazard::HazardLayer;
use crate::normalise::relative_yield;
use crate::output::{BaselineStore, CsvHazardStore, HIST_MEAN_DIR_NAME, HazardStore};
use crate::parallel::ProcessingMode;
use crate::parameters::BatchParameters;
use crate::raster::RasterSource;
use crate::year::YearRange;
use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// The input files of a batch, grouped for processing
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    /// Folder containing the input files
    pub input_dir: PathBuf,
    /// Historical input files, sorted by file name
    pub historical: Vec<InputFile>,
    /// Future input files, sorted by file name
    pub future: Vec<InputFile>,
    /// The distinct future scenarios, in order of discovery
    pub future_scenarios: IndexSet<String>,
    /// Indices into `historical` of the files sharing each crop/irrigation key.
    ///
    /// A file's position in its list is its slot in the key's baseline accumulator.
    pub groups: IndexMap<CropIrrigation, Vec<usize>>,
}

impl BatchPlan {
    /// List and parse the input files in `input_dir`.
    ///
    /// Hidden files and subfolders are ignored. Any other file whose name does not follow the
    /// input file grammar aborts discovery.
    pub fn discover(input_dir: &Path, parameters: &BatchParameters) -> Result<Self> {
        let extension = parameters.raster_format.extension();
        let entries = fs::read_dir(input_dir)
            .map_err(|err| HazardError::discovery(input_dir, format!("cannot read folder: {err}")))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| HazardError::io(input_dir, err))?;
            let is_hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !is_hidden && entry.path().is_file() {
                paths.push(entry.path());
            }
        }
        if paths.is_empty() {
            return Err(HazardError::discovery(input_dir, "no input files found").into());
        }
        paths.sort();

        let mut historical = Vec::new();
        let mut future = Vec::new();
        let mut future_scenarios = IndexSet::new();
        for path in paths {
            let file = InputFile::from_path(&path, extension)?;
            check_input_file(&file, parameters)?;
            if file.key.is_historical() {
                historical.push(file);
            } else {
                future_scenarios.insert(file.key.scenario.clone());
                future.push(file);
            }
        }
        if historical.is_empty() {
            return Err(HazardError::discovery(input_dir, "no historical input files found").into());
        }

        let mut groups: IndexMap<CropIrrigation, Vec<usize>> = IndexMap::new();
        for (idx, file) in historical.iter().enumerate() {
            groups
                .entry(file.key.crop_irrigation.clone())
                .or_default()
                .push(idx);
        }

        for (scenario, chunk) in parameters.future_scenarios() {
            if !future_scenarios.contains(scenario) {
                warn!("No input files found for scenario {scenario} ({chunk})");
            }
        }

        let historical_keys: IndexSet<&CombinationKey> = historical.iter().map(|f| &f.key).collect();
        for file in &future {
            if !historical_keys.contains(&file.key.with_scenario(HISTORICAL_SCENARIO)) {
                warn!(
                    "{} has no matching historical file and will not be processed",
                    file.path.display()
                );
            }
        }

        Ok(Self {
            input_dir: input_dir.to_path_buf(),
            historical,
            future,
            future_scenarios,
            groups,
        })
    }

    /// The future input file for `key`, if there is one
    fn future_file(&self, key: &CombinationKey) -> Option<&InputFile> {
        self.future.iter().find(|file| file.key == *key)
    }

    /// The crop/irrigation key and accumulator slot of each historical file
    fn slots(&self) -> Vec<(&CropIrrigation, usize)> {
        let mut slots = vec![None; self.historical.len()];
        for (crop_irrigation, indices) in &self.groups {
            for (slot, &idx) in indices.iter().enumerate() {
                slots[idx] = Some((crop_irrigation, slot));
            }
        }

        slots.into_iter().flatten().collect()
    }
}

/// Check that a file's name agrees with the configured variable string and year chunk (if any)
fn check_input_file(file: &InputFile, parameters: &BatchParameters) -> Result<()> {
    let file_name = file.path.display();
    if file.var_str != parameters.var_str {
        return Err(HazardError::format(format!(
            "{file_name}: expected variable '{}', found '{}'",
            parameters.var_str, file.var_str
        ))
        .into());
    }

    // Scenarios without a configured chunk are accepted with the years stated in the file name
    let Some(&chunk) = parameters.year_chunks.get(&file.key.scenario) else {
        return Ok(());
    };
    if file.chunk != chunk {
        return Err(HazardError::range(format!(
            "{file_name} covers {} but {} files should cover {chunk}",
            file.chunk, file.key.scenario
        ))
        .into());
    }

    Ok(())
}

/// What a completed batch produced
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    /// Number of hazard products written
    pub n_hazards: usize,
    /// The aggregate baseline of each crop/irrigation key
    pub baselines: IndexMap<CropIrrigation, Baseline>,
}

/// Process every historical file (and its future runs), then write the aggregate baselines.
///
/// # Arguments
///
/// * `plan` - The discovered input files
/// * `parameters` - Batch parameters
/// * `source` - Raster reader
/// * `store` - Where hazard products and baselines are written
/// * `output_dir` - Folder for the products (must exist)
/// * `mode` - How historical files are scheduled
pub fn run<S, T>(
    plan: &BatchPlan,
    parameters: &BatchParameters,
    source: &S,
    store: &T,
    output_dir: &Path,
    mode: ProcessingMode,
) -> Result<BatchSummary>
where
    S: RasterSource + Sync + ?Sized,
    T: HazardStore + BaselineStore + Sync + ?Sized,
{
    let accumulators: IndexMap<&CropIrrigation, BaselineAccumulator> = plan
        .groups
        .iter()
        .map(|(crop_irrigation, indices)| (crop_irrigation, BaselineAccumulator::new(indices.len())))
        .collect();
    let slots = plan.slots();

    let written = mode.try_map(0..plan.historical.len(), |idx| {
        let file = &plan.historical[idx];
        let (crop_irrigation, slot) = slots[idx];
        process_historical(
            plan,
            parameters,
            source,
            store,
            output_dir,
            file,
            &accumulators[crop_irrigation],
            slot,
        )
        .with_context(|| format!("Failed to process {}", file.key))
    })?;

    let hist_mean_dir = output_dir.join(HIST_MEAN_DIR_NAME);
    fs::create_dir_all(&hist_mean_dir).map_err(|err| HazardError::io(&hist_mean_dir, err))?;
    let mut baselines = IndexMap::new();
    for (crop_irrigation, accumulator) in accumulators {
        let baseline = accumulator
            .reduce()
            .with_context(|| format!("Failed to calculate baseline for {crop_irrigation}"))?;
        save_mean(
            store,
            output_dir,
            crop_irrigation,
            parameters.reference_range,
            &baseline.mean,
            &baseline.centroids,
        )?;
        baselines.insert(crop_irrigation.clone(), baseline);
    }

    Ok(BatchSummary {
        n_hazards: written.into_iter().sum(),
        baselines,
    })
}

/// Derive the products of one historical file and its future runs.
///
/// Returns the number of hazard products written.
#[allow(clippy::too_many_arguments)]
fn process_historical<S, T>(
    plan: &BatchPlan,
    parameters: &BatchParameters,
    source: &S,
    store: &T,
    output_dir: &Path,
    file: &InputFile,
    accumulator: &BaselineAccumulator,
    slot: usize,
) -> Result<usize>
where
    S: RasterSource + ?Sized,
    T: HazardStore + ?Sized,
{
    let key = &file.key;
    let reference_range = parameters.reference_range;
    let mut hazard = read_hazard(file, parameters, source, reference_range)?;
    let mean = mean_over_range(&hazard, reference_range)?;
    accumulator.fill(slot, mean.clone(), &hazard.centroids)?;

    relative_yield(&mut hazard, mean.view())?;
    store.write(&output_dir.join(key.hazard_name(reference_range)), &hazard)?;
    debug!("Wrote historical product for {key}");
    let mut n_written = 1;

    // Future runs are normalised by this historical file's own mean
    for scenario in &plan.future_scenarios {
        let future_key = key.with_scenario(scenario);
        let future_file = plan.future_file(&future_key).ok_or_else(|| {
            HazardError::discovery(
                &plan.input_dir,
                format!("no input file found for {future_key}"),
            )
        })?;
        let mut future = read_hazard(future_file, parameters, source, future_file.chunk)?;
        relative_yield(&mut future, mean.view())?;
        store.write(&output_dir.join(future_key.hazard_name(future_file.chunk)), &future)?;
        debug!("Wrote future product for {future_key}");
        n_written += 1;
    }
    info!("Processed {key} ({n_written} products)");

    Ok(n_written)
}

/// Read the absolute-yield layer of `file` for `year_range`
fn read_hazard<S: RasterSource + ?Sized>(
    file: &InputFile,
    parameters: &BatchParameters,
    source: &S,
    year_range: YearRange,
) -> Result<HazardLayer> {
    HazardLayer::from_file(
        source,
        &file.path,
        file.chunk,
        &parameters.bbox,
        &file.key.crop_irrigation.crop,
        year_range,
    )
}

/// Discover the inputs in `input_dir` and derive all products into `output_dir`.
///
/// Rasters are read in the configured format and products are written as CSV files.
pub fn run_batch(
    input_dir: &Path,
    output_dir: &Path,
    parameters: &BatchParameters,
    mode: ProcessingMode,
) -> Result<BatchSummary> {
    let plan = BatchPlan::discover(input_dir, parameters)?;
    info!(
        "Found {} historical and {} future input files",
        plan.historical.len(),
        plan.future.len()
    );

    let source = parameters.raster_format.source()?;
    let summary = run(
        &plan,
        parameters,
        &*source,
        &CsvHazardStore,
        output_dir,
        mode,
    )?;
    info!(
        "Wrote {} hazard products and {} baselines",
        summary.n_hazards,
        summary.baselines.len()
    );

    Ok(summary)
}
