//! `metadata.toml`: what was run, with which build, on which platform
use crate::error::HazardError;
use crate::parameters::BatchParameters;
use anyhow::{Context, Result};
use chrono::Local;
use indexmap::IndexMap;
use platform_info::{PlatformInfo, PlatformInfoAPI, UNameAPI};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output file name for metadata
const METADATA_FILE_NAME: &str = "metadata.toml";

/// Information about the program build via `built` crate
mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Get information about program version from git
fn get_git_hash() -> String {
    let Some(hash) = built_info::GIT_COMMIT_HASH_SHORT else {
        return "unknown".into();
    };

    if built_info::GIT_DIRTY == Some(true) {
        format!("{hash}-dirty")
    } else {
        hash.into()
    }
}

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    program: ProgramMetadata<'a>,
    platform: PlatformMetadata,
}

/// Information about the batch run
#[derive(Serialize)]
struct RunMetadata<'a> {
    /// Path to the folder of input files
    input_path: &'a Path,
    /// The date and time on which the run started
    datetime: String,
    /// The historical years the baselines average over
    reference_range: String,
    /// The file extension of the input rasters
    input_extension: &'static str,
    /// The bounding box the inputs were clipped to
    bbox: [f64; 4],
    /// The variable token expected in input file names
    var_str: &'a str,
    /// The years covered by each scenario's input files
    year_chunks: IndexMap<&'a str, String>,
}

impl<'a> RunMetadata<'a> {
    fn new(input_path: &'a Path, parameters: &'a BatchParameters) -> Self {
        Self {
            input_path,
            datetime: Local::now().to_rfc2822(),
            reference_range: parameters.reference_range.to_string(),
            input_extension: parameters.raster_format.extension(),
            bbox: parameters.bbox.into(),
            var_str: &parameters.var_str,
            year_chunks: parameters
                .year_chunks
                .iter()
                .map(|(scenario, chunk)| (scenario.as_str(), chunk.to_string()))
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct ProgramMetadata<'a> {
    /// The program name
    name: &'a str,
    /// The program version as specified in Cargo.toml
    version: &'a str,
    /// The target architecture for the build (e.g. x86_64-unknown-linux-gnu)
    target: &'a str,
    /// Whether it is a debug build
    is_debug: bool,
    /// The version of rustc used to compile the program
    rustc_version: &'a str,
    /// When the program was built
    build_time_utc: &'a str,
    /// The git commit hash of the build (if known)
    git_commit_hash: String,
}

impl Default for ProgramMetadata<'_> {
    fn default() -> Self {
        Self {
            name: built_info::PKG_NAME,
            version: built_info::PKG_VERSION,
            target: built_info::TARGET,
            is_debug: built_info::DEBUG,
            rustc_version: built_info::RUSTC_VERSION,
            build_time_utc: built_info::BUILT_TIME_UTC,
            git_commit_hash: get_git_hash(),
        }
    }
}

/// The operating system the batch ran on. The host name is left out.
#[derive(Serialize)]
struct PlatformMetadata {
    osname: String,
    sysname: String,
    release: String,
    machine: String,
}

impl PlatformMetadata {
    fn new() -> Result<Self> {
        let info = PlatformInfo::new()
            .map_err(|err| anyhow::anyhow!("{err}"))
            .context("Unable to determine platform info")?;
        Ok(Self {
            osname: info.osname().to_string_lossy().into(),
            sysname: info.sysname().to_string_lossy().into(),
            release: info.release().to_string_lossy().into(),
            machine: info.machine().to_string_lossy().into(),
        })
    }
}

/// Write metadata about the run to `output_path` in TOML format
pub fn write_metadata(
    output_path: &Path,
    input_path: &Path,
    parameters: &BatchParameters,
) -> Result<()> {
    let metadata = Metadata {
        run: RunMetadata::new(input_path, parameters),
        program: ProgramMetadata::default(),
        platform: PlatformMetadata::new()?,
    };
    let file_path = output_path.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)
        .map_err(|err| HazardError::io(&file_path, err))?;

    Ok(())
}
