//! Derive crop-yield drought hazards from batches of gridded crop-model output.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod baseline;
pub mod batch;
pub mod centroids;
pub mod cli;
pub mod combination;
pub mod error;
pub mod hazard;
pub mod input;
pub mod log;
pub mod normalise;
pub mod output;
pub mod parallel;
pub mod parameters;
pub mod raster;
pub mod settings;
pub mod year;

#[cfg(test)]
mod fixture;

/// Get the config dir for the program.
///
/// Falls back to the current directory if the platform has no config dir.
pub fn get_config_dir() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("crop_potential");
    dir
}
