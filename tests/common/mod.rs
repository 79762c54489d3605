//! Input files shared by the integration tests.
#![allow(dead_code)]
use std::fs;
use std::path::Path;

pub const HIST_A: &str =
    "gepic_gfdl-esm2m_ewembi_historical_2005soc_co2_yield-whe-noirr_global_annual_2000_2002.csv";
pub const HIST_B: &str =
    "lpjml_gfdl-esm2m_ewembi_historical_2005soc_co2_yield-whe-noirr_global_annual_2000_2002.csv";
pub const FUT_A: &str =
    "gepic_gfdl-esm2m_ewembi_rcp60_2005soc_co2_yield-whe-noirr_global_annual_2003_2004.csv";
pub const FUT_B: &str =
    "lpjml_gfdl-esm2m_ewembi_rcp60_2005soc_co2_yield-whe-noirr_global_annual_2003_2004.csv";

/// Batch parameters matching the input files
pub const CONFIG: &str = "reference_range = [2000, 2001]
raster_format = \"csv\"

[year_chunks]
historical = [2000, 2002]
rcp60 = [2003, 2004]
";

/// Write two historical and two future rasters for wheat (rainfed) into `dir`.
///
/// The historical means over 2000-2001 are [2, 4] and [6, 4].
pub fn write_inputs(dir: &Path) {
    let rasters = [
        (HIST_A, "lat,lon,2000,2001,2002\n10.0,-1.0,1.0,3.0,100.0\n10.0,1.0,4.0,4.0,100.0\n"),
        (HIST_B, "lat,lon,2000,2001,2002\n10.0,-1.0,6.0,6.0,0.0\n10.0,1.0,3.0,5.0,0.0\n"),
        (FUT_A, "lat,lon,2003,2004\n10.0,-1.0,8.0,4.0\n10.0,1.0,2.0,8.0\n"),
        (FUT_B, "lat,lon,2003,2004\n10.0,-1.0,3.0,12.0\n10.0,1.0,4.0,4.0\n"),
    ];
    for (name, contents) in rasters {
        fs::write(dir.join(name), contents).unwrap();
    }
}

/// Write the batch parameters file into `dir`, returning its path
pub fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("batch.toml");
    fs::write(&path, CONFIG).unwrap();
    path
}
