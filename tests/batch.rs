//! End-to-end tests of batch processing with CSV rasters.
use crop_potential::batch::run_batch;
use crop_potential::error::HazardError;
use crop_potential::output::{BaselineStore, CsvHazardStore, HIST_MEAN_DIR_NAME};
use crop_potential::parallel::ProcessingMode;
use crop_potential::parameters::BatchParameters;
use float_cmp::assert_approx_eq;
use ndarray::array;
use rstest::rstest;
use std::fs;
use tempfile::tempdir;

mod common;
use common::{FUT_B, write_config, write_inputs};

#[rstest]
#[case(ProcessingMode::Sequential)]
#[case(ProcessingMode::Parallel)]
fn test_run_batch(#[case] mode: ProcessingMode) {
    let input_dir = tempdir().unwrap();
    write_inputs(input_dir.path());
    let config_dir = tempdir().unwrap();
    let parameters = BatchParameters::from_path(write_config(config_dir.path())).unwrap();
    let output_dir = tempdir().unwrap();

    let summary = run_batch(input_dir.path(), output_dir.path(), &parameters, mode).unwrap();
    assert_eq!(summary.n_hazards, 4);

    // The aggregate baseline is the mean of the per-file means
    let (mean, centroids) = CsvHazardStore
        .read_baseline(
            &output_dir
                .path()
                .join(HIST_MEAN_DIR_NAME)
                .join("hist_mean_whe-noirr_2000-2001"),
        )
        .unwrap();
    assert_eq!(mean, array![4.0, 4.0]);
    assert_eq!(centroids.lat, [10.0, 10.0]);
    assert_eq!(centroids.lon, [-1.0, 1.0]);

    for name in [
        "haz_gepic_gfdl-esm2m_historical_2005soc_co2_whe-noirr_2000-2001",
        "haz_lpjml_gfdl-esm2m_historical_2005soc_co2_whe-noirr_2000-2001",
        "haz_gepic_gfdl-esm2m_rcp60_2005soc_co2_whe-noirr_2003-2004",
        "haz_lpjml_gfdl-esm2m_rcp60_2005soc_co2_whe-noirr_2003-2004",
    ] {
        assert!(output_dir.path().join(format!("{name}.csv")).is_file());
        assert!(output_dir.path().join(format!("{name}.toml")).is_file());
    }

    // A future value of 8 over its historical file's mean of 2 gives a relative yield of 4
    let mut reader = csv::Reader::from_path(
        output_dir
            .path()
            .join("haz_gepic_gfdl-esm2m_rcp60_2005soc_co2_whe-noirr_2003-2004.csv"),
    )
    .unwrap();
    let first = reader.records().next().unwrap().unwrap();
    assert_eq!(&first[0], "2003");
    assert_eq!(&first[2], "0");
    assert_approx_eq!(f64, first[5].parse().unwrap(), 4.0);

    let attributes: toml::Table = toml::from_str(
        &fs::read_to_string(
            output_dir
                .path()
                .join("haz_gepic_gfdl-esm2m_rcp60_2005soc_co2_whe-noirr_2003-2004.toml"),
        )
        .unwrap(),
    )
    .unwrap();
    assert_eq!(attributes["indicator"].as_str(), Some("Relative Yield"));
    assert_eq!(attributes["crop"].as_str(), Some("whe"));
    assert_eq!(attributes["intensity_min"].as_float(), Some(0.5));
    assert_eq!(attributes["intensity_max"].as_float(), Some(4.0));
}

#[test]
fn test_run_batch_missing_future_file() {
    let input_dir = tempdir().unwrap();
    write_inputs(input_dir.path());
    fs::remove_file(input_dir.path().join(FUT_B)).unwrap();
    let config_dir = tempdir().unwrap();
    let parameters = BatchParameters::from_path(write_config(config_dir.path())).unwrap();
    let output_dir = tempdir().unwrap();

    let err = run_batch(
        input_dir.path(),
        output_dir.path(),
        &parameters,
        ProcessingMode::Sequential,
    )
    .unwrap_err();
    assert!(err.to_string().contains("lpjml_gfdl-esm2m_historical_2005soc_co2_whe-noirr"));
    assert!(matches!(
        err.downcast_ref::<HazardError>(),
        Some(HazardError::Discovery { .. })
    ));

    // No aggregate baselines for an incomplete batch
    assert!(!output_dir.path().join(HIST_MEAN_DIR_NAME).exists());
}

#[test]
fn test_run_batch_bad_file_name() {
    let input_dir = tempdir().unwrap();
    write_inputs(input_dir.path());
    fs::write(input_dir.path().join("notes.csv"), "").unwrap();
    let config_dir = tempdir().unwrap();
    let parameters = BatchParameters::from_path(write_config(config_dir.path())).unwrap();
    let output_dir = tempdir().unwrap();

    let err = run_batch(
        input_dir.path(),
        output_dir.path(),
        &parameters,
        ProcessingMode::Sequential,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HazardError>(),
        Some(HazardError::Format { .. })
    ));
    assert_eq!(fs::read_dir(output_dir.path()).unwrap().count(), 0);
}

#[test]
fn test_run_batch_empty_input_dir() {
    let input_dir = tempdir().unwrap();
    let output_dir = tempdir().unwrap();
    let err = run_batch(
        input_dir.path(),
        output_dir.path(),
        &BatchParameters::default(),
        ProcessingMode::Sequential,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HazardError>(),
        Some(HazardError::Discovery { .. })
    ));
}
