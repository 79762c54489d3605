//! Integration tests for the `validate` command.
use crop_potential::cli::handle_validate_command;
use crop_potential::log::is_logger_initialised;
use crop_potential::settings::Settings;
use tempfile::tempdir;

mod common;
use common::{write_config, write_inputs};

/// An integration test for the `validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("CROP_POTENTIAL_LOG_LEVEL", "off") };

    assert!(!is_logger_initialised());

    let input_dir = tempdir().unwrap();
    write_inputs(input_dir.path());
    let config_dir = tempdir().unwrap();
    let config = write_config(config_dir.path());
    handle_validate_command(input_dir.path(), Some(&config), Some(Settings::default())).unwrap();

    assert!(is_logger_initialised());
}
