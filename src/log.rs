//! Program logging, built on `fern`.
//!
//! Messages go to the console (warnings and errors on stderr) and, for the `run` command, to two
//! plain-text log files in the output folder. Messages from dependencies are only shown from
//! `warn` upwards, whatever level is chosen for this crate.
use anyhow::{Context, Result, bail, ensure};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// The log level used if neither the environment variable nor `settings.toml` gives one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The environment variable which overrides the log level
const LOG_LEVEL_ENV_VAR: &str = "CROP_POTENTIAL_LOG_LEVEL";

/// Log file for the ordinary progress of a batch
const LOG_INFO_FILE_NAME: &str = "crop_potential_info.log";

/// Log file for warnings and errors
const LOG_ERROR_FILE_NAME: &str = "crop_potential_error.log";

/// The log target of this crate. Other targets are capped at `warn`.
const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Initialise the program logger.
///
/// The level is taken from the `CROP_POTENTIAL_LOG_LEVEL` environment variable if set, else from
/// `log_level_from_settings`, else [`DEFAULT_LOG_LEVEL`]. Valid levels are `off`, `error`, `warn`,
/// `info`, `debug` and `trace` (case-insensitive).
///
/// If `log_file_dir` is given, `crop_potential_info.log` and `crop_potential_error.log` are
/// (re)created in it.
pub fn init(log_level_from_settings: Option<&str>, log_file_dir: Option<&Path>) -> Result<()> {
    ensure!(!is_logger_initialised(), "Logger already initialised");

    let log_level = match env::var(LOG_LEVEL_ENV_VAR) {
        Ok(level) => parse_log_level(&level)
            .with_context(|| format!("Invalid value for {LOG_LEVEL_ENV_VAR}"))?,
        Err(_) => parse_log_level(log_level_from_settings.unwrap_or(DEFAULT_LOG_LEVEL))?,
    };

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let mut dispatch = Dispatch::new()
        .chain(
            console_chain(log_level, std::io::stdout().is_terminal(), colours)
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .chain(std::io::stdout()),
        )
        .chain(
            console_chain(
                log_level.min(LevelFilter::Warn),
                std::io::stderr().is_terminal(),
                colours,
            )
            .chain(std::io::stderr()),
        );

    // The info log always records the progress of the batch, even if the console is quieter
    if let Some(dir) = log_file_dir {
        let info_file = create_log_file(dir, LOG_INFO_FILE_NAME)?;
        let error_file = create_log_file(dir, LOG_ERROR_FILE_NAME)?;
        dispatch = dispatch
            .chain(
                level_dispatch(log_level.max(LevelFilter::Info))
                    .filter(|metadata| metadata.level() > LevelFilter::Warn)
                    .format(write_log_plain)
                    .chain(info_file),
            )
            .chain(
                level_dispatch(LevelFilter::Warn)
                    .format(write_log_plain)
                    .chain(error_file),
            );
    }

    dispatch.apply().context("Logger already initialised")?;
    LOGGER_INIT.get_or_init(|| ());

    Ok(())
}

/// A dispatcher passing this crate's messages at `level`, and other crates' from `warn` upwards
fn level_dispatch(level: LevelFilter) -> Dispatch {
    Dispatch::new()
        .level(level.min(LevelFilter::Warn))
        .level_for(CRATE_TARGET, level)
}

/// A console dispatcher at `level`, coloured if writing to a terminal
fn console_chain(level: LevelFilter, use_colour: bool, colours: ColoredLevelConfig) -> Dispatch {
    level_dispatch(level).format(move |out, message, record| {
        if use_colour {
            write_log(out, colours.color(record.level()), record.target(), message);
        } else {
            write_log_plain(out, message, record);
        }
    })
}

/// Create (or truncate) a log file in `dir`
fn create_log_file(dir: &Path, file_name: &str) -> Result<File> {
    let path = dir.join(file_name);
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .with_context(|| format!("Could not create log file {}", path.display()))
}

/// Convert a log level string to a [`LevelFilter`]
fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    let level = match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    };

    Ok(level)
}

fn write_log<T: Display>(out: FormatCallback, level: T, target: &str, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");

    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}

fn write_log_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    write_log(out, record.level(), record.target(), message);
}
