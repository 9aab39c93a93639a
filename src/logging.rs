use chrono::Local;
use log::LevelFilter;
use simplelog::{self, ColorChoice, CombinedLogger, TermLogger, TerminalMode, WriteLogger};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Sets up logging to a file and to the terminal
///
/// # Arguments
///
/// * `log_level` - The level of log messages to capture
/// * `log_file` - Optional path to log file. If None, creates a timestamped file
///
/// # Returns
///
/// The path to the log file
pub fn setup_logging(log_level: LevelFilter, log_file: Option<&str>) -> std::io::Result<String> {
    let timestamp = Local::now().format("%Y%m%d_%H").to_string();

    let log_path = match log_file {
        Some(path) => path.to_string(),
        None => format!("workspace_agent_{}.log", timestamp),
    };

    if let Some(parent) = Path::new(&log_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    // Create the log file with append mode and write header in one operation
    let mut log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    writeln!(
        log_file,
        "====== WORKSPACE AGENT LOG - Started at {} ======",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;

    CombinedLogger::init(vec![
        WriteLogger::new(log_level, simplelog::Config::default(), log_file),
        TermLogger::new(
            log_level,
            simplelog::Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
    ])
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    log::info!("Logging initialized to file: {}", log_path);
    log::debug!("Debug logging enabled");

    Ok(log_path)
}

/// Maps a `LOG_LEVEL` string to a filter, defaulting to `Info`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}
