// src/utils/mod.rs
//! Process-level helpers: logging setup.

use log::info;

/// Initialize structured stdout logging for the collector.
///
/// Level defaults to Info; pass an override (usually from
/// `Config::log_level`) to change it.
pub fn setup_logging(level: Option<&str>) -> Result<(), fern::InitError> {
    let level = level
        .and_then(|s| s.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized at {} level", level);
    Ok(())
}
