use dlss_platform::AppPaths;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;

/// Before a run appends to the log, cut it down to roughly half of
/// `max_log_size`, keeping whole lines from the end.
fn keep_recent_lines(log_path: &Path, max_log_size: u64) -> io::Result<()> {
    let len = match std::fs::metadata(log_path) {
        Ok(metadata) => metadata.len(),
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(error),
    };
    if len <= max_log_size {
        return Ok(());
    }

    let contents = std::fs::read(log_path)?;
    let budget = usize::try_from(max_log_size / 2).unwrap_or(usize::MAX);
    let tail_start = contents.len().saturating_sub(budget);
    let keep_from = if tail_start == 0 || contents[tail_start - 1] == b'\n' {
        tail_start
    } else {
        contents[tail_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(contents.len(), |pos| tail_start + pos + 1)
    };
    std::fs::write(log_path, &contents[keep_from..])
}

fn set_logging_enabled(enabled: bool) {
    if enabled {
        log::set_max_level(LevelFilter::Debug);
    } else {
        log::set_max_level(LevelFilter::Off);
    }
}

/// Debug runs log to stderr and append to the data-dir log file. Other runs
/// install nothing and leave the global level at `Off`.
pub fn init_logging(debug_enabled: bool, max_log_size: u64) {
    let log_path = if debug_enabled {
        AppPaths::new().ok().and_then(|paths| {
            paths.ensure_dirs().ok()?;
            Some(paths.log_file())
        })
    } else {
        None
    };
    init_logging_at(log_path.as_deref(), debug_enabled, max_log_size);
}

fn init_logging_at(log_path: Option<&Path>, debug_enabled: bool, max_log_size: u64) {
    set_logging_enabled(false);
    if !debug_enabled {
        return;
    }

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("dlss")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Debug,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(log_path) = log_path {
        if let Err(error) = keep_recent_lines(log_path, max_log_size) {
            eprintln!("Warning: could not trim {}: {error}", log_path.display());
        }
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, config, file)),
            Err(error) => eprintln!("Warning: could not open {}: {error}", log_path.display()),
        }
    }

    if CombinedLogger::init(loggers).is_err() {
        return;
    }
    set_logging_enabled(true);

    if let Some(log_path) = log_path {
        log::info!("Debug logging initialized, log file: {}", log_path.display());
    }
}
