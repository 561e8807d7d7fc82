//! Command-line front end: parses flags, loads settings, sets up logging
//! and turns any error into a message plus a failure exit code.

mod app;
mod cli;
mod error;
mod logging;
mod report;
mod settings;

use std::io;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use crate::cli::Cli;
use crate::error::CliError;
use crate::settings::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Some(operation) = cli.operation()? else {
        return write_help(&mut io::stdout().lock());
    };

    let settings = Settings::load(cli.config.as_deref())?;
    logging::init_logging(settings.debug_enabled(&cli), settings.max_log_size_bytes);

    let config = settings.swap_config(&cli);
    log::debug!("Running {operation:?} against {}", config.catalog_url);
    app::execute(&config, operation).await
}

fn write_help(out: &mut impl io::Write) -> Result<(), CliError> {
    Cli::command().write_help(out).map_err(CliError::Help)
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::write_help;
    use crate::error::CliError;

    struct ClosedPipe;

    impl io::Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn help_lists_operations() {
        let mut out = Vec::new();
        write_help(&mut out).expect("help should be written");
        let text = String::from_utf8(out).expect("help should be utf-8");
        assert!(text.contains("--list-versions"));
    }

    #[test]
    fn failed_help_write_is_reported() {
        let error = write_help(&mut ClosedPipe).expect_err("closed pipe must fail");
        assert!(matches!(
            error,
            CliError::Help(ref source) if source.kind() == io::ErrorKind::BrokenPipe
        ));
        assert_eq!(error.to_string(), "failed to print help: broken pipe");
    }
}
