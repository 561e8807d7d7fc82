use std::path::{Path, PathBuf};

use clap::{ArgGroup, Parser};
use dlss_core::VersionRequest;

use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(
    name = "dlss-swapper",
    about = "Download and swap DLSS dlls.",
    version,
    group(
        ArgGroup::new("operation")
            .args(["list_versions", "download", "swap", "restore", "info"])
            .multiple(false)
    )
)]
pub struct Cli {
    /// List available DLSS versions and quit
    #[arg(short = 'l', long)]
    pub list_versions: bool,

    /// The path to the game's directory
    #[arg(short = 'g', long, value_name = "DIR")]
    pub game_path: Option<PathBuf>,

    /// Download a DLSS version (default: latest) without swapping it
    #[arg(
        short = 'd',
        long,
        value_name = "VERSION",
        num_args = 0..=1,
        default_missing_value = "latest"
    )]
    pub download: Option<VersionRequest>,

    /// Directory the downloaded dll is written to (default: current directory)
    #[arg(short = 'o', long, value_name = "DIR", requires = "download")]
    pub output: Option<PathBuf>,

    /// Download a DLSS version or MD5 hash (default: latest) and swap it into the game
    #[arg(
        short = 's',
        long,
        value_name = "VERSION",
        num_args = 0..=1,
        default_missing_value = "latest",
        requires = "game_path"
    )]
    pub swap: Option<VersionRequest>,

    /// Restore the backed up DLSS dll in the game directory
    #[arg(short = 'r', long, requires = "game_path")]
    pub restore: bool,

    /// Print the game's DLSS version and quit
    #[arg(short = 'i', long, requires = "game_path")]
    pub info: bool,

    /// Catalog location (URL or local JSON file)
    #[arg(long, value_name = "URL")]
    pub catalog_url: Option<String>,

    /// Settings file to use instead of the per-user one
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long)]
    pub debug: bool,

    /// Skip MD5 verification of the extracted dll
    #[arg(long)]
    pub no_verify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ListVersions,
    Download {
        request: VersionRequest,
        output_dir: Option<PathBuf>,
    },
    Swap {
        request: VersionRequest,
        game_dir: PathBuf,
    },
    Restore {
        game_dir: PathBuf,
    },
    Info {
        game_dir: PathBuf,
    },
}

impl Cli {
    /// The operation requested on the command line, if any.
    ///
    /// Game and output directories are checked here so a bad path fails
    /// before anything is fetched.
    pub fn operation(&self) -> Result<Option<Operation>, CliError> {
        if self.list_versions {
            return Ok(Some(Operation::ListVersions));
        }

        if let Some(request) = &self.download {
            if let Some(dir) = &self.output {
                ensure_dir(dir)?;
            }
            return Ok(Some(Operation::Download {
                request: request.clone(),
                output_dir: self.output.clone(),
            }));
        }

        let Some(game_dir) = &self.game_path else {
            return Ok(None);
        };
        ensure_dir(game_dir)?;
        let game_dir = game_dir.clone();

        Ok(if let Some(request) = &self.swap {
            Some(Operation::Swap {
                request: request.clone(),
                game_dir,
            })
        } else if self.restore {
            Some(Operation::Restore { game_dir })
        } else if self.info {
            Some(Operation::Info { game_dir })
        } else {
            None
        })
    }
}

fn ensure_dir(path: &Path) -> Result<(), CliError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(CliError::NotADirectory(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use clap::error::ErrorKind;

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("dlss-swapper").chain(args.iter().copied()))
    }

    #[test]
    fn swap_without_value_requests_latest() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let game = temp.path().to_str().expect("utf-8 path");
        let cli = parse(&["-g", game, "-s"]).expect("arguments should parse");

        assert_eq!(
            cli.operation().expect("game dir exists"),
            Some(Operation::Swap {
                request: VersionRequest::Latest,
                game_dir: temp.path().to_path_buf(),
            })
        );
    }

    #[test]
    fn swap_accepts_explicit_version() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let game = temp.path().to_str().expect("utf-8 path");
        let cli = parse(&["--swap", "3.5.10", "--game-path", game]).expect("arguments should parse");

        assert!(matches!(
            cli.operation(),
            Ok(Some(Operation::Swap { request: VersionRequest::Exact(ref v), .. })) if v == "3.5.10"
        ));
    }

    #[test]
    fn operations_are_mutually_exclusive() {
        let error = parse(&["-l", "-d"]).expect_err("two operations must be rejected");
        assert_eq!(error.kind(), ErrorKind::ArgumentConflict);

        let error = parse(&["-r", "-i", "-g", "."]).expect_err("two operations must be rejected");
        assert_eq!(error.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn game_operations_require_game_path() {
        for args in [&["-s"][..], &["-r"][..], &["-i"][..]] {
            let error = parse(args).expect_err("game path is required");
            assert_eq!(error.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn missing_game_dir_fails_before_fetching() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let missing = temp.path().join("missing");
        let cli = parse(&["-r", "-g", missing.to_str().expect("utf-8 path")])
            .expect("arguments should parse");

        assert!(matches!(cli.operation(), Err(CliError::NotADirectory(ref p)) if *p == missing));
    }

    #[test]
    fn download_defaults_to_latest_and_working_directory() {
        let cli = parse(&["--download"]).expect("arguments should parse");
        assert_eq!(
            cli.operation().expect("no paths to check"),
            Some(Operation::Download {
                request: VersionRequest::Latest,
                output_dir: None,
            })
        );
    }

    #[test]
    fn no_operation_yields_none() {
        let cli = parse(&[]).expect("arguments should parse");
        assert_eq!(cli.operation().expect("nothing to check"), None);
    }
}
