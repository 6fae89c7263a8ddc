use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;

use crate::card_type::{normalize_selection, CardType};
use crate::commands::CommandRunner;
use crate::config::{default_backgrounds_folder, Config, DEFAULT_CONFIG_PATH};
use crate::dispatcher::{execute_pool, JobResult};
use crate::errors::Result;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    pub input_path: PathBuf,

    pub output_path: PathBuf,

    /// Restrict processing to these card types (repeatable)
    #[arg(short = 't', long = "type", value_enum)]
    pub card_types: Vec<CardType>,

    /// Number of worker threads
    #[arg(short, long, value_parser = check_processes)]
    pub processes: Option<usize>,

    #[arg(short, long, env = "CARDCONVERT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Folder holding composite backgrounds [default: <config dir>/../backgrounds]
    #[arg(short, long, env = "BACKGROUNDS_FOLDER")]
    pub backgrounds: Option<PathBuf>,

    /// Also append log records to this file
    #[arg(long, env = "CARDCONVERT_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

fn check_processes(s: &str) -> std::result::Result<usize, String> {
    let processes: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a number", s))?;
    if processes == 0 {
        return Err("at least one process is required".to_string());
    }
    Ok(processes)
}

/// Results of a completed run and the time spent dispatching.
#[derive(Debug)]
pub struct Report {
    pub results: Vec<JobResult>,
    pub elapsed: Duration,
}

impl Report {
    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed.as_secs_f64() / 60.0
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The input path did not exist; nothing was loaded or dispatched.
    InputMissing(PathBuf),
    Completed(Report),
}

impl RunOutcome {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RunOutcome::Completed(report) if report.failures() > 0 => ExitCode::FAILURE,
            _ => ExitCode::SUCCESS,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::InputMissing(path) => {
                write!(f, "Input path \"{}\" does not exist", path.display())
            }
            RunOutcome::Completed(report) => {
                for result in &report.results {
                    writeln!(f, "{}", result)?;
                }
                write!(f, "Finished in {:.2} minutes", report.elapsed_minutes())
            }
        }
    }
}

/// Validates the input path, loads the configuration and dispatches the jobs.
pub fn run<R: CommandRunner + ?Sized>(cli: &Cli, runner: &R) -> Result<RunOutcome> {
    if !cli.input_path.exists() {
        return Ok(RunOutcome::InputMissing(cli.input_path.clone()));
    }

    let config = Config::load(&cli.config)?;
    let backgrounds = cli
        .backgrounds
        .clone()
        .unwrap_or_else(|| default_backgrounds_folder(&cli.config));
    let card_types = normalize_selection(&cli.card_types);

    let start = Instant::now();
    let results = execute_pool(
        &card_types,
        &config,
        &cli.input_path,
        &cli.output_path,
        cli.processes,
        &backgrounds,
        runner,
    )?;
    let report = Report {
        results,
        elapsed: start.elapsed(),
    };

    tracing::info!(
        jobs = report.results.len(),
        failures = report.failures(),
        "conversion finished"
    );
    Ok(RunOutcome::Completed(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["card-convert", "in", "out"]).unwrap();
        assert_eq!(cli.input_path, PathBuf::from("in"));
        assert_eq!(cli.output_path, PathBuf::from("out"));
        assert!(cli.card_types.is_empty());
        assert_eq!(cli.processes, None);
        assert_eq!(cli.log_file, None);
    }

    #[test]
    fn test_parse_log_file() {
        let cli =
            Cli::try_parse_from(["card-convert", "in", "out", "--log-file", "convert.log"])
                .unwrap();
        assert_eq!(cli.log_file, Some(PathBuf::from("convert.log")));
    }

    #[test]
    fn test_parse_repeated_types() {
        let cli = Cli::try_parse_from([
            "card-convert",
            "in",
            "out",
            "-t",
            "cardbacks",
            "--type",
            "heroes",
            "-p",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.card_types, vec![CardType::Cardbacks, CardType::Heroes]);
        assert_eq!(cli.processes, Some(3));
    }

    #[test]
    fn test_rejects_unknown_type_and_zero_processes() {
        assert!(Cli::try_parse_from(["card-convert", "in", "out", "-t", "spells"]).is_err());
        assert!(Cli::try_parse_from(["card-convert", "in", "out", "-p", "0"]).is_err());
    }

    #[test]
    fn test_missing_input_message() {
        let outcome = RunOutcome::InputMissing(PathBuf::from("/does/not/exist"));
        assert_eq!(
            outcome.to_string(),
            "Input path \"/does/not/exist\" does not exist"
        );
    }

    #[test]
    fn test_elapsed_minutes() {
        let report = Report {
            results: Vec::new(),
            elapsed: Duration::from_secs(90),
        };
        assert!((report.elapsed_minutes() - 1.5).abs() < f64::EPSILON);
        assert_eq!(report.failures(), 0);
    }
}
