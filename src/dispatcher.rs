use std::fmt;
use std::path::{Path, PathBuf};

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::{prelude::*, ThreadPoolBuilder};

use crate::card::Card;
use crate::card_type::CardType;
use crate::commands::CommandRunner;
use crate::config::Config;
use crate::crawler;
use crate::errors::{CardConvertError, Result};

/// Outcome of one job.
#[derive(Debug)]
pub struct JobResult {
    pub card_type: CardType,
    pub name: String,
    pub locale: String,
    pub outcome: JobOutcome,
}

#[derive(Debug)]
pub enum JobOutcome {
    Finished { outputs: Vec<PathBuf> },
    Failed(CardConvertError),
}

impl JobResult {
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Finished { .. })
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            JobOutcome::Finished { outputs } => write!(
                f,
                "Finished processing {}:{} ({} files)",
                self.name,
                self.locale,
                outputs.len()
            ),
            JobOutcome::Failed(error) => {
                write!(f, "Failed processing {}:{}: {}", self.name, self.locale, error)
            }
        }
    }
}

/// Builds one job per card found for the selected card types.
///
/// Each type's cards are looked up under `<input>/<unity_folder>/<locale>`
/// for every configured locale, or directly under `<input>/<unity_folder>`
/// when no locale is configured.
pub fn build_jobs<'a>(
    card_types: &[CardType],
    config: &'a Config,
    input_path: &Path,
) -> Result<Vec<Card<'a>>> {
    let locales: Vec<&str> = if config.locale.is_empty() {
        vec![""]
    } else {
        config.locale.iter().map(String::as_str).collect()
    };

    let mut jobs = Vec::new();
    for &card_type in card_types {
        let rules = config.card_type(card_type)?;
        let frame_re = rules
            .frame_regex()
            .map_err(|e| CardConvertError::Validation {
                field: format!("card_types.{}.frame_re", card_type),
                reason: e.to_string(),
            })?;
        let type_root = input_path.join(&rules.unity_folder);

        for locale in &locales {
            let target = type_root.join(locale);
            let cards = crawler::crawl(&target, &frame_re, &rules.anim_folder);
            tracing::debug!(
                card_type = %card_type,
                locale = %locale,
                count = cards.len(),
                "crawled {}",
                target.display()
            );
            for (name, files) in cards {
                jobs.push(Card::new(
                    name,
                    locale.to_string(),
                    card_type,
                    files,
                    config,
                )?);
            }
        }
    }
    Ok(jobs)
}

/// Converts every card of the selected types on a pool of `processes`
/// worker threads and returns one result per job, in job order.
///
/// The pool size falls back to `config.processes`, then to the number of
/// logical cores. A failing job is recorded and does not stop the others.
pub fn execute_pool<R: CommandRunner + ?Sized>(
    card_types: &[CardType],
    config: &Config,
    input_path: &Path,
    output_path: &Path,
    processes: Option<usize>,
    backgrounds: &Path,
    runner: &R,
) -> Result<Vec<JobResult>> {
    let processes = processes
        .or(config.processes)
        .unwrap_or_else(Config::default_processes);

    let jobs = build_jobs(card_types, config, input_path)?;
    tracing::info!(jobs = jobs.len(), processes, "starting conversion");

    let pool = ThreadPoolBuilder::new().num_threads(processes).build()?;

    let progress_bar = progress_bar(jobs.len());
    let results = pool.install(|| {
        jobs.par_iter()
            .progress_with(progress_bar.clone())
            .map(|card| run_job(card, output_path, backgrounds, runner))
            .collect::<Vec<_>>()
    });
    progress_bar.finish();

    Ok(results)
}

fn run_job<R: CommandRunner + ?Sized>(
    card: &Card<'_>,
    output_path: &Path,
    backgrounds: &Path,
    runner: &R,
) -> JobResult {
    let outcome = match card.process(output_path, backgrounds, runner) {
        Ok(outputs) => {
            tracing::debug!("Finished processing {}:{}", card.name, card.locale);
            JobOutcome::Finished { outputs }
        }
        Err(e) => {
            tracing::warn!(card = %card, "{}", e);
            JobOutcome::Failed(e)
        }
    };

    JobResult {
        card_type: card.card_type,
        name: card.name.clone(),
        locale: card.locale.clone(),
        outcome,
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let progress_bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
    )
    .map(|s| s.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style);
    progress_bar
}
