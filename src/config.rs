use std::path::PathBuf;

use anyhow::bail;
use chrono::NaiveDate;
use clap::Parser;

use crate::generator::{
    DEFAULT_FIRST_DAY, DEFAULT_LAST_DAY, DEFAULT_PATIENTS, DEFAULT_SEED, GeneratorSettings,
};

/// Synthetic dental clinic analysis: generate a dataset, query it with SQL and
/// write a chart and an HTML report
#[derive(Debug, Clone, Parser)]
#[command(name = "dentalsim", version)]
pub struct Config {
    /// Number of patients to generate
    #[arg(short = 'n', long, default_value_t = DEFAULT_PATIENTS,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub patients: u32,

    /// Seed for the random generator
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// First calendar day for visit and exam dates
    #[arg(long = "from", default_value_t = DEFAULT_FIRST_DAY)]
    pub first_day: NaiveDate,

    /// Last calendar day for visit and exam dates
    #[arg(long = "to", default_value_t = DEFAULT_LAST_DAY)]
    pub last_day: NaiveDate,

    /// Directory for the chart and HTML report (must exist)
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Also write the generated rows to this JSONL file
    #[arg(long, value_name = "PATH")]
    pub export_jsonl: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_from(["dentalsim"])
    }
}

impl Config {
    /// Reject combinations clap cannot check on its own.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.first_day > self.last_day {
            bail!(
                "--from {} is after --to {}",
                self.first_day,
                self.last_day
            );
        }
        Ok(())
    }

    pub fn generator_settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            patients: self.patients,
            seed: self.seed,
            first_day: self.first_day,
            last_day: self.last_day,
        }
    }
}
