use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tsbench_workload::{DevopsModel, GeneratorConfig};

const DEFAULT_LOG_FILTER: &str = "info";

/// CLI config for logging
#[derive(Debug, clap::Parser)]
pub(crate) struct LoggingConfig {
    /// Logs: filter directive
    ///
    /// Configures log severity level filter, by target.
    ///
    /// Simplest options: error, warn, info, debug, trace
    ///
    /// Levels for different modules can be specified. For example `debug,tsbench_data=info`
    /// specifies debug logging for everything except the data serializers.
    ///
    /// Overridden by `-v`.
    #[clap(long = "log-filter", env = "LOG_FILTER", global = true)]
    pub(crate) log_filter: Option<String>,

    /// Logs: filter short-hand
    ///
    /// Convenient way to set log severity level filter.
    /// Overrides `--log-filter`.
    ///
    /// -v   'info'
    ///
    /// -vv  'debug'
    ///
    /// -vvv 'trace'
    #[clap(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        verbatim_doc_comment
    )]
    pub(crate) log_verbose_count: u8,
}

impl LoggingConfig {
    pub(crate) fn filter_directive(&self) -> &str {
        match self.log_verbose_count {
            0 => self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER),
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// The dataset a command works on: the devops fleet and the time range it reports over
///
/// Every command must be given the same values to agree on hosts, series and time range.
#[derive(Debug, clap::Parser)]
pub(crate) struct DatasetConfig {
    /// Number of simulated hosts
    #[clap(long = "scale", env = "TSBENCH_SCALE", default_value_t = 1)]
    pub(crate) scale: usize,

    /// Seed for every random choice; the same seed reproduces the same dataset and queries
    #[clap(long = "seed", env = "TSBENCH_SEED", default_value_t = 0)]
    pub(crate) seed: u64,

    /// Start of the dataset, as an RFC3339 date-time
    #[clap(
        long = "timestamp-start",
        env = "TSBENCH_TIMESTAMP_START",
        default_value = "2016-01-01T00:00:00Z"
    )]
    pub(crate) start: Timestamp,

    /// End of the dataset (exclusive), as an RFC3339 date-time
    #[clap(
        long = "timestamp-end",
        env = "TSBENCH_TIMESTAMP_END",
        default_value = "2016-01-02T00:00:00Z"
    )]
    pub(crate) end: Timestamp,
}

impl DatasetConfig {
    pub(crate) fn start(&self) -> DateTime<Utc> {
        self.start.into()
    }

    pub(crate) fn end(&self) -> DateTime<Utc> {
        self.end.into()
    }

    pub(crate) fn model(&self) -> DevopsModel {
        DevopsModel::new(self.scale, self.seed)
    }

    pub(crate) fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            start: self.start(),
            end: self.end(),
            scale: self.scale,
            seed: self.seed,
        }
    }
}

/// A UTC date-time given on the command line
///
/// Accepts RFC3339 in UTC; the trailing `Z` may be omitted.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timestamp(DateTime<Utc>);

impl FromStr for Timestamp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        humantime::parse_rfc3339_weak(s)
            .map(|t| Self(DateTime::<Utc>::from(t)))
            .with_context(|| format!("could not parse date-time value: {s}"))
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(t: Timestamp) -> Self {
        t.0
    }
}

/// Where a command writes its output
#[derive(Debug, clap::Parser)]
pub(crate) struct OutputConfig {
    /// File to write to instead of stdout
    #[clap(short = 'o', long = "output", env = "TSBENCH_OUTPUT")]
    pub(crate) path: Option<PathBuf>,
}

impl OutputConfig {
    /// A buffered writer to the output file, or to stdout
    pub(crate) fn writer(&self) -> anyhow::Result<Box<dyn Write>> {
        Ok(match &self.path {
            Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
                format!("failed to create output file {}", path.display())
            })?)),
            None => Box::new(BufWriter::new(io::stdout().lock())),
        })
    }
}
