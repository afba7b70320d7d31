//! Entrypoint of the tsbench binary

use anyhow::Context;
use dotenvy::dotenv;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::common::LoggingConfig;

mod commands {
    pub(crate) mod common;
    pub(crate) mod generate_data;
    pub(crate) mod generate_queries;
    pub(crate) mod plan;
}

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "tsbench",
    version,
    about = "Time-series benchmark workload generator and query planner",
    long_about = r#"Time-series benchmark workload generator and query planner

Examples:
    # List the devops query types
    tsbench generate-queries --list-query-types

    # Generate 100 single-groupby queries for 100 hosts over one day
    tsbench generate-queries --scale 100 --query-type single-groupby-1-1-1 --queries 100 > queries.jsonl

    # Plan them against the series catalog of the same dataset
    tsbench plan --scale 100 --file queries.jsonl

    # Generate the matching Cassandra bulk-load data, with debug logging
    tsbench -vv generate-data --scale 100 --format cassandra > data.csv
"#
)]
struct Config {
    #[clap(flatten)]
    logging_config: LoggingConfig,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, clap::Parser)]
enum Command {
    /// Generate high-level queries as JSON lines
    GenerateQueries(commands::generate_queries::Config),

    /// Generate synthetic devops data in a bulk-load format
    GenerateData(commands::generate_data::Config),

    /// Plan high-level queries against the series catalog of a dataset
    Plan(commands::plan::Config),
}

fn main() {
    // load all environment variables from .env before doing anything
    load_dotenv();

    let config: Config = clap::Parser::parse();

    if let Err(e) = init_logs(&config.logging_config) {
        eprintln!("Initializing logs failed: {e:#}");
        std::process::exit(ReturnCode::Failure as _);
    }

    match config.command {
        None => println!("command required, -h/--help for help"),
        Some(Command::GenerateQueries(config)) => {
            if let Err(e) = commands::generate_queries::command(config) {
                eprintln!("Generate queries command failed: {e:#}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }
        Some(Command::GenerateData(config)) => {
            if let Err(e) = commands::generate_data::command(config) {
                eprintln!("Generate data command failed: {e:#}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }
        Some(Command::Plan(config)) => {
            if let Err(e) = commands::plan::command(config) {
                eprintln!("Plan command failed: {e:#}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }
    }
}

/// Source the .env file before initialising the Config struct - this sets
/// any envs in the file, which the Config struct then uses.
///
/// Precedence is given to existing env variables.
fn load_dotenv() {
    match dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            // a missing env file is fine, defaults apply
        }
        Err(e) => {
            eprintln!("FATAL Error loading config from: {e}");
            eprintln!("Aborting");
            std::process::exit(ReturnCode::Failure as _);
        }
    };
}

/// Install a global subscriber writing to stderr, so stdout only carries generated output
fn init_logs(config: &LoggingConfig) -> anyhow::Result<()> {
    let directive = config.filter_directive();
    let filter = EnvFilter::try_new(directive)
        .with_context(|| format!("invalid log filter '{directive}'"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("failed to install the global log subscriber")
}
