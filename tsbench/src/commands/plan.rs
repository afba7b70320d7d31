use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::{info, warn};
use tsbench_planner::{AggregationPlan, ClientSideIndex, HighLevelQuery, QueryPlanner};
use tsbench_workload::build_catalog;

use super::common::{DatasetConfig, OutputConfig};

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    dataset: DatasetConfig,

    #[clap(flatten)]
    output: OutputConfig,

    /// JSON lines file of high-level queries; read from stdin if not given
    #[clap(short = 'f', long = "file", env = "TSBENCH_QUERIES_FILE")]
    file: Option<PathBuf>,

    /// Where aggregated queries are aggregated: `server` or `client`
    #[clap(
        long = "aggregation-plan",
        env = "TSBENCH_AGGREGATION_PLAN",
        default_value = "server"
    )]
    aggregation_plan: AggregationPlan,
}

pub(crate) fn command(config: Config) -> anyhow::Result<()> {
    let model = config.dataset.model();
    let catalog = build_catalog(&model, config.dataset.start(), config.dataset.end())
        .context("failed to build the series catalog")?;
    let planner = QueryPlanner::new(Arc::new(ClientSideIndex::new(catalog)))
        .with_aggregation_plan(config.aggregation_plan);

    let input: Box<dyn BufRead> = match &config.file {
        Some(path) => Box::new(BufReader::new(File::open(path).with_context(|| {
            format!("failed to open queries file {}", path.display())
        })?)),
        None => Box::new(io::stdin().lock()),
    };
    let mut out = config.output.writer()?;

    let mut planned: usize = 0;
    let mut failed: usize = 0;
    let mut statements = 0;
    for (n, line) in input.lines().enumerate() {
        let line = line.context("failed to read queries")?;
        if line.trim().is_empty() {
            continue;
        }
        let query: HighLevelQuery = serde_json::from_str(&line)
            .with_context(|| format!("invalid query on line {}", n + 1))?;

        match planner.plan(&query) {
            Ok(plan) => {
                planned += 1;
                statements += plan.statement_count();
                writeln!(out, "# {} {}", query.id, query.human_label)?;
                write!(out, "{plan}")?;
            }
            Err(e) => {
                failed += 1;
                warn!(
                    query_id = query.id,
                    label = %query.human_label,
                    kind = ?e.kind(),
                    error = %e,
                    "could not plan query"
                );
            }
        }
    }
    out.flush()?;

    info!(
        planned,
        failed,
        statements,
        aggregation_plan = %planner.aggregation_plan(),
        "planned queries"
    );
    if failed > 0 {
        bail!("{failed} of {} queries could not be planned", planned + failed);
    }
    Ok(())
}
