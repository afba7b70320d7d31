use std::io::Write;

use anyhow::{Context, bail};
use tracing::info;
use tsbench_workload::{UseCase, UseCaseRegistry};

use super::common::{DatasetConfig, OutputConfig};

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    dataset: DatasetConfig,

    #[clap(flatten)]
    output: OutputConfig,

    /// Use case to generate queries for
    #[clap(long = "use-case", env = "TSBENCH_USE_CASE", default_value = "devops")]
    use_case: UseCase,

    /// Query type to generate, e.g. `single-groupby-1-1-1`
    #[clap(long = "query-type", env = "TSBENCH_QUERY_TYPE")]
    query_type: Option<String>,

    /// Target database the queries are generated for
    #[clap(long = "format", env = "TSBENCH_QUERY_FORMAT", default_value = "cassandra")]
    backend: String,

    /// Number of queries to generate
    #[clap(long = "queries", env = "TSBENCH_QUERIES", default_value_t = 1000)]
    queries: usize,

    /// Print the query types of the use case and exit
    #[clap(long = "list-query-types", default_value_t = false)]
    list_query_types: bool,
}

pub(crate) fn command(config: Config) -> anyhow::Result<()> {
    let registry = UseCaseRegistry::standard().context("failed to set up the use case registry")?;

    if config.list_query_types {
        let mut out = config.output.writer()?;
        for query_type in registry.query_types(config.use_case) {
            writeln!(out, "{query_type}")?;
        }
        out.flush()?;
        return Ok(());
    }

    let Some(query_type) = config.query_type else {
        bail!("a query type is required, use --list-query-types to see the available ones");
    };
    let mut generator = registry
        .query_generator(
            &config.backend,
            config.use_case,
            &query_type,
            &config.dataset.generator_config(),
        )
        .with_context(|| format!("cannot generate '{query_type}' queries"))?;

    let mut out = config.output.writer()?;
    for _ in 0..config.queries {
        let query = generator.generate()?;
        serde_json::to_writer(&mut out, &query).context("failed to write query")?;
        writeln!(out)?;
    }
    out.flush()?;

    info!(
        backend = %config.backend,
        use_case = %config.use_case,
        query_type = %query_type,
        queries = config.queries,
        "generated queries"
    );
    Ok(())
}
