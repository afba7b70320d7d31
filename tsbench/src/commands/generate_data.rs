use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tsbench_data::{CassandraSerializer, LineProtocolSerializer, PointSerializer, write_points};
use tsbench_workload::CpuSimulator;

use super::common::{DatasetConfig, OutputConfig};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub(crate) enum Format {
    /// InfluxDB line protocol
    Influx,
    /// Cassandra bulk-load rows
    Cassandra,
}

impl Format {
    fn serializer(self) -> &'static dyn PointSerializer {
        match self {
            Self::Influx => &LineProtocolSerializer,
            Self::Cassandra => &CassandraSerializer,
        }
    }
}

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    dataset: DatasetConfig,

    #[clap(flatten)]
    output: OutputConfig,

    /// Bulk-load format to write
    #[clap(
        long = "format",
        env = "TSBENCH_FORMAT",
        value_enum,
        default_value = "cassandra"
    )]
    format: Format,

    /// Time between two readings of a host, e.g. `10s`
    #[clap(
        long = "log-interval",
        env = "TSBENCH_LOG_INTERVAL",
        default_value = "10s",
        value_parser = humantime::parse_duration
    )]
    log_interval: Duration,
}

pub(crate) fn command(config: Config) -> anyhow::Result<()> {
    let model = config.dataset.model();
    let simulator = CpuSimulator::new(
        &model,
        config.dataset.start(),
        config.dataset.end(),
        config.log_interval,
        config.dataset.seed,
    )
    .context("invalid simulation settings")?;

    let serializer = config.format.serializer();
    let summary = write_points(serializer, simulator, config.output.writer()?)
        .context("failed to write points")?;

    info!(
        format = serializer.name(),
        hosts = model.scale(),
        points = summary.points_written,
        lines = summary.lines_written,
        bytes = summary.bytes_written,
        "generated data"
    );
    Ok(())
}
