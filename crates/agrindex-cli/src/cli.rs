use agrindex_core::config::{CliConfigOverrides, WorkingSetStrategy};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Agrindex - Per-field vegetation and moisture indices from Sentinel-2
#[derive(Parser, Debug)]
#[command(name = "agrindex")]
#[command(about = "Per-field vegetation and moisture indices from Sentinel-2", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./agrindex.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process the field-boundary document at a bucket and key
    Run(RunArgs),

    /// Process the first record of a storage event document
    Event(EventArgs),

    /// Show the layered configuration and where each value comes from
    Config,
}

/// Working set selection
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum WorkingSetArg {
    /// In-memory buffers (default)
    Memory,
    /// Temporary directory removed after the run
    Disk,
}

impl From<WorkingSetArg> for WorkingSetStrategy {
    fn from(arg: WorkingSetArg) -> Self {
        match arg {
            WorkingSetArg::Memory => WorkingSetStrategy::Memory,
            WorkingSetArg::Disk => WorkingSetStrategy::Disk,
        }
    }
}

/// Settings that may be overridden per invocation
#[derive(Args, Debug, Default)]
pub struct PipelineOverrides {
    /// Bucket receiving the index rasters
    #[arg(long)]
    pub output_bucket: Option<String>,

    /// Step Functions state machine for the follow-up workflow
    #[arg(long)]
    pub state_machine_arn: Option<String>,

    /// SNS topic for no-scene notifications
    #[arg(long)]
    pub notification_topic_arn: Option<String>,

    /// Upper bound on execution identity probes
    #[arg(long)]
    pub max_probe_attempts: Option<u32>,

    /// STAC search endpoint
    #[arg(long)]
    pub catalog_url: Option<String>,

    /// Where intermediate rasters live during the run
    #[arg(long, value_enum)]
    pub working_set: Option<WorkingSetArg>,
}

impl From<PipelineOverrides> for CliConfigOverrides {
    fn from(args: PipelineOverrides) -> Self {
        Self {
            catalog_url: args.catalog_url,
            output_bucket: args.output_bucket,
            state_machine_arn: args.state_machine_arn,
            notification_topic_arn: args.notification_topic_arn,
            max_probe_attempts: args.max_probe_attempts,
            working_set: args.working_set.map(Into::into),
        }
    }
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Bucket holding the field-boundary document
    #[arg(long)]
    pub bucket: String,

    /// Object key of the field-boundary document
    #[arg(long)]
    pub key: String,

    #[command(flatten)]
    pub overrides: PipelineOverrides,
}

#[derive(Parser, Debug)]
pub struct EventArgs {
    /// Path to the event JSON, or `-` for stdin
    pub path: PathBuf,

    #[command(flatten)]
    pub overrides: PipelineOverrides,
}
