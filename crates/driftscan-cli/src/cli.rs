//! Command line arguments.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use driftscan_core::AuditConfig;
use tracing::info;

/// Audit GitOps coverage of Kubernetes clusters and detect drift between them.
#[derive(Parser, Debug)]
#[command(name = "driftscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report which resources of a cluster are not managed through GitOps.
    Audit(AuditArgs),
    /// Compare the resources of two clusters.
    Diff(DiffArgs),
}

#[derive(Args, Debug)]
pub struct AuditArgs {
    #[command(flatten)]
    pub scan: ScanArgs,

    /// Kubeconfig context to audit. Defaults to the current context.
    #[arg(long)]
    pub context: Option<String>,
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub scan: ScanArgs,

    /// Kubeconfig context of the source cluster.
    #[arg(long)]
    pub source: String,

    /// Kubeconfig context of the target cluster.
    #[arg(long)]
    pub target: String,

    /// Also report resources whose contents differ.
    #[arg(long)]
    pub compare_contents: bool,

    /// Treat resources with different API versions as different resources.
    #[arg(long)]
    pub strict_api_version: bool,
}

/// Options shared by every scan.
#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
    /// Namespaces to scan, comma separated.
    #[arg(value_name = "NAMESPACES", value_delimiter = ',')]
    pub positional: Vec<String>,

    /// Namespaces to scan, comma separated.
    #[arg(short = 'n', long = "namespaces", value_delimiter = ',')]
    pub namespaces: Vec<String>,

    /// Only scan namespaces matching this regular expression.
    #[arg(short = 'r', long)]
    pub regex: Option<String>,

    /// Skip namespaces matching this regular expression.
    #[arg(long)]
    pub exclude: Option<String>,

    /// Namespaces scanned in parallel.
    #[arg(short = 'P', long)]
    pub parallel: Option<usize>,

    /// Rules file.
    #[arg(short = 'f', long, env = "DRIFTSCAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Resource types per batch, 0 to size automatically.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Only scan the important resource types from the rules file.
    #[arg(long)]
    pub fast: bool,

    /// Deadline of the first attempt of each list call, in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Attempts per resource type before giving up.
    #[arg(long)]
    pub retry: Option<u32>,
}

impl ScanArgs {
    /// Namespaces named on the command line. Positional names win over `-n`.
    pub fn requested_namespaces(&self) -> Vec<String> {
        let names = if self.positional.is_empty() {
            &self.namespaces
        } else {
            &self.positional
        };
        names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Load the rules file, then apply environment and flag overrides.
    pub fn load_config(&self) -> anyhow::Result<AuditConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let config = AuditConfig::load(path)
                    .with_context(|| format!("failed to load config {}", path.display()))?;
                info!(path = %path.display(), "Loaded config");
                config
            }
            None => AuditConfig::default(),
        };

        config.apply_env_overrides();
        self.apply_to(&mut config);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn apply_to(&self, config: &mut AuditConfig) {
        if let Some(batch_size) = self.batch_size {
            config.performance.batch_size = batch_size;
        }
        if let Some(timeout) = self.timeout {
            config.retry.base_timeout_secs = timeout;
        }
        if let Some(attempts) = self.retry {
            config.retry.max_attempts = attempts;
        }

        if self.fast {
            info!(
                types = config.resource_types.important.len(),
                "Fast scan, important resource types only"
            );
            if self.parallel.is_none() {
                config.performance.max_concurrent = config.performance.fast_scan_concurrent;
            }
        } else {
            config.resource_types.important.clear();
        }

        if let Some(parallel) = self.parallel {
            config.performance.max_concurrent = parallel;
        }
    }
}
