//! driftscan - GitOps coverage audits and cluster drift detection.
//!
//! This is the entry point for the `driftscan` binary. Logs go to stderr,
//! the JSON report to stdout.

mod cli;
mod namespaces;
mod report;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use driftscan_client::{KubeTransport, ResourceClient};
use driftscan_core::AuditConfig;
use driftscan_scanner::{AuditScanner, DriftScanner, ScanPhase, ScanProgress};
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{AuditArgs, Cli, Command, DiffArgs, ScanArgs};
use report::{AuditReport, DriftReport};

/// How often scan progress is logged.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "info,driftscan=debug"
    } else {
        "info,driftscan=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Audit(args) => run_audit(args).await,
        Command::Diff(args) => run_diff(args).await,
    }
}

async fn connect(
    context: Option<&str>,
    config: &AuditConfig,
) -> anyhow::Result<Arc<ResourceClient<KubeTransport>>> {
    let transport = KubeTransport::connect(context)
        .await
        .with_context(|| format!("failed to connect to {}", context.unwrap_or("current context")))?;
    Ok(Arc::new(ResourceClient::new(
        transport,
        config.resource_types.clone(),
        config.retry.clone(),
    )))
}

/// Namespaces named on the command line, or every listed namespace that
/// passes the regex filters.
async fn candidate_namespaces<F>(args: &ScanArgs, list_all: F) -> anyhow::Result<Vec<String>>
where
    F: Future<Output = driftscan_scanner::Result<Vec<String>>>,
{
    let requested = args.requested_namespaces();
    if !requested.is_empty() {
        return Ok(requested);
    }

    let all = list_all.await.context("failed to list namespaces")?;
    let selected =
        namespaces::filter_namespaces(all, args.regex.as_deref(), args.exclude.as_deref());
    if selected.is_empty() {
        bail!("no namespaces match the given filters");
    }
    Ok(selected)
}

/// Log progress until the run leaves the scanning phases.
fn spawn_progress_logger(progress: Arc<ScanProgress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let snapshot = progress.snapshot();
            if matches!(snapshot.phase, ScanPhase::Done | ScanPhase::Failed) {
                break;
            }
            if snapshot.phase == ScanPhase::Scanning {
                info!(
                    completed = snapshot.completed,
                    total = snapshot.total,
                    "Scan in progress"
                );
            }
        }
    })
}

async fn run_audit(args: AuditArgs) -> anyhow::Result<()> {
    let config = args.scan.load_config()?;
    let rules = Arc::new(config.compile_rules().context("invalid classification rules")?);
    let client = connect(args.context.as_deref(), &config).await?;

    let scanner = AuditScanner::new(client, rules, config.performance.clone());
    let cluster = scanner.current_context();
    info!(cluster = %cluster, "Auditing cluster");

    let candidates = candidate_namespaces(&args.scan, scanner.list_namespaces()).await?;
    let namespaces = scanner.validate_namespaces(&candidates).await?;

    let logger = spawn_progress_logger(scanner.progress());
    let results = scanner.analyze_namespaces(&namespaces).await;
    logger.abort();
    let results = results?;

    report::print(&AuditReport::new(&cluster, &results))
}

async fn run_diff(args: DiffArgs) -> anyhow::Result<()> {
    let mut config = args.scan.load_config()?;
    config.comparison.compare_resource_contents |= args.compare_contents;
    config.comparison.strict_api_version |= args.strict_api_version;
    let rules = Arc::new(config.compile_rules().context("invalid classification rules")?);

    let source = connect(Some(&args.source), &config).await?;
    let target = connect(Some(&args.target), &config).await?;

    let scanner = DriftScanner::new(
        source,
        target,
        rules,
        config.comparison,
        config.performance.clone(),
    );
    let (source_info, target_info) = scanner.cluster_info();
    info!(source = %source_info, target = %target_info, "Comparing clusters");

    let candidates = candidate_namespaces(&args.scan, scanner.list_namespaces()).await?;
    let namespaces = scanner.validate_namespaces(&candidates).await?;

    let logger = spawn_progress_logger(scanner.progress());
    let results = scanner.compare_namespaces(&namespaces).await;
    logger.abort();
    let results = results?;

    report::print(&DriftReport::new(&source_info, &target_info, &results))
}
