//! JSON reports written to stdout.

use std::collections::BTreeMap;
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use driftscan_core::{AnalysisResult, ClusterInfo, ComparisonResult};
use serde::Serialize;

/// Totals across every audited namespace.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub namespaces: usize,
    pub fully_managed_namespaces: usize,
    pub total_resources: usize,
    pub root_resources: usize,
    pub managed: usize,
    pub manual: usize,
    pub excluded: usize,
}

impl AuditSummary {
    fn from_results(results: &BTreeMap<String, AnalysisResult>) -> Self {
        results.values().fold(
            Self {
                namespaces: results.len(),
                ..Self::default()
            },
            |mut summary, result| {
                summary.fully_managed_namespaces += usize::from(result.is_fully_managed());
                summary.total_resources += result.total_resources;
                summary.root_resources += result.root_resources;
                summary.managed += result.managed_count;
                summary.manual += result.manual_count;
                summary.excluded += result.excluded_count;
                summary
            },
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport<'a> {
    pub cluster: &'a ClusterInfo,
    pub generated_at: DateTime<Utc>,
    pub summary: AuditSummary,
    pub results: &'a BTreeMap<String, AnalysisResult>,
}

impl<'a> AuditReport<'a> {
    pub fn new(cluster: &'a ClusterInfo, results: &'a BTreeMap<String, AnalysisResult>) -> Self {
        Self {
            cluster,
            generated_at: Utc::now(),
            summary: AuditSummary::from_results(results),
            results,
        }
    }
}

/// Totals across every compared namespace.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftSummary {
    pub namespaces: usize,
    pub in_sync_namespaces: usize,
    pub only_in_source: usize,
    pub only_in_target: usize,
    pub modified: usize,
}

impl DriftSummary {
    fn from_results(results: &BTreeMap<String, ComparisonResult>) -> Self {
        results.values().fold(
            Self {
                namespaces: results.len(),
                ..Self::default()
            },
            |mut summary, result| {
                summary.in_sync_namespaces += usize::from(result.is_in_sync());
                summary.only_in_source += result.only_in_source.len();
                summary.only_in_target += result.only_in_target.len();
                summary.modified += result.modified.len();
                summary
            },
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport<'a> {
    pub source: &'a ClusterInfo,
    pub target: &'a ClusterInfo,
    pub generated_at: DateTime<Utc>,
    pub summary: DriftSummary,
    pub results: &'a BTreeMap<String, ComparisonResult>,
}

impl<'a> DriftReport<'a> {
    pub fn new(
        source: &'a ClusterInfo,
        target: &'a ClusterInfo,
        results: &'a BTreeMap<String, ComparisonResult>,
    ) -> Self {
        Self {
            source,
            target,
            generated_at: Utc::now(),
            summary: DriftSummary::from_results(results),
            results,
        }
    }
}

/// Pretty-print `report` to stdout.
pub fn print<T: Serialize>(report: &T) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, report)?;
    writeln!(stdout)?;
    Ok(())
}
