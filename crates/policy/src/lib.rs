//! Per-policy validation loop: submit each extracted document to the
//! policy-analysis service, retry transient failures, and aggregate any
//! findings keyed by policy name. Policies with no findings do not appear
//! in the report, so an empty report means a clean run.

use cloudvet_aws::{Finding, PolicyAnalyzer};
use cloudvet_cfn::PolicyRecord;
use cloudvet_core::{retry, RetryPolicy};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindingSummary {
    #[serde(rename = "Finding Code")]
    pub finding_code: String,
    #[serde(rename = "Finding Details")]
    pub finding_details: String,
    #[serde(rename = "Learn more link")]
    pub learn_more_link: String,
}

impl From<Finding> for FindingSummary {
    fn from(f: Finding) -> Self {
        FindingSummary {
            finding_code: format!("{} ({})", f.issue_code, f.finding_type),
            finding_details: f.finding_details,
            learn_more_link: f.learn_more_link,
        }
    }
}

pub type ValidationReport = BTreeMap<String, Vec<FindingSummary>>;

/// Validate every record. A record that still fails after the retry budget
/// (or fails with a non-transient error, typically an internal service
/// fault) is logged and skipped; the run carries on.
pub fn validate_policies(
    analyzer: &dyn PolicyAnalyzer,
    records: &[PolicyRecord],
    retry_policy: &RetryPolicy,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    for record in records {
        tracing::info!(policy = %record.name, "analysing policy");
        match retry::retry_call(retry_policy, || analyzer.validate_policy(&record.document)) {
            Ok(findings) if findings.is_empty() => {
                tracing::info!(policy = %record.name, "no findings");
            }
            Ok(findings) => {
                report.insert(
                    record.name.clone(),
                    findings.into_iter().map(FindingSummary::from).collect(),
                );
            }
            Err(e) => {
                tracing::warn!(policy = %record.name, error = %e, "failed to validate policy");
            }
        }
    }
    report
}
