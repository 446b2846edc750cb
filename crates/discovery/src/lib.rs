//! Bucket discovery and classification-job submission. Buckets come from an
//! explicit list, a plain-text file, or a tag match over the scanning
//! service's bucket inventory; each selected bucket gets one job with a
//! deterministic date-stamped name.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use cloudvet_aws::{
    BucketInventory, ClassificationJobRequest, ClassificationJobs, JobFrequency,
};
use cloudvet_core::ServiceError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One entry of the tag-spec file: `[{"Key": "...", "Value": "..."}, ...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagPair {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

pub fn load_tag_spec(path: &Path) -> Result<Vec<TagPair>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read tag spec '{}'", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("tag spec '{}' is not a JSON array of Key/Value pairs", path.display()))
}

/// One bucket name per line; blank lines are ignored.
pub fn load_bucket_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read bucket list '{}'", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Walk the bucket inventory and keep every bucket owned by `account_id`
/// that carries at least one of the spec's key/value pairs. The scan of a
/// bucket's tags stops at the first matching pair. Buckets without tag
/// metadata are skipped with a notice.
pub fn select_buckets(
    inventory: &dyn BucketInventory,
    spec: &[TagPair],
    account_id: &str,
) -> Result<Vec<String>, ServiceError> {
    let mut selected = Vec::new();
    for bucket in inventory.describe_buckets()? {
        if bucket.account_id != account_id {
            tracing::info!(
                bucket = %bucket.bucket_name,
                owner = %bucket.account_id,
                "bucket account does not match supplied account id"
            );
            continue;
        }
        let Some(tags) = &bucket.tags else {
            tracing::warn!(bucket = %bucket.bucket_name, "no tags found on bucket");
            continue;
        };
        let matched = spec
            .iter()
            .find(|pair| tags.iter().any(|t| t.key == pair.key && t.value == pair.value));
        if let Some(pair) = matched {
            tracing::info!(bucket = %bucket.bucket_name, key = %pair.key, value = %pair.value, "found tag on bucket");
            selected.push(bucket.bucket_name);
        }
    }
    Ok(selected)
}

/// `{bucket}_{dd-mm}_{FREQUENCY}`, so re-running the tool on the same day
/// with the same frequency collides rather than duplicating jobs.
pub fn job_name(bucket: &str, date: NaiveDate, frequency: JobFrequency) -> String {
    format!("{bucket}_{}_{frequency}", date.format("%d-%m"))
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct JobOutcome {
    pub enabled: Vec<String>,
    pub errored: Vec<String>,
}

/// Submit one classification job per bucket, partitioning results. Any
/// per-bucket failure is logged and recorded; it never aborts the rest.
pub fn submit_jobs(
    jobs: &dyn ClassificationJobs,
    buckets: &[String],
    frequency: JobFrequency,
    account_id: &str,
    date: NaiveDate,
) -> JobOutcome {
    let mut outcome = JobOutcome::default();
    for bucket in buckets {
        let request = ClassificationJobRequest {
            name: job_name(bucket, date, frequency),
            description: format!("Automated discovery job for {bucket}"),
            frequency,
            bucket: bucket.clone(),
            account_id: account_id.to_string(),
        };
        match jobs.create_job(&request) {
            Ok(receipt) => {
                tracing::info!(bucket = %bucket, job_arn = %receipt.job_arn, "job created");
                outcome.enabled.push(bucket.clone());
            }
            Err(ServiceError::Validation(e)) => {
                tracing::warn!(bucket = %bucket, error = %e, "check inputs and parameters");
                outcome.errored.push(bucket.clone());
            }
            Err(e) => {
                tracing::warn!(bucket = %bucket, error = %e, "job creation failed");
                outcome.errored.push(bucket.clone());
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudvet_aws::{BucketCandidate, BucketTag, JobReceipt};
    use std::cell::RefCell;

    struct FakeInventory {
        buckets: Vec<BucketCandidate>,
    }

    impl BucketInventory for FakeInventory {
        fn describe_buckets(&self) -> Result<Vec<BucketCandidate>, ServiceError> {
            Ok(self.buckets.clone())
        }
    }

    struct FakeJobs {
        // bucket names whose submission should fail with ValidationException
        reject: Vec<String>,
        requests: RefCell<Vec<ClassificationJobRequest>>,
    }

    impl ClassificationJobs for FakeJobs {
        fn create_job(&self, request: &ClassificationJobRequest) -> Result<JobReceipt, ServiceError> {
            self.requests.borrow_mut().push(request.clone());
            if self.reject.contains(&request.bucket) {
                return Err(ServiceError::Validation("invalid job name".into()));
            }
            Ok(JobReceipt {
                job_arn: format!("arn:aws:macie2:::classification-job/{}", request.name),
                job_id: request.name.clone(),
            })
        }
    }

    fn bucket(name: &str, account: &str, tags: Option<Vec<(&str, &str)>>) -> BucketCandidate {
        BucketCandidate {
            bucket_name: name.into(),
            account_id: account.into(),
            tags: tags.map(|pairs| {
                pairs
                    .into_iter()
                    .map(|(k, v)| BucketTag {
                        key: k.into(),
                        value: v.into(),
                    })
                    .collect()
            }),
        }
    }

    fn spec() -> Vec<TagPair> {
        vec![
            TagPair {
                key: "classification".into(),
                value: "sensitive".into(),
            },
            TagPair {
                key: "team".into(),
                value: "security".into(),
            },
        ]
    }

    #[test]
    fn selects_iff_account_matches_and_a_spec_pair_is_present() {
        let inventory = FakeInventory {
            buckets: vec![
                bucket("match-first-pair", "111", Some(vec![("classification", "sensitive")])),
                bucket("match-second-pair", "111", Some(vec![("team", "security")])),
                bucket("key-only-no-match", "111", Some(vec![("classification", "public")])),
                bucket("wrong-account", "222", Some(vec![("classification", "sensitive")])),
                bucket("untagged", "111", None),
            ],
        };
        let selected = select_buckets(&inventory, &spec(), "111").unwrap();
        assert_eq!(selected, vec!["match-first-pair", "match-second-pair"]);
    }

    #[test]
    fn bucket_matching_multiple_pairs_is_selected_once() {
        let inventory = FakeInventory {
            buckets: vec![bucket(
                "double-match",
                "111",
                Some(vec![("classification", "sensitive"), ("team", "security")]),
            )],
        };
        let selected = select_buckets(&inventory, &spec(), "111").unwrap();
        assert_eq!(selected, vec!["double-match"]);
    }

    #[test]
    fn job_name_is_bucket_date_frequency() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();
        assert_eq!(
            job_name("audit-logs", date, JobFrequency::OneTime),
            "audit-logs_23-08_ONE_TIME"
        );
        assert_eq!(
            job_name("audit-logs", date, JobFrequency::Scheduled),
            "audit-logs_23-08_SCHEDULED"
        );
    }

    #[test]
    fn rejected_bucket_lands_in_errored_and_the_rest_still_run() {
        let jobs = FakeJobs {
            reject: vec!["bad".into()],
            requests: RefCell::new(Vec::new()),
        };
        let buckets = vec!["first".to_string(), "bad".to_string(), "last".to_string()];
        let date = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();
        let outcome = submit_jobs(&jobs, &buckets, JobFrequency::OneTime, "111", date);
        assert_eq!(outcome.enabled, vec!["first", "last"]);
        assert_eq!(outcome.errored, vec!["bad"]);
        assert_eq!(jobs.requests.borrow().len(), 3);
    }

    #[test]
    fn requests_carry_the_fixed_description_and_account_scope() {
        let jobs = FakeJobs {
            reject: vec![],
            requests: RefCell::new(Vec::new()),
        };
        let date = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();
        submit_jobs(&jobs, &["audit-logs".to_string()], JobFrequency::Scheduled, "111", date);
        let requests = jobs.requests.borrow();
        assert_eq!(requests[0].description, "Automated discovery job for audit-logs");
        assert_eq!(requests[0].account_id, "111");
        assert_eq!(requests[0].name, "audit-logs_23-08_SCHEDULED");
    }
}
