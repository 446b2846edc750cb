use cloudvet_core::ServiceError;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

mod awscli;
pub use awscli::AwsCli;

/// Tag applied to every classification job this tool creates.
pub const SCRIPT_TAG: (&str, &str) = ("script_created", "True");

/// One advisory result from the policy-analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub issue_code: String,
    pub finding_type: String,
    pub finding_details: String,
    pub learn_more_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketTag {
    pub key: String,
    pub value: String,
}

/// A bucket as reported by the scanning service's inventory. `tags` is
/// `None` when the service has no tag metadata for the bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketCandidate {
    pub bucket_name: String,
    pub account_id: String,
    #[serde(default)]
    pub tags: Option<Vec<BucketTag>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFrequency {
    OneTime,
    Scheduled,
}

impl JobFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobFrequency::OneTime => "ONE_TIME",
            JobFrequency::Scheduled => "SCHEDULED",
        }
    }
}

impl std::fmt::Display for JobFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ClassificationJobRequest {
    pub name: String,
    pub description: String,
    pub frequency: JobFrequency,
    pub bucket: String,
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReceipt {
    pub job_arn: String,
    pub job_id: String,
}

// Injectable client seams; operations take these as trait objects so tests
// can drive them with fakes.

pub trait CallerIdentity {
    fn account_id(&self) -> Result<String, ServiceError>;
}

pub trait PolicyAnalyzer {
    fn validate_policy(&self, document: &Json) -> Result<Vec<Finding>, ServiceError>;
}

pub trait BucketInventory {
    fn describe_buckets(&self) -> Result<Vec<BucketCandidate>, ServiceError>;
}

pub trait ClassificationJobs {
    fn create_job(&self, request: &ClassificationJobRequest) -> Result<JobReceipt, ServiceError>;
}
