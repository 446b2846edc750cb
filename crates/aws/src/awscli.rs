//! Real service client backed by the AWS CLI v2. Every call shells out to
//! `aws <service> <operation> --output json` and parses stdout; credentials
//! and default region come from the CLI's own configuration chain.

use crate::{
    BucketCandidate, CallerIdentity, ClassificationJobRequest, ClassificationJobs, Finding,
    JobReceipt, PolicyAnalyzer, SCRIPT_TAG,
};
use anyhow::{Context, Result};
use cloudvet_core::ServiceError;
use regex::Regex;
use serde_json::{json, Value as Json};
use std::path::PathBuf;
use std::process::Command;

pub struct AwsCli {
    bin: PathBuf,
    region: Option<String>,
}

impl AwsCli {
    pub fn locate(region: Option<String>) -> Result<Self> {
        let bin = which::which("aws").context("'aws' CLI not found in PATH. Install AWS CLI v2.")?;
        Ok(AwsCli { bin, region })
    }

    fn run(&self, args: &[&str]) -> Result<Json, ServiceError> {
        tracing::debug!(?args, "aws cli call");
        let mut cmd = Command::new(&self.bin);
        cmd.args(args).args(["--output", "json"]);
        if let Some(r) = &self.region {
            cmd.args(["--region", r]);
        }
        let out = cmd.output().map_err(ServiceError::other)?;
        if !out.status.success() {
            return Err(classify_cli_error(&String::from_utf8_lossy(&out.stderr)));
        }
        serde_json::from_slice(&out.stdout).map_err(ServiceError::other)
    }
}

/// The CLI reports service faults on stderr as
/// `An error occurred (SomeException) when calling the X operation: ...`.
/// Map the parenthesized code onto the retry taxonomy.
fn classify_cli_error(stderr: &str) -> ServiceError {
    let message = stderr.trim().to_string();
    let code = Regex::new(r"An error occurred \(([^)]+)\)")
        .ok()
        .and_then(|re| re.captures(stderr))
        .map(|c| c[1].to_string());
    match code.as_deref() {
        Some(
            code @ ("ThrottlingException" | "TooManyRequestsException" | "RequestTimeout"
            | "RequestTimeoutException" | "ServiceUnavailable" | "ServiceUnavailableException"
            | "SlowDown"),
        ) => ServiceError::Transient {
            code: code.to_string(),
            message,
        },
        Some("InternalServerException" | "InternalFailure" | "InternalError") => {
            ServiceError::Internal(message)
        }
        Some("ValidationException") => ServiceError::Validation(message),
        _ => ServiceError::Other(message),
    }
}

impl CallerIdentity for AwsCli {
    fn account_id(&self) -> Result<String, ServiceError> {
        let out = self.run(&["sts", "get-caller-identity"])?;
        out.get("Account")
            .and_then(Json::as_str)
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Other("get-caller-identity returned no Account".into()))
    }
}

impl PolicyAnalyzer for AwsCli {
    fn validate_policy(&self, document: &Json) -> Result<Vec<Finding>, ServiceError> {
        let body = serde_json::to_string(document).map_err(ServiceError::other)?;
        let out = self.run(&[
            "accessanalyzer",
            "validate-policy",
            "--locale",
            "EN",
            "--policy-type",
            "IDENTITY_POLICY",
            "--policy-document",
            &body,
        ])?;
        let findings = out.get("findings").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(findings).map_err(ServiceError::other)
    }
}

impl crate::BucketInventory for AwsCli {
    fn describe_buckets(&self) -> Result<Vec<BucketCandidate>, ServiceError> {
        let out = self.run(&["macie2", "describe-buckets"])?;
        let buckets = out.get("buckets").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(buckets).map_err(ServiceError::other)
    }
}

impl ClassificationJobs for AwsCli {
    fn create_job(&self, request: &ClassificationJobRequest) -> Result<JobReceipt, ServiceError> {
        let definition = json!({
            "bucketDefinitions": [{
                "accountId": request.account_id,
                "buckets": [request.bucket]
            }]
        });
        let definition = serde_json::to_string(&definition).map_err(ServiceError::other)?;
        let tag = format!("{}={}", SCRIPT_TAG.0, SCRIPT_TAG.1);
        let out = self.run(&[
            "macie2",
            "create-classification-job",
            "--description",
            &request.description,
            "--initial-run",
            "--job-type",
            request.frequency.as_str(),
            "--name",
            &request.name,
            "--s3-job-definition",
            &definition,
            "--tags",
            &tag,
        ])?;
        serde_json::from_value(out).map_err(ServiceError::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_is_transient() {
        let e = classify_cli_error(
            "An error occurred (ThrottlingException) when calling the ValidatePolicy operation: Rate exceeded",
        );
        assert!(e.is_transient());
    }

    #[test]
    fn internal_server_error_is_internal() {
        let e = classify_cli_error(
            "An error occurred (InternalServerException) when calling the ValidatePolicy operation: oops",
        );
        assert!(matches!(e, ServiceError::Internal(_)));
    }

    #[test]
    fn validation_exception_is_validation() {
        let e = classify_cli_error(
            "An error occurred (ValidationException) when calling the CreateClassificationJob operation: bad name",
        );
        assert!(matches!(e, ServiceError::Validation(_)));
    }

    #[test]
    fn unrecognized_stderr_is_other() {
        let e = classify_cli_error("Unable to locate credentials");
        assert!(matches!(e, ServiceError::Other(_)));
    }
}
