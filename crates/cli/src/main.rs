use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::format::FmtSpan;

use cloudvet_aws::{AwsCli, CallerIdentity, JobFrequency};
use cloudvet_cfn as cfn;
use cloudvet_cfn::sub::PseudoParams;
use cloudvet_core::RetryPolicy;
use cloudvet_discovery as discovery;

#[derive(Parser, Debug)]
#[command(author, version, about = "cloudvet — IAM policy validation and sensitive-data discovery jobs for AWS")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Validate IAM policies embedded in a CloudFormation template
    ValidatePolicies {
        /// Path to the template to analyse (JSON or YAML)
        #[arg(short, long)]
        file: PathBuf,

        /// Print findings to stdout, or write them to output/results.json
        #[arg(long, value_enum, default_value_t = OutputMode::Print)]
        output: OutputMode,
    },
    /// Create sensitive-data discovery jobs for S3 buckets
    CreateJobs(CreateJobsArgs),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum OutputMode {
    Print,
    File,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum Frequency {
    OneTime,
    Scheduled,
}

impl From<Frequency> for JobFrequency {
    fn from(f: Frequency) -> JobFrequency {
        match f {
            Frequency::OneTime => JobFrequency::OneTime,
            Frequency::Scheduled => JobFrequency::Scheduled,
        }
    }
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).multiple(false)))]
struct CreateJobsArgs {
    /// How often the discovery job should run
    #[arg(long, value_enum)]
    frequency: Frequency,

    /// Account id owning the target buckets
    #[arg(long)]
    account_id: String,

    /// Explicit bucket names
    #[arg(long, num_args = 1.., group = "source")]
    buckets: Vec<String>,

    /// File of bucket names, one per line
    #[arg(long, group = "source")]
    bucket_file: Option<PathBuf>,

    /// JSON file of [{"Key": ..., "Value": ...}] pairs to match buckets by tag
    #[arg(long, group = "source")]
    tag_spec: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .init();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::ValidatePolicies { file, output } => validate_policies(&file, output),
        Cmd::CreateJobs(args) => create_jobs(args),
    }
}

fn region_from_env() -> Option<String> {
    std::env::var("REGION")
        .or_else(|_| std::env::var("AWS_REGION"))
        .ok()
}

fn validate_policies(file: &Path, output: OutputMode) -> Result<()> {
    let template = cfn::load_template(file)?;
    let mut records = cfn::extract_policies(&template);
    if records.is_empty() {
        tracing::info!("template embeds no IAM policies; nothing to validate");
    }

    let region = region_from_env()
        .context("no region configured; set REGION (or AWS_REGION) in the environment")?;
    let aws = AwsCli::locate(Some(region.clone()))?;
    let account_id = aws
        .account_id()
        .context("failed to resolve caller account id")?;
    cfn::sub::substitute_pseudo_params(&mut records, &PseudoParams { account_id, region });

    tracing::info!(policies = records.len(), "validating policies");
    let report = cloudvet_policy::validate_policies(&aws, &records, &RetryPolicy::default());
    let rendered = serde_json::to_string_pretty(&report)?;
    match output {
        OutputMode::Print => println!("{rendered}"),
        OutputMode::File => {
            std::fs::create_dir_all("output").context("failed to create output directory")?;
            std::fs::write("output/results.json", rendered)
                .context("failed to write output/results.json")?;
        }
    }

    // Pass/fail gate for pipelines: any finding fails the run.
    if !report.is_empty() {
        bail!("{} policies have findings", report.len());
    }
    Ok(())
}

enum BucketSource {
    Named(Vec<String>),
    TagSpec(Vec<discovery::TagPair>),
}

fn create_jobs(args: CreateJobsArgs) -> Result<()> {
    let source = if !args.buckets.is_empty() {
        BucketSource::Named(args.buckets)
    } else if let Some(path) = &args.bucket_file {
        BucketSource::Named(discovery::load_bucket_file(path)?)
    } else if let Some(path) = &args.tag_spec {
        BucketSource::TagSpec(discovery::load_tag_spec(path)?)
    } else {
        // clap's source group guarantees exactly one of the three.
        unreachable!("clap enforces a bucket source")
    };

    let aws = AwsCli::locate(region_from_env())?;
    let buckets = match source {
        BucketSource::Named(buckets) => buckets,
        BucketSource::TagSpec(spec) => discovery::select_buckets(&aws, &spec, &args.account_id)
            .context("bucket discovery failed")?,
    };
    tracing::info!(?buckets, "buckets to enable");

    let today = chrono::Local::now().date_naive();
    let outcome = discovery::submit_jobs(
        &aws,
        &buckets,
        args.frequency.into(),
        &args.account_id,
        today,
    );
    tracing::info!(enabled = outcome.enabled.len(), errored = outcome.errored.len(), "job submission finished");
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
