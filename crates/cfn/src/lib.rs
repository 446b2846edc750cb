use anyhow::{Context, Result};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::path::Path;

pub mod sub;
pub mod yaml;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CfnResource {
    #[serde(rename = "Type")]
    pub type_name: String,
    #[serde(rename = "Properties", default)]
    pub properties: serde_json::Map<String, Json>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CfnTemplate {
    #[serde(rename = "AWSTemplateFormatVersion", default)]
    pub version: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, CfnResource>,
}

/// An IAM policy lifted out of a template, ready for validation.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRecord {
    pub name: String,
    pub document: Json,
}

/// Load a template from disk. `.yaml`/`.yml` files are converted to JSON
/// first (short-form intrinsic tags become their `Fn::*` long forms);
/// everything else is parsed as JSON directly.
pub fn load_template(path: &Path) -> Result<CfnTemplate> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read template '{}'", path.display()))?;
    let ext = path.extension().and_then(|s| s.to_str());
    let value: Json = match ext {
        Some("yaml") | Some("yml") => yaml::yaml_to_json(&text)
            .with_context(|| format!("failed to convert YAML template '{}'", path.display()))?,
        _ => serde_json::from_str(&text)
            .with_context(|| format!("failed to parse JSON template '{}'", path.display()))?,
    };
    serde_json::from_value(value)
        .with_context(|| format!("template '{}' is not a CloudFormation template", path.display()))
}

/// Collect every embedded identity policy: customer managed policies keyed
/// by their logical resource id, plus inline policies attached to roles.
/// Roles that only reference managed policy ARNs carry no `Policies` key
/// and contribute nothing.
pub fn extract_policies(template: &CfnTemplate) -> Vec<PolicyRecord> {
    let mut records = Vec::new();
    for (logical_id, resource) in &template.resources {
        match resource.type_name.as_str() {
            "AWS::IAM::ManagedPolicy" => match resource.properties.get("PolicyDocument") {
                Some(doc) => records.push(PolicyRecord {
                    name: logical_id.clone(),
                    document: doc.clone(),
                }),
                None => {
                    tracing::warn!(resource = %logical_id, "managed policy has no PolicyDocument")
                }
            },
            "AWS::IAM::Role" => {
                let inline = resource
                    .properties
                    .get("Policies")
                    .and_then(Json::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                for policy in inline {
                    let name = policy.get("PolicyName").and_then(Json::as_str);
                    let doc = policy.get("PolicyDocument");
                    match (name, doc) {
                        (Some(name), Some(doc)) => records.push(PolicyRecord {
                            name: name.to_string(),
                            document: doc.clone(),
                        }),
                        _ => tracing::warn!(
                            resource = %logical_id,
                            "inline policy missing PolicyName or PolicyDocument"
                        ),
                    }
                }
            }
            _ => {}
        }
    }
    records
}
