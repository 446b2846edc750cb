//! Pseudo-parameter resolution for `Fn::Sub` intrinsics embedded in IAM
//! policy documents. Only the one-key string form is resolved; every other
//! intrinsic shape is left for the validation service to see as-is.

use crate::PolicyRecord;
use serde_json::Value as Json;
use thiserror::Error;

pub const ACCOUNT_ID_TOKEN: &str = "${AWS::AccountId}";
pub const REGION_TOKEN: &str = "${AWS::Region}";

/// Contextual values substituted for the pseudo-parameter tokens.
#[derive(Debug, Clone)]
pub struct PseudoParams {
    pub account_id: String,
    pub region: String,
}

impl PseudoParams {
    fn resolve(&self, template: &str) -> String {
        template
            .replace(ACCOUNT_ID_TOKEN, &self.account_id)
            .replace(REGION_TOKEN, &self.region)
    }
}

#[derive(Error, Debug)]
pub enum SubError {
    #[error("statement {statement}: condition block is not an object")]
    MalformedCondition { statement: usize },
}

/// The closed set of positions substitution understands. Anything that does
/// not classify is left untouched.
enum Position<'a> {
    Scalar(&'a mut Json),
    List(&'a mut Vec<Json>),
}

impl<'a> Position<'a> {
    fn classify(value: &'a mut Json) -> Position<'a> {
        match value {
            Json::Array(items) => Position::List(items),
            other => Position::Scalar(other),
        }
    }

    fn substitute(self, params: &PseudoParams) {
        match self {
            Position::Scalar(slot) => {
                if let Some(resolved) = resolve_sub_marker(slot, params) {
                    *slot = Json::String(resolved);
                }
            }
            Position::List(items) => {
                for slot in items {
                    if let Some(resolved) = resolve_sub_marker(slot, params) {
                        *slot = Json::String(resolved);
                    }
                }
            }
        }
    }
}

/// A marker is a one-key object `{"Fn::Sub": "<string>"}`. `Fn::Sub` with a
/// list argument, `Ref`, and all other shapes return `None`.
fn resolve_sub_marker(value: &Json, params: &PseudoParams) -> Option<String> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    let template = obj.get("Fn::Sub")?.as_str()?;
    Some(params.resolve(template))
}

fn substitute_statement(
    statement: &mut Json,
    index: usize,
    params: &PseudoParams,
) -> Result<(), SubError> {
    if let Some(resource) = statement.get_mut("Resource") {
        Position::classify(resource).substitute(params);
    }
    if let Some(condition) = statement.get_mut("Condition") {
        let blocks = condition
            .as_object_mut()
            .ok_or(SubError::MalformedCondition { statement: index })?;
        for (_operator, entries) in blocks.iter_mut() {
            let entries = entries
                .as_object_mut()
                .ok_or(SubError::MalformedCondition { statement: index })?;
            for (_key, value) in entries.iter_mut() {
                Position::classify(value).substitute(params);
            }
        }
    }
    Ok(())
}

/// Resolve pseudo-parameters across every statement of every record, in
/// place. A structurally malformed statement is logged and skipped; the
/// remaining statements and records still get processed.
pub fn substitute_pseudo_params(records: &mut [PolicyRecord], params: &PseudoParams) {
    for record in records {
        let statements: &mut [Json] = match record.document.get_mut("Statement") {
            Some(Json::Array(list)) => list.as_mut_slice(),
            Some(single @ Json::Object(_)) => std::slice::from_mut(single),
            _ => {
                tracing::warn!(policy = %record.name, "policy document has no Statement");
                continue;
            }
        };
        for (index, statement) in statements.iter_mut().enumerate() {
            if let Err(e) = substitute_statement(statement, index, params) {
                tracing::warn!(policy = %record.name, error = %e, "skipping malformed statement");
            }
        }
    }
}
