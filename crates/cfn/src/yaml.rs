//! YAML-to-JSON conversion for CloudFormation templates, including the
//! short-form intrinsic tags: `!Ref x` becomes `{"Ref": x}`, `!GetAtt "A.B"`
//! becomes `{"Fn::GetAtt": ["A", "B"]}`, and any other `!Name` becomes
//! `{"Fn::Name": ...}`.

use anyhow::{bail, Result};
use serde_json::{json, Value as Json};
use serde_yaml::Value as Yaml;

pub fn yaml_to_json(text: &str) -> Result<Json> {
    let doc: Yaml = serde_yaml::from_str(text)?;
    convert(doc)
}

fn convert(value: Yaml) -> Result<Json> {
    Ok(match value {
        Yaml::Null => Json::Null,
        Yaml::Bool(b) => Json::Bool(b),
        Yaml::Number(n) => serde_json::to_value(n)?,
        Yaml::String(s) => Json::String(s),
        Yaml::Sequence(seq) => {
            Json::Array(seq.into_iter().map(convert).collect::<Result<_>>()?)
        }
        Yaml::Mapping(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(key_string(k)?, convert(v)?);
            }
            Json::Object(out)
        }
        Yaml::Tagged(tagged) => {
            let serde_yaml::value::TaggedValue { tag, value } = *tagged;
            let name = tag.to_string();
            let inner = convert(value)?;
            expand_short_form(name.trim_start_matches('!'), inner)
        }
    })
}

fn expand_short_form(name: &str, inner: Json) -> Json {
    match name {
        // Ref and Condition keep their bare names in long form.
        "Ref" | "Condition" => json!({ name: inner }),
        "GetAtt" => {
            let args = match inner {
                Json::String(s) => {
                    Json::Array(s.splitn(2, '.').map(|p| json!(p)).collect())
                }
                other => other,
            };
            json!({ "Fn::GetAtt": args })
        }
        other => {
            let long = format!("Fn::{other}");
            json!({ long: inner })
        }
    }
}

fn key_string(key: Yaml) -> Result<String> {
    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        other => bail!("unsupported mapping key in template: {:?}", other),
    }
}
