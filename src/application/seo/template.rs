//! Placeholder substitution for programmatic pages.
//!
//! This is deliberately a plain `{{key}}` replace. There are no expressions,
//! filters or escaping rules.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern must compile"));

/// Replace every `{{key}}` with the string form of `variables[key]`.
/// Placeholders without a matching variable are left as written.
pub fn substitute(template: &str, variables: &Map<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let key = caps[1].trim();
            match variables.get(key) {
                Some(value) => value_to_string(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Template set for a page generated from structured data rather than an
/// authored post, e.g. one page per city or per library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammaticPage {
    pub title_template: String,
    pub description_template: String,
    /// Site-relative path, e.g. `/guias/{{city}}`.
    pub path_template: String,
    #[serde(default)]
    pub schema_type: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub noindex: bool,
}
