//! Built-in conditions

use crate::model::message::Message;
use crate::subscriber::error::{SubscriberError, SubscriberResult};
use crate::subscriber::factory::parse_params;
use crate::subscriber::kinds::ConditionKind;
use crate::subscriber::traits::Condition;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

/// Resolve a dotted path (`a.b.0.c`) inside a JSON document
pub fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonFieldParams {
    field: String,
    values: Vec<Value>,
    #[serde(default)]
    negate: bool,
}

/// Satisfied when a field of the JSON body equals one of the listed values.
/// Strings and numbers compare by their text form, so `"1"` matches `1`.
#[derive(Debug)]
pub struct JsonFieldCondition {
    field: String,
    values: Vec<Value>,
    negate: bool,
}

impl JsonFieldCondition {
    pub fn from_params(params: &Value) -> SubscriberResult<Self> {
        let params: JsonFieldParams = parse_params(ConditionKind::JsonField.as_ref(), params)?;
        if params.field.trim().is_empty() {
            return Err(SubscriberError::InvalidParams {
                kind: ConditionKind::JsonField.to_string(),
                message: "field must not be empty".to_string(),
            });
        }
        Ok(Self {
            field: params.field,
            values: params.values,
            negate: params.negate,
        })
    }
}

impl Condition for JsonFieldCondition {
    fn kind(&self) -> ConditionKind {
        ConditionKind::JsonField
    }

    fn satisfied(&self, message: &Message) -> bool {
        let matched = serde_json::from_str::<Value>(&message.dispatcher_body)
            .ok()
            .as_ref()
            .and_then(|doc| json_path(doc, &self.field))
            .map(|found| {
                let found_text = as_text(found);
                self.values
                    .iter()
                    .any(|v| v == found || as_text(v) == found_text)
            })
            .unwrap_or(false);
        matched != self.negate
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegexParams {
    pattern: String,
    #[serde(default)]
    negate: bool,
}

/// Satisfied when the raw body matches the pattern
#[derive(Debug)]
pub struct RegexCondition {
    pattern: Regex,
    negate: bool,
}

impl RegexCondition {
    pub fn from_params(params: &Value) -> SubscriberResult<Self> {
        let params: RegexParams = parse_params(ConditionKind::Regex.as_ref(), params)?;
        let pattern = Regex::new(&params.pattern).map_err(|e| SubscriberError::InvalidParams {
            kind: ConditionKind::Regex.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            pattern,
            negate: params.negate,
        })
    }
}

impl Condition for RegexCondition {
    fn kind(&self) -> ConditionKind {
        ConditionKind::Regex
    }

    fn satisfied(&self, message: &Message) -> bool {
        self.pattern.is_match(&message.dispatcher_body) != self.negate
    }
}
