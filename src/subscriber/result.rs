//! Built-in result validators

use crate::subscriber::condition::json_path;
use crate::subscriber::error::{DispatchError, DispatchResult, SubscriberResult};
use crate::subscriber::factory::parse_params;
use crate::subscriber::kinds::ResultKind;
use crate::subscriber::traits::ResultValidator;
use serde::Deserialize;
use serde_json::Value;

fn default_errno_field() -> String {
    "errno".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ErrnoParams {
    #[serde(default = "default_errno_field")]
    field: String,
    #[serde(default)]
    ignore: Vec<i64>,
}

/// `{"errno": 0}` style responses. Zero or an ignored code is success.
#[derive(Debug)]
pub struct ErrnoResult {
    field: String,
    ignore: Vec<i64>,
}

impl ErrnoResult {
    pub fn from_params(params: &Value) -> SubscriberResult<Self> {
        let params: ErrnoParams = parse_params(ResultKind::Errno.as_ref(), params)?;
        Ok(Self {
            field: params.field,
            ignore: params.ignore,
        })
    }
}

impl ResultValidator for ErrnoResult {
    fn kind(&self) -> ResultKind {
        ResultKind::Errno
    }

    fn validate(&self, response_body: &str) -> DispatchResult<()> {
        let business = |message: String| Err(DispatchError::Business { message });

        let doc: Value = match serde_json::from_str(response_body) {
            Ok(doc) => doc,
            Err(_) => return business("response is not JSON".to_string()),
        };

        let code = match json_path(&doc, &self.field) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };

        match code {
            Some(0) => Ok(()),
            Some(code) if self.ignore.contains(&code) => Ok(()),
            Some(code) => business(format!("{} is {}", self.field, code)),
            None => business(format!("response has no numeric '{}'", self.field)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EqualsParams {
    expect: String,
}

/// Trimmed response must equal the expected text
#[derive(Debug)]
pub struct EqualsResult {
    expect: String,
}

impl EqualsResult {
    pub fn from_params(params: &Value) -> SubscriberResult<Self> {
        let params: EqualsParams = parse_params(ResultKind::Equals.as_ref(), params)?;
        Ok(Self {
            expect: params.expect.trim().to_string(),
        })
    }
}

impl ResultValidator for EqualsResult {
    fn kind(&self) -> ResultKind {
        ResultKind::Equals
    }

    fn validate(&self, response_body: &str) -> DispatchResult<()> {
        if response_body.trim() == self.expect {
            Ok(())
        } else {
            Err(DispatchError::Business {
                message: format!("expected '{}'", self.expect),
            })
        }
    }
}
