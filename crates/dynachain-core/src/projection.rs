//! Projection name lists.

use serde_json::Value;

use crate::error::{ChainError, Result};

/// Attribute names to project, as supplied by the caller.
///
/// Entries may hold several comma-separated names; splitting, trimming and
/// de-duplication happen when the document is compiled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection(Vec<String>);

impl Projection {
    /// Accept a dynamic value: a string, or an array of strings.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Self(vec![s.clone()])),
            Value::Array(entries) => entries
                .iter()
                .map(|entry| match entry {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(ChainError::type_mismatch(format!(
                        "projection entries must be strings, found {}",
                        json_kind(other)
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(Self),
            other => Err(ChainError::type_mismatch(format!(
                "projection must be a string or a list of strings, found {}",
                json_kind(other)
            ))),
        }
    }

    /// The raw entries.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.0
    }

    pub(crate) fn into_entries(self) -> Vec<String> {
        self.0
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<&str> for Projection {
    fn from(names: &str) -> Self {
        Self(vec![names.to_owned()])
    }
}

impl From<String> for Projection {
    fn from(names: String) -> Self {
        Self(vec![names])
    }
}

impl From<Vec<String>> for Projection {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for Projection {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(ToOwned::to_owned).collect())
    }
}

impl From<&[&str]> for Projection {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|&n| n.to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Projection {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|&n| n.to_owned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_should_accept_string_and_string_list() {
        assert_eq!(
            Projection::from_value(&json!("ForumName, Subject")).unwrap(),
            Projection::from("ForumName, Subject")
        );
        assert_eq!(
            Projection::from_value(&json!(["ForumName", "Subject"])).unwrap(),
            Projection::from(["ForumName", "Subject"])
        );
    }

    #[test]
    fn test_should_reject_wrong_shapes() {
        for value in [json!(42), json!({"a": 1}), json!(["ok", 1]), json!(null)] {
            let err = Projection::from_value(&value).unwrap_err();
            assert!(matches!(err, ChainError::TypeMismatch { .. }), "{value}");
        }
    }
}
