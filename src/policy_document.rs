//! Helpers for IAM JSON policy documents
//!
//! IAM returns documents URL-encoded and in its own canonical shape, so a raw
//! string comparison against what the user wrote produces false deltas.

use serde_json::Value;

use crate::Result;

/// Statement keys that IAM accepts either as a string or as a list of strings
const STRING_OR_LIST_KEYS: &[&str] = &["Action", "NotAction", "Resource", "NotResource"];

/// Decode a document as returned by `GetRolePolicy`, `GetPolicyVersion` and
/// friends. Documents are query-escaped, so `+` stands for a space.
pub fn decode(encoded: &str) -> Result<String> {
  Ok(urlencoding::decode(&encoded.replace('+', " "))?.into_owned())
}

/// Whether two policy documents grant the same thing.
///
/// Documents that are not valid JSON are compared as trimmed strings.
pub fn equivalent(a: &str, b: &str) -> bool {
  match (serde_json::from_str::<Value>(a), serde_json::from_str::<Value>(b)) {
    (Ok(a), Ok(b)) => normalize(a) == normalize(b),
    _ => a.trim() == b.trim(),
  }
}

fn normalize(mut doc: Value) -> Value {
  if let Some(obj) = doc.as_object_mut() {
    if let Some(statement) = obj.remove("Statement") {
      let statements = match statement {
        Value::Array(statements) => statements,
        single => vec![single],
      };
      let statements = statements.into_iter().map(normalize_statement).collect();
      obj.insert("Statement".to_string(), Value::Array(statements));
    }
  }
  doc
}

fn normalize_statement(mut statement: Value) -> Value {
  if let Some(obj) = statement.as_object_mut() {
    for key in STRING_OR_LIST_KEYS {
      if let Some(value) = obj.get_mut(*key) {
        normalize_string_or_list(value);
      }
    }
    for key in ["Principal", "NotPrincipal"] {
      if let Some(Value::Object(principals)) = obj.get_mut(key) {
        principals.values_mut().for_each(normalize_string_or_list);
      }
    }
  }
  statement
}

fn normalize_string_or_list(value: &mut Value) {
  match value {
    Value::String(s) => *value = Value::Array(vec![Value::String(std::mem::take(s))]),
    Value::Array(items) => items.sort_by(|a, b| a.to_string().cmp(&b.to_string())),
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_url_encoded_documents() {
    let encoded = "%7B%22Version%22%3A%222012-10-17%22%2C%22Statement%22%3A%5B%5D%7D";
    assert_eq!(decode(encoded).unwrap(), r#"{"Version":"2012-10-17","Statement":[]}"#);
  }

  #[test]
  fn plus_decodes_to_space() {
    assert_eq!(decode("%7B%22Sid%22%3A+%22a%2Bb%22%7D").unwrap(), r#"{"Sid": "a+b"}"#);
  }

  #[test]
  fn whitespace_and_key_order_do_not_matter() {
    let a = r#"{"Version": "2012-10-17", "Statement": [{"Effect": "Allow", "Action": ["s3:Get*"], "Resource": ["*"]}]}"#;
    let b = r#"{
      "Statement": [{"Resource": ["*"], "Action": ["s3:Get*"], "Effect": "Allow"}],
      "Version": "2012-10-17"
    }"#;
    assert!(equivalent(a, b));
  }

  #[test]
  fn single_values_match_single_element_lists() {
    let a = r#"{"Version":"2012-10-17","Statement":{"Effect":"Allow","Action":"sts:AssumeRole","Principal":{"Service":"ec2.amazonaws.com"}}}"#;
    let b = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":["sts:AssumeRole"],"Principal":{"Service":["ec2.amazonaws.com"]}}]}"#;
    assert!(equivalent(a, b));
  }

  #[test]
  fn different_actions_are_not_equivalent() {
    let a = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":["ec2:Get*"],"Resource":["*"]}]}"#;
    let b = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":["s3:Get*"],"Resource":["*"]}]}"#;
    assert!(!equivalent(a, b));
  }

  #[test]
  fn invalid_json_falls_back_to_string_comparison() {
    assert!(equivalent("not json ", "not json"));
    assert!(!equivalent("not json", "{}"));
  }
}
