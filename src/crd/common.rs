use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A key/value pair attached to an IAM entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub struct Tag {
  pub key: String,
  #[serde(default)]
  pub value: String,
}

impl Tag {
  pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      value: value.into(),
    }
  }
}

/// Points at another custom resource managed by this controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct AwsResourceReference {
  pub name: Option<String>,
  /// Defaults to the namespace of the referencing object
  pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct AwsResourceReferenceWrapper {
  pub from: Option<AwsResourceReference>,
}

#[cfg(test)]
impl AwsResourceReferenceWrapper {
  pub fn to(name: impl Into<String>) -> Self {
    Self {
      from: Some(AwsResourceReference {
        name: Some(name.into()),
        namespace: None,
      }),
    }
  }
}

/// Identity of the AWS resource backing a custom resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
  pub arn: Option<String>,
  #[serde(rename = "ownerAccountID")]
  pub owner_account_id: Option<String>,
  pub region: Option<String>,
}

impl ResourceMetadata {
  pub fn with_arn(arn: impl Into<String>) -> Self {
    let arn = arn.into();
    Self {
      owner_account_id: account_from_arn(&arn),
      arn: Some(arn),
      region: None,
    }
  }
}

/// `arn:partition:iam::123456789012:role/name` carries the account in field 5.
fn account_from_arn(arn: &str) -> Option<String> {
  arn
    .split(':')
    .nth(4)
    .filter(|account| !account.is_empty())
    .map(str::to_owned)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionType {
  #[serde(rename = "ACK.ResourceSynced")]
  ResourceSynced,
  #[serde(rename = "ACK.Terminal")]
  Terminal,
  #[serde(rename = "ACK.Recoverable")]
  Recoverable,
  #[serde(rename = "ACK.ReferencesResolved")]
  ReferencesResolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
  True,
  False,
  Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
  #[serde(rename = "type")]
  pub type_: ConditionType,
  pub status: ConditionStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_transition_time: Option<DateTime<Utc>>,
}

/// Insert or replace the condition of the given type. The transition time only
/// moves when the status flips.
pub fn set_condition(
  conditions: &mut Vec<Condition>,
  type_: ConditionType,
  status: ConditionStatus,
  message: Option<String>,
  reason: Option<String>,
) {
  match conditions.iter_mut().find(|c| c.type_ == type_) {
    Some(existing) => {
      if existing.status != status {
        existing.last_transition_time = Some(Utc::now());
      }
      existing.status = status;
      existing.message = message;
      existing.reason = reason;
    }
    None => conditions.push(Condition {
      type_,
      status,
      message,
      reason,
      last_transition_time: Some(Utc::now()),
    }),
  }
}

pub fn remove_condition(conditions: &mut Vec<Condition>, type_: ConditionType) {
  conditions.retain(|c| c.type_ != type_);
}

pub fn condition_is_true(conditions: &[Condition], type_: ConditionType) -> bool {
  conditions
    .iter()
    .any(|c| c.type_ == type_ && c.status == ConditionStatus::True)
}

/// Last use of a role as reported by IAM
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleLastUsed {
  pub last_used_date: Option<DateTime<Utc>>,
  pub region: Option<String>,
}
