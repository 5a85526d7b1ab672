use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{AwsResourceReferenceWrapper, Condition, ResourceMetadata, Tag};

/// An IAM user
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
  group = "iam.services.k8s.aws",
  version = "v1alpha1",
  kind = "User",
  namespaced,
  derive = "PartialEq",
  status = "UserStatus",
  printcolumn = r#"{"name":"Synced","type":"string","jsonPath":".status.conditions[?(@.type==\"ACK.ResourceSynced\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub permissions_boundary: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub permissions_boundary_ref: Option<AwsResourceReferenceWrapper>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub policies: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub policy_refs: Vec<AwsResourceReferenceWrapper>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub inline_policies: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
  pub ack_resource_metadata: Option<ResourceMetadata>,
  #[serde(default)]
  pub conditions: Vec<Condition>,
  #[serde(rename = "userID")]
  pub user_id: Option<String>,
  pub create_date: Option<DateTime<Utc>>,
  pub password_last_used: Option<DateTime<Utc>>,
}
