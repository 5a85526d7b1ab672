use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{AwsResourceReferenceWrapper, Condition, ResourceMetadata, RoleLastUsed, Tag};

/// An IAM role with its trust policy, attached managed policies, inline
/// policies, permissions boundary and tags
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
  group = "iam.services.k8s.aws",
  version = "v1alpha1",
  kind = "Role",
  namespaced,
  derive = "PartialEq",
  status = "RoleStatus",
  printcolumn = r#"{"name":"Synced","type":"string","jsonPath":".status.conditions[?(@.type==\"ACK.ResourceSynced\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RoleSpec {
  /// Name of the role, unique within the account. Immutable.
  pub name: String,
  /// Path of the role, defaults to `/`. Immutable.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// Trust policy that grants an entity permission to assume the role
  pub assume_role_policy_document: String,
  /// Maximum session duration in seconds, 3600 to 43200
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_session_duration: Option<i32>,
  /// ARN of the managed policy used as permissions boundary
  #[serde(skip_serializing_if = "Option::is_none")]
  pub permissions_boundary: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub permissions_boundary_ref: Option<AwsResourceReferenceWrapper>,
  /// ARNs of the managed policies attached to the role
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub policies: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub policy_refs: Vec<AwsResourceReferenceWrapper>,
  /// Inline policy documents keyed by policy name
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub inline_policies: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleStatus {
  pub ack_resource_metadata: Option<ResourceMetadata>,
  #[serde(default)]
  pub conditions: Vec<Condition>,
  #[serde(rename = "roleID")]
  pub role_id: Option<String>,
  pub create_date: Option<DateTime<Utc>>,
  pub role_last_used: Option<RoleLastUsed>,
}
