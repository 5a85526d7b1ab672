use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Condition, ResourceMetadata, Tag};

/// A customer managed IAM policy
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
  group = "iam.services.k8s.aws",
  version = "v1alpha1",
  kind = "Policy",
  namespaced,
  derive = "PartialEq",
  status = "PolicyStatus",
  printcolumn = r#"{"name":"Synced","type":"string","jsonPath":".status.conditions[?(@.type==\"ACK.ResourceSynced\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
  /// Immutable
  pub name: String,
  /// Immutable, defaults to `/`
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  /// Immutable once assigned
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// JSON policy document. Changing it creates a new default policy version.
  pub policy_document: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatus {
  pub ack_resource_metadata: Option<ResourceMetadata>,
  #[serde(default)]
  pub conditions: Vec<Condition>,
  #[serde(rename = "policyID")]
  pub policy_id: Option<String>,
  #[serde(rename = "defaultVersionID")]
  pub default_version_id: Option<String>,
  pub attachment_count: Option<i32>,
  pub permissions_boundary_usage_count: Option<i32>,
  pub is_attachable: Option<bool>,
  pub create_date: Option<DateTime<Utc>>,
  pub update_date: Option<DateTime<Utc>>,
}
