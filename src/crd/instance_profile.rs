use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{AwsResourceReferenceWrapper, Condition, ResourceMetadata, Tag};

/// An IAM instance profile holding at most one role
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
  group = "iam.services.k8s.aws",
  version = "v1alpha1",
  kind = "InstanceProfile",
  namespaced,
  derive = "PartialEq",
  status = "InstanceProfileStatus",
  printcolumn = r#"{"name":"Synced","type":"string","jsonPath":".status.conditions[?(@.type==\"ACK.ResourceSynced\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InstanceProfileSpec {
  /// Immutable
  pub name: String,
  /// Immutable, defaults to `/`
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  /// Name of the role to place in the instance profile
  #[serde(skip_serializing_if = "Option::is_none")]
  pub role: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub role_ref: Option<AwsResourceReferenceWrapper>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstanceProfileStatus {
  pub ack_resource_metadata: Option<ResourceMetadata>,
  #[serde(default)]
  pub conditions: Vec<Condition>,
  #[serde(rename = "instanceProfileID")]
  pub instance_profile_id: Option<String>,
  pub create_date: Option<DateTime<Utc>>,
}
