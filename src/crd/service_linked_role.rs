use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Condition, ResourceMetadata, RoleLastUsed};

/// A role linked to an AWS service. IAM picks the role name, which is then
/// tracked in status.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
  group = "iam.services.k8s.aws",
  version = "v1alpha1",
  kind = "ServiceLinkedRole",
  namespaced,
  derive = "PartialEq",
  status = "ServiceLinkedRoleStatus",
  printcolumn = r#"{"name":"RoleName","type":"string","jsonPath":".status.roleName"}"#,
  printcolumn = r#"{"name":"Synced","type":"string","jsonPath":".status.conditions[?(@.type==\"ACK.ResourceSynced\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLinkedRoleSpec {
  /// Service principal, e.g. `elasticbeanstalk.amazonaws.com`. Immutable.
  #[serde(rename = "awsServiceName")]
  pub aws_service_name: String,
  /// Immutable
  #[serde(skip_serializing_if = "Option::is_none")]
  pub custom_suffix: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLinkedRoleStatus {
  pub ack_resource_metadata: Option<ResourceMetadata>,
  #[serde(default)]
  pub conditions: Vec<Condition>,
  pub role_name: Option<String>,
  #[serde(rename = "roleID")]
  pub role_id: Option<String>,
  pub create_date: Option<DateTime<Utc>>,
  pub max_session_duration: Option<i32>,
  pub role_last_used: Option<RoleLastUsed>,
}
