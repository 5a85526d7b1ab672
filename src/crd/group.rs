use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{AwsResourceReferenceWrapper, Condition, ResourceMetadata};

/// An IAM group. Groups carry no tags and no permissions boundary.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
  group = "iam.services.k8s.aws",
  version = "v1alpha1",
  kind = "Group",
  namespaced,
  derive = "PartialEq",
  status = "GroupStatus",
  printcolumn = r#"{"name":"Synced","type":"string","jsonPath":".status.conditions[?(@.type==\"ACK.ResourceSynced\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub policies: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub policy_refs: Vec<AwsResourceReferenceWrapper>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub inline_policies: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupStatus {
  pub ack_resource_metadata: Option<ResourceMetadata>,
  #[serde(default)]
  pub conditions: Vec<Condition>,
  #[serde(rename = "groupID")]
  pub group_id: Option<String>,
  pub create_date: Option<DateTime<Utc>>,
}
