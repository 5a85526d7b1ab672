use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Condition, ResourceMetadata, Tag};

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
  group = "iam.services.k8s.aws",
  version = "v1alpha1",
  kind = "OpenIDConnectProvider",
  namespaced,
  derive = "PartialEq",
  status = "OpenIDConnectProviderStatus",
  printcolumn = r#"{"name":"Synced","type":"string","jsonPath":".status.conditions[?(@.type==\"ACK.ResourceSynced\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct OpenIDConnectProviderSpec {
  /// Issuer URL of the identity provider. Immutable.
  pub url: String,
  /// Audiences allowed to use the provider
  #[serde(rename = "clientIDs", default, skip_serializing_if = "Vec::is_empty")]
  pub client_ids: Vec<String>,
  /// Server certificate thumbprints of the identity provider
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub thumbprints: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenIDConnectProviderStatus {
  pub ack_resource_metadata: Option<ResourceMetadata>,
  #[serde(default)]
  pub conditions: Vec<Condition>,
}
