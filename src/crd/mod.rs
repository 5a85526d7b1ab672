//! Custom resources for IAM entities, group `iam.services.k8s.aws`

mod common;
mod group;
mod instance_profile;
mod open_id_connect_provider;
mod policy;
mod role;
mod saml_provider;
mod service_linked_role;
mod user;

use std::fmt::Debug;

use k8s_openapi::NamespaceResourceScope;
use serde::{de::DeserializeOwned, Serialize};

pub use common::*;
pub use group::*;
pub use instance_profile::*;
pub use open_id_connect_provider::*;
pub use policy::*;
pub use role::*;
pub use saml_provider::*;
pub use service_linked_role::*;
pub use user::*;

pub const GROUP: &str = "iam.services.k8s.aws";

/// Status plumbing every IAM custom resource shares
pub trait AckResource:
  kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
  + Clone
  + Debug
  + Serialize
  + DeserializeOwned
  + Send
  + Sync
  + 'static
{
  fn conditions(&self) -> &[Condition];
  fn conditions_mut(&mut self) -> &mut Vec<Condition>;
  fn arn(&self) -> Option<&str>;
  fn resource_metadata_mut(&mut self) -> &mut ResourceMetadata;
  /// Replace the observed state with the one of `other`, keeping conditions
  fn copy_status_from(&mut self, other: &Self);
  /// Merge patch body that replaces the status subresource
  fn status_patch(&self) -> serde_json::Result<serde_json::Value>;
}

macro_rules! ack_resource {
  ($($kind:ty),+ $(,)?) => {
    $(
      impl AckResource for $kind {
        fn conditions(&self) -> &[Condition] {
          self.status.as_ref().map(|s| s.conditions.as_slice()).unwrap_or_default()
        }

        fn conditions_mut(&mut self) -> &mut Vec<Condition> {
          &mut self.status.get_or_insert_with(Default::default).conditions
        }

        fn arn(&self) -> Option<&str> {
          self.status.as_ref()?.ack_resource_metadata.as_ref()?.arn.as_deref()
        }

        fn resource_metadata_mut(&mut self) -> &mut ResourceMetadata {
          self
            .status
            .get_or_insert_with(Default::default)
            .ack_resource_metadata
            .get_or_insert_with(Default::default)
        }

        fn copy_status_from(&mut self, other: &Self) {
          let conditions = std::mem::take(self.conditions_mut());
          self.status = other.status.clone();
          *self.conditions_mut() = conditions;
        }

        fn status_patch(&self) -> serde_json::Result<serde_json::Value> {
          let status = serde_json::to_value(&self.status)?;
          Ok(serde_json::json!({ "status": status }))
        }
      }
    )+
  };
}

ack_resource!(
  Role,
  Policy,
  Group,
  User,
  InstanceProfile,
  OpenIDConnectProvider,
  SAMLProvider,
  ServiceLinkedRole,
);

#[cfg(test)]
mod tests {
  use super::*;
  use kube::CustomResourceExt;

  #[test]
  fn crds_share_group_and_version() {
    for crd in [
      Role::crd(),
      Policy::crd(),
      Group::crd(),
      User::crd(),
      InstanceProfile::crd(),
      OpenIDConnectProvider::crd(),
      SAMLProvider::crd(),
      ServiceLinkedRole::crd(),
    ] {
      assert_eq!(crd.spec.group, GROUP);
      assert_eq!(crd.spec.versions[0].name, "v1alpha1");
      assert_eq!(crd.spec.scope, "Namespaced");
    }
  }

  #[test]
  fn status_accessors_create_status_on_demand() {
    let mut role = Role::new(
      "test",
      RoleSpec {
        name: "test".into(),
        assume_role_policy_document: "{}".into(),
        ..Default::default()
      },
    );
    assert!(role.conditions().is_empty());
    assert_eq!(role.arn(), None);

    *role.resource_metadata_mut() = ResourceMetadata::with_arn("arn:aws:iam::123456789012:role/test");
    assert_eq!(role.arn(), Some("arn:aws:iam::123456789012:role/test"));

    let patch = role.status_patch().unwrap();
    assert_eq!(
      patch["status"]["ackResourceMetadata"]["ownerAccountID"],
      serde_json::json!("123456789012")
    );
  }
}
