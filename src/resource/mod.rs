//! Per-kind translation between custom resources and IAM calls

mod group;
mod instance_profile;
mod open_id_connect_provider;
pub mod policy;
mod role;
mod saml_provider;
mod service_linked_role;
mod user;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use crate::crd::AckResource;
use crate::references::{ReferenceReader, Resolved};
use crate::{policy_document, Error, Result};

pub use group::GroupManager;
pub use instance_profile::InstanceProfileManager;
pub use open_id_connect_provider::OpenIdConnectProviderManager;
pub use policy::PolicyManager;
pub use role::RoleManager;
pub use saml_provider::SamlProviderManager;
pub use service_linked_role::ServiceLinkedRoleManager;
pub use user::UserManager;

/// Spec fields that differ between desired and latest, as dotted paths such
/// as `Spec.Tags`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
  differences: BTreeSet<&'static str>,
}

impl Delta {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&mut self, path: &'static str) {
    self.differences.insert(path);
  }

  /// Record `path` when `differs` holds
  pub fn add_if(&mut self, differs: bool, path: &'static str) {
    if differs {
      self.add(path);
    }
  }

  /// Whether `path` or any field nested below it differs
  pub fn differs_at(&self, path: &str) -> bool {
    self
      .differences
      .iter()
      .any(|d| *d == path || d.strip_prefix(path).is_some_and(|rest| rest.starts_with('.')))
  }

  pub fn is_empty(&self) -> bool {
    self.differences.is_empty()
  }

  pub fn paths(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.differences.iter().copied()
  }

  /// Terminal error naming every changed field in `immutable`
  pub fn check_immutable(&self, immutable: &[&str]) -> Result<()> {
    let changed: Vec<&str> = immutable.iter().copied().filter(|f| self.differs_at(f)).collect();
    if changed.is_empty() {
      Ok(())
    } else {
      Err(Error::immutable_fields_changed(&changed))
    }
  }
}

/// Order independent comparison of string lists such as policy ARNs
pub(crate) fn same_set(a: &[String], b: &[String]) -> bool {
  a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

/// Compares optional strings treating `None` and `""` alike
pub(crate) fn same_opt(a: &Option<String>, b: &Option<String>) -> bool {
  a.as_deref().unwrap_or_default() == b.as_deref().unwrap_or_default()
}

/// Inline policies keyed by name, documents compared semantically
pub(crate) fn same_inline_policies(a: &BTreeMap<String, String>, b: &BTreeMap<String, String>) -> bool {
  a.len() == b.len()
    && a
      .iter()
      .all(|(name, doc)| b.get(name).is_some_and(|other| policy_document::equivalent(doc, other)))
}

/// Knows how to read, create, update and delete one kind of IAM entity
///
/// `latest` objects returned by the manager are copies of `desired` whose spec
/// holds what IAM reports and whose status holds the observed identifiers.
#[async_trait]
pub trait ResourceManager: Send + Sync + 'static {
  type Resource: AckResource;

  /// Replace `*Ref` fields by concrete values
  async fn resolve_references(
    &self,
    _reader: &dyn ReferenceReader,
    desired: &Self::Resource,
  ) -> Result<Resolved<Self::Resource>> {
    Ok(Resolved {
      resource: desired.clone(),
      referenced: false,
    })
  }

  /// Copy server side defaults into fields the user left unset
  fn late_initialize(&self, _desired: &mut Self::Resource, _latest: &Self::Resource) {}

  fn delta(&self, desired: &Self::Resource, latest: &Self::Resource) -> Delta;

  /// `None` when the entity does not exist in IAM
  async fn read_one(&self, desired: &Self::Resource) -> Result<Option<Self::Resource>>;

  async fn create(&self, desired: &Self::Resource) -> Result<Self::Resource>;

  async fn update(&self, desired: &Self::Resource, latest: &Self::Resource, delta: &Delta) -> Result<Self::Resource>;

  async fn delete(&self, latest: &Self::Resource) -> Result<()>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn differs_at_matches_nested_paths() {
    let mut delta = Delta::new();
    delta.add("Spec.Tags");
    delta.add("Spec.RoleLastUsed.Region");

    assert!(delta.differs_at("Spec.Tags"));
    assert!(delta.differs_at("Spec.RoleLastUsed"));
    assert!(!delta.differs_at("Spec.Tag"));
    assert!(!delta.differs_at("Spec.Path"));
  }

  #[test]
  fn immutable_changes_are_listed() {
    let mut delta = Delta::new();
    delta.add("Spec.Name");
    delta.add("Spec.Tags");
    delta.add("Spec.Path");

    let err = delta.check_immutable(&["Spec.Name", "Spec.Path"]).unwrap_err();
    assert!(err.is_terminal());
    assert_eq!(err.to_string(), "Immutable Spec fields have been modified: Spec.Name,Spec.Path");
    assert!(delta.check_immutable(&["Spec.Description"]).is_ok());
  }

  #[test]
  fn set_and_option_helpers() {
    assert!(same_set(&["a".into(), "b".into()], &["b".into(), "a".into()]));
    assert!(!same_set(&["a".into()], &["b".into()]));
    assert!(same_opt(&None, &Some(String::new())));
    assert!(!same_opt(&Some("x".into()), &None));
  }
}
