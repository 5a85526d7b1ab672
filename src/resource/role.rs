use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use super::{same_inline_policies, same_opt, same_set, Delta, ResourceManager};
use crate::crd::{AckResource, ResourceMetadata, Role};
use crate::iam::{IamApi, Principal, RoleOutput, TagTarget};
use crate::references::{self, ReferenceReader, Resolved};
use crate::{policies, policy_document, tags, Result};

const DEFAULT_PATH: &str = "/";
const DEFAULT_MAX_SESSION_DURATION: i32 = 3600;

pub struct RoleManager {
  iam: Arc<dyn IamApi>,
}

impl RoleManager {
  pub fn new(iam: Arc<dyn IamApi>) -> Self {
    Self { iam }
  }
}

fn set_status(role: &mut Role, out: &RoleOutput) {
  *role.resource_metadata_mut() = ResourceMetadata::with_arn(&out.arn);
  let status = role.status.get_or_insert_with(Default::default);
  status.role_id = Some(out.role_id.clone());
  status.create_date = out.create_date;
  status.role_last_used = out.last_used.clone();
}

#[async_trait]
impl ResourceManager for RoleManager {
  type Resource = Role;

  async fn resolve_references(&self, reader: &dyn ReferenceReader, desired: &Role) -> Result<Resolved<Role>> {
    references::resolve_role(reader, desired).await
  }

  fn late_initialize(&self, desired: &mut Role, latest: &Role) {
    let spec = &mut desired.spec;
    if spec.path.is_none() {
      spec.path = latest.spec.path.clone().or_else(|| Some(DEFAULT_PATH.to_string()));
    }
    if spec.max_session_duration.is_none() {
      spec.max_session_duration = latest.spec.max_session_duration.or(Some(DEFAULT_MAX_SESSION_DURATION));
    }
    if spec.description.is_none() {
      spec.description = latest.spec.description.clone();
    }
  }

  fn delta(&self, desired: &Role, latest: &Role) -> Delta {
    let (a, b) = (&desired.spec, &latest.spec);
    let mut delta = Delta::new();
    delta.add_if(a.name != b.name, "Spec.Name");
    delta.add_if(!same_opt(&a.path, &b.path), "Spec.Path");
    delta.add_if(!same_opt(&a.description, &b.description), "Spec.Description");
    delta.add_if(
      !policy_document::equivalent(&a.assume_role_policy_document, &b.assume_role_policy_document),
      "Spec.AssumeRolePolicyDocument",
    );
    delta.add_if(a.max_session_duration != b.max_session_duration, "Spec.MaxSessionDuration");
    delta.add_if(
      !same_opt(&a.permissions_boundary, &b.permissions_boundary),
      "Spec.PermissionsBoundary",
    );
    delta.add_if(!same_set(&a.policies, &b.policies), "Spec.Policies");
    delta.add_if(
      !same_inline_policies(&a.inline_policies, &b.inline_policies),
      "Spec.InlinePolicies",
    );
    delta.add_if(!tags::equal_tags(&a.tags, &b.tags), "Spec.Tags");
    delta
  }

  async fn read_one(&self, desired: &Role) -> Result<Option<Role>> {
    let Some(out) = self.iam.get_role(&desired.spec.name).await? else {
      return Ok(None);
    };
    let principal = Principal::Role(out.role_name.clone());

    let mut latest = desired.clone();
    let spec = &mut latest.spec;
    spec.name = out.role_name.clone();
    spec.path = Some(out.path.clone());
    spec.description = out.description.clone();
    spec.max_session_duration = out.max_session_duration;
    spec.assume_role_policy_document = match &out.assume_role_policy_document {
      Some(encoded) => policy_document::decode(encoded)?,
      None => String::new(),
    };
    spec.permissions_boundary = out.permissions_boundary.clone();
    spec.policies = self.iam.list_attached_policies(&principal).await?;
    spec.inline_policies = policies::inline_policies(self.iam.as_ref(), &principal).await?;
    spec.tags = tags::list_tags(self.iam.as_ref(), &TagTarget::Role(out.role_name.clone())).await?;
    set_status(&mut latest, &out);
    Ok(Some(latest))
  }

  async fn create(&self, desired: &Role) -> Result<Role> {
    let out = self.iam.create_role(&desired.spec).await?;
    info!("created role {}", out.arn);

    let principal = Principal::Role(out.role_name.clone());
    policies::sync_managed_policies(self.iam.as_ref(), &principal, &desired.spec.policies, &[]).await?;
    policies::sync_inline_policies(
      self.iam.as_ref(),
      &principal,
      &desired.spec.inline_policies,
      &Default::default(),
    )
    .await?;

    let mut created = desired.clone();
    set_status(&mut created, &out);
    Ok(created)
  }

  async fn update(&self, desired: &Role, latest: &Role, delta: &Delta) -> Result<Role> {
    delta.check_immutable(&["Spec.Name", "Spec.Path"])?;

    let name = &latest.spec.name;
    let principal = Principal::Role(name.clone());
    let api = self.iam.as_ref();

    if delta.differs_at("Spec.Policies") {
      policies::sync_managed_policies(api, &principal, &desired.spec.policies, &latest.spec.policies).await?;
    }
    if delta.differs_at("Spec.InlinePolicies") {
      policies::sync_inline_policies(api, &principal, &desired.spec.inline_policies, &latest.spec.inline_policies)
        .await?;
    }
    if delta.differs_at("Spec.PermissionsBoundary") {
      policies::sync_permissions_boundary(
        api,
        &principal,
        desired.spec.permissions_boundary.as_deref(),
        latest.spec.permissions_boundary.as_deref(),
      )
      .await?;
    }
    if delta.differs_at("Spec.Tags") {
      tags::sync_tags(api, &TagTarget::Role(name.clone()), &desired.spec.tags, &latest.spec.tags).await?;
    }
    if delta.differs_at("Spec.AssumeRolePolicyDocument") {
      api
        .update_assume_role_policy(name, &desired.spec.assume_role_policy_document)
        .await?;
    }
    if delta.differs_at("Spec.Description") || delta.differs_at("Spec.MaxSessionDuration") {
      api
        .update_role(name, desired.spec.description.clone(), desired.spec.max_session_duration)
        .await?;
    }
    info!("updated role {name}: {:?}", delta.paths().collect::<Vec<_>>());

    let mut updated = desired.clone();
    updated.copy_status_from(latest);
    Ok(updated)
  }

  async fn delete(&self, latest: &Role) -> Result<()> {
    let name = &latest.spec.name;
    policies::remove_all_policies(self.iam.as_ref(), &Principal::Role(name.clone())).await?;
    self.iam.delete_role(name).await?;
    info!("deleted role {name}");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use mockall::predicate::eq;

  use super::*;
  use crate::crd::{RoleSpec, Tag};
  use crate::iam::MockIamApi;

  const TRUST: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":{"Service":"ec2.amazonaws.com"},"Action":"sts:AssumeRole"}]}"#;
  const READ: &str = "arn:aws:iam::aws:policy/ReadOnlyAccess";

  fn role(spec: RoleSpec) -> Role {
    Role::new("app", spec)
  }

  fn spec() -> RoleSpec {
    RoleSpec {
      name: "app".into(),
      assume_role_policy_document: TRUST.into(),
      policies: vec![READ.into()],
      tags: vec![Tag::new("team", "a")],
      ..Default::default()
    }
  }

  fn output() -> RoleOutput {
    RoleOutput {
      arn: "arn:aws:iam::123456789012:role/app".into(),
      role_id: "AROAEXAMPLE".into(),
      role_name: "app".into(),
      path: "/".into(),
      max_session_duration: Some(3600),
      assume_role_policy_document: Some(urlencoding::encode(TRUST).into_owned()),
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn read_one_returns_none_for_missing_role() {
    let mut api = MockIamApi::new();
    api.expect_get_role().with(eq("app")).returning(|_| Ok(None));
    let manager = RoleManager::new(Arc::new(api));

    assert_eq!(manager.read_one(&role(spec())).await.unwrap(), None);
  }

  #[tokio::test]
  async fn read_one_fills_spec_and_status() {
    let mut api = MockIamApi::new();
    api.expect_get_role().returning(|_| Ok(Some(output())));
    api
      .expect_list_attached_policies()
      .returning(|_| Ok(vec![READ.to_string()]));
    api.expect_list_inline_policy_names().returning(|_| Ok(vec![]));
    api
      .expect_list_tags()
      .with(eq(TagTarget::Role("app".into())))
      .returning(|_| Ok(vec![Tag::new("team", "a")]));
    let manager = RoleManager::new(Arc::new(api));

    let desired = role(spec());
    let latest = manager.read_one(&desired).await.unwrap().unwrap();
    assert_eq!(latest.arn(), Some("arn:aws:iam::123456789012:role/app"));
    assert_eq!(latest.status.as_ref().unwrap().role_id.as_deref(), Some("AROAEXAMPLE"));
    assert_eq!(latest.spec.assume_role_policy_document, TRUST);

    let mut desired = desired;
    manager.late_initialize(&mut desired, &latest);
    assert_eq!(desired.spec.path.as_deref(), Some("/"));
    assert_eq!(desired.spec.max_session_duration, Some(3600));
    assert!(manager.delta(&desired, &latest).is_empty());
  }

  #[tokio::test]
  async fn create_attaches_policies_after_creating_role() {
    let mut api = MockIamApi::new();
    api.expect_create_role().times(1).returning(|_| Ok(output()));
    api
      .expect_attach_policy()
      .with(eq(Principal::Role("app".into())), eq(READ))
      .times(1)
      .returning(|_, _| Ok(()));
    let manager = RoleManager::new(Arc::new(api));

    let created = manager.create(&role(spec())).await.unwrap();
    assert_eq!(created.arn(), Some("arn:aws:iam::123456789012:role/app"));
  }

  #[tokio::test]
  async fn renaming_is_terminal() {
    let manager = RoleManager::new(Arc::new(MockIamApi::new()));
    let latest = role(spec());
    let desired = role(RoleSpec {
      name: "renamed".into(),
      ..spec()
    });

    let delta = manager.delta(&desired, &latest);
    let err = manager.update(&desired, &latest, &delta).await.unwrap_err();
    assert!(err.is_terminal());
  }

  #[tokio::test]
  async fn update_only_touches_changed_fields() {
    let mut api = MockIamApi::new();
    api
      .expect_update_role()
      .with(eq("app"), eq(Some("web tier".to_string())), eq(None))
      .times(1)
      .returning(|_, _, _| Ok(()));
    api
      .expect_put_inline_policy()
      .withf(|_, name, _| name == "s3")
      .times(1)
      .returning(|_, _, _| Ok(()));
    let manager = RoleManager::new(Arc::new(api));

    let latest = role(spec());
    let desired = role(RoleSpec {
      description: Some("web tier".into()),
      inline_policies: BTreeMap::from([("s3".to_string(), "{}".to_string())]),
      ..spec()
    });

    let delta = manager.delta(&desired, &latest);
    assert_eq!(delta.paths().collect::<Vec<_>>(), vec!["Spec.Description", "Spec.InlinePolicies"]);
    manager.update(&desired, &latest, &delta).await.unwrap();
  }

  #[tokio::test]
  async fn delete_removes_policies_first() {
    let mut api = MockIamApi::new();
    let mut seq = mockall::Sequence::new();
    api
      .expect_list_attached_policies()
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok(vec![READ.to_string()]));
    api
      .expect_detach_policy()
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_, _| Ok(()));
    api
      .expect_list_inline_policy_names()
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok(vec![]));
    api
      .expect_delete_role()
      .with(eq("app"))
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok(()));
    let manager = RoleManager::new(Arc::new(api));

    manager.delete(&role(spec())).await.unwrap();
  }
}
