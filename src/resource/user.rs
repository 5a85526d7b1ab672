use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use super::{same_inline_policies, same_opt, same_set, Delta, ResourceManager};
use crate::crd::{AckResource, ResourceMetadata, User};
use crate::iam::{IamApi, Principal, TagTarget, UserOutput};
use crate::references::{self, ReferenceReader, Resolved};
use crate::{policies, tags, Result};

pub struct UserManager {
  iam: Arc<dyn IamApi>,
}

impl UserManager {
  pub fn new(iam: Arc<dyn IamApi>) -> Self {
    Self { iam }
  }
}

fn set_status(user: &mut User, out: &UserOutput) {
  *user.resource_metadata_mut() = ResourceMetadata::with_arn(&out.arn);
  let status = user.status.get_or_insert_with(Default::default);
  status.user_id = Some(out.user_id.clone());
  status.create_date = out.create_date;
  status.password_last_used = out.password_last_used;
}

#[async_trait]
impl ResourceManager for UserManager {
  type Resource = User;

  async fn resolve_references(&self, reader: &dyn ReferenceReader, desired: &User) -> Result<Resolved<User>> {
    references::resolve_user(reader, desired).await
  }

  fn late_initialize(&self, desired: &mut User, latest: &User) {
    if desired.spec.path.is_none() {
      desired.spec.path = latest.spec.path.clone();
    }
  }

  fn delta(&self, desired: &User, latest: &User) -> Delta {
    let (a, b) = (&desired.spec, &latest.spec);
    let mut delta = Delta::new();
    delta.add_if(a.name != b.name, "Spec.Name");
    delta.add_if(!same_opt(&a.path, &b.path), "Spec.Path");
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

  async fn read_one(&self, desired: &User) -> Result<Option<User>> {
    let Some(out) = self.iam.get_user(&desired.spec.name).await? else {
      return Ok(None);
    };
    let principal = Principal::User(out.user_name.clone());

    let mut latest = desired.clone();
    latest.spec.name = out.user_name.clone();
    latest.spec.path = Some(out.path.clone());
    latest.spec.permissions_boundary = out.permissions_boundary.clone();
    latest.spec.policies = self.iam.list_attached_policies(&principal).await?;
    latest.spec.inline_policies = policies::inline_policies(self.iam.as_ref(), &principal).await?;
    latest.spec.tags = tags::list_tags(self.iam.as_ref(), &TagTarget::User(out.user_name.clone())).await?;
    set_status(&mut latest, &out);
    Ok(Some(latest))
  }

  async fn create(&self, desired: &User) -> Result<User> {
    let out = self.iam.create_user(&desired.spec).await?;
    info!("created user {}", out.arn);

    let principal = Principal::User(out.user_name.clone());
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

  async fn update(&self, desired: &User, latest: &User, delta: &Delta) -> Result<User> {
    delta.check_immutable(&["Spec.Name"])?;

    let name = &latest.spec.name;
    let principal = Principal::User(name.clone());
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
      tags::sync_tags(api, &TagTarget::User(name.clone()), &desired.spec.tags, &latest.spec.tags).await?;
    }
    if delta.differs_at("Spec.Path") {
      api
        .update_user(name, desired.spec.path.as_deref().unwrap_or("/"))
        .await?;
    }
    info!("updated user {name}: {:?}", delta.paths().collect::<Vec<_>>());

    let mut updated = desired.clone();
    updated.copy_status_from(latest);
    Ok(updated)
  }

  async fn delete(&self, latest: &User) -> Result<()> {
    let name = &latest.spec.name;
    policies::remove_all_policies(self.iam.as_ref(), &Principal::User(name.clone())).await?;
    self.iam.delete_user(name).await?;
    info!("deleted user {name}");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use mockall::predicate::eq;

  use super::*;
  use crate::crd::{Tag, UserSpec};
  use crate::iam::MockIamApi;

  const BOUNDARY: &str = "arn:aws:iam::123456789012:policy/boundary";

  fn user(boundary: Option<&str>, tags: Vec<Tag>) -> User {
    User::new(
      "bob",
      UserSpec {
        name: "bob".into(),
        path: Some("/".into()),
        permissions_boundary: boundary.map(str::to_owned),
        tags,
        ..Default::default()
      },
    )
  }

  #[tokio::test]
  async fn boundary_removal_and_tag_update() {
    let mut api = MockIamApi::new();
    api
      .expect_delete_permissions_boundary()
      .with(eq(Principal::User("bob".into())))
      .times(1)
      .returning(|_| Ok(()));
    api
      .expect_tag_resource()
      .withf(|target, tags| *target == TagTarget::User("bob".into()) && tags == [Tag::new("env", "prod")])
      .times(1)
      .returning(|_, _| Ok(()));
    let manager = UserManager::new(Arc::new(api));

    let latest = user(Some(BOUNDARY), vec![Tag::new("env", "dev")]);
    let desired = user(None, vec![Tag::new("env", "prod")]);
    let delta = manager.delta(&desired, &latest);
    assert_eq!(delta.paths().collect::<Vec<_>>(), vec!["Spec.PermissionsBoundary", "Spec.Tags"]);
    manager.update(&desired, &latest, &delta).await.unwrap();
  }

  #[tokio::test]
  async fn read_one_maps_no_such_entity_to_none() {
    let mut api = MockIamApi::new();
    api.expect_get_user().returning(|_| Ok(None));
    let manager = UserManager::new(Arc::new(api));

    assert_eq!(manager.read_one(&user(None, vec![])).await.unwrap(), None);
  }

  #[tokio::test]
  async fn renaming_is_terminal() {
    let manager = UserManager::new(Arc::new(MockIamApi::new()));
    let latest = user(None, vec![]);
    let mut desired = latest.clone();
    desired.spec.name = "alice".into();

    let delta = manager.delta(&desired, &latest);
    assert!(manager.update(&desired, &latest, &delta).await.unwrap_err().is_terminal());
  }
}
