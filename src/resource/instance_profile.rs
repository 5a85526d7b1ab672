use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use super::{same_opt, Delta, ResourceManager};
use crate::crd::{AckResource, InstanceProfile, ResourceMetadata};
use crate::iam::{IamApi, InstanceProfileOutput, TagTarget};
use crate::references::{self, ReferenceReader, Resolved};
use crate::{tags, Result};

pub struct InstanceProfileManager {
  iam: Arc<dyn IamApi>,
}

impl InstanceProfileManager {
  pub fn new(iam: Arc<dyn IamApi>) -> Self {
    Self { iam }
  }

  /// An instance profile holds at most one role: drop the current one before
  /// adding the desired one
  async fn sync_role(&self, profile: &str, desired: Option<&str>, latest: Option<&str>) -> Result<()> {
    let desired = desired.filter(|r| !r.is_empty());
    let latest = latest.filter(|r| !r.is_empty());
    if desired == latest {
      return Ok(());
    }
    if let Some(role) = latest {
      debug!("removing role {role} from instance profile {profile}");
      self.iam.remove_role_from_instance_profile(profile, role).await?;
    }
    if let Some(role) = desired {
      debug!("adding role {role} to instance profile {profile}");
      self.iam.add_role_to_instance_profile(profile, role).await?;
    }
    Ok(())
  }
}

fn set_status(profile: &mut InstanceProfile, out: &InstanceProfileOutput) {
  *profile.resource_metadata_mut() = ResourceMetadata::with_arn(&out.arn);
  let status = profile.status.get_or_insert_with(Default::default);
  status.instance_profile_id = Some(out.instance_profile_id.clone());
  status.create_date = out.create_date;
}

#[async_trait]
impl ResourceManager for InstanceProfileManager {
  type Resource = InstanceProfile;

  async fn resolve_references(
    &self,
    reader: &dyn ReferenceReader,
    desired: &InstanceProfile,
  ) -> Result<Resolved<InstanceProfile>> {
    references::resolve_instance_profile(reader, desired).await
  }

  fn late_initialize(&self, desired: &mut InstanceProfile, latest: &InstanceProfile) {
    if desired.spec.path.is_none() {
      desired.spec.path = latest.spec.path.clone();
    }
  }

  fn delta(&self, desired: &InstanceProfile, latest: &InstanceProfile) -> Delta {
    let (a, b) = (&desired.spec, &latest.spec);
    let mut delta = Delta::new();
    delta.add_if(a.name != b.name, "Spec.Name");
    delta.add_if(!same_opt(&a.path, &b.path), "Spec.Path");
    delta.add_if(!same_opt(&a.role, &b.role), "Spec.Role");
    delta.add_if(!tags::equal_tags(&a.tags, &b.tags), "Spec.Tags");
    delta
  }

  async fn read_one(&self, desired: &InstanceProfile) -> Result<Option<InstanceProfile>> {
    let Some(out) = self.iam.get_instance_profile(&desired.spec.name).await? else {
      return Ok(None);
    };

    let mut latest = desired.clone();
    latest.spec.name = out.instance_profile_name.clone();
    latest.spec.path = Some(out.path.clone());
    latest.spec.role = out.role_names.first().cloned();
    latest.spec.tags = tags::list_tags(
      self.iam.as_ref(),
      &TagTarget::InstanceProfile(out.instance_profile_name.clone()),
    )
    .await?;
    set_status(&mut latest, &out);
    Ok(Some(latest))
  }

  async fn create(&self, desired: &InstanceProfile) -> Result<InstanceProfile> {
    let out = self.iam.create_instance_profile(&desired.spec).await?;
    info!("created instance profile {}", out.arn);
    self
      .sync_role(&out.instance_profile_name, desired.spec.role.as_deref(), None)
      .await?;

    let mut created = desired.clone();
    set_status(&mut created, &out);
    Ok(created)
  }

  async fn update(
    &self,
    desired: &InstanceProfile,
    latest: &InstanceProfile,
    delta: &Delta,
  ) -> Result<InstanceProfile> {
    delta.check_immutable(&["Spec.Name", "Spec.Path"])?;

    let name = &latest.spec.name;
    if delta.differs_at("Spec.Role") {
      self
        .sync_role(name, desired.spec.role.as_deref(), latest.spec.role.as_deref())
        .await?;
    }
    if delta.differs_at("Spec.Tags") {
      tags::sync_tags(
        self.iam.as_ref(),
        &TagTarget::InstanceProfile(name.clone()),
        &desired.spec.tags,
        &latest.spec.tags,
      )
      .await?;
    }
    info!("updated instance profile {name}: {:?}", delta.paths().collect::<Vec<_>>());

    let mut updated = desired.clone();
    updated.copy_status_from(latest);
    Ok(updated)
  }

  async fn delete(&self, latest: &InstanceProfile) -> Result<()> {
    let name = &latest.spec.name;
    self.sync_role(name, None, latest.spec.role.as_deref()).await?;
    self.iam.delete_instance_profile(name).await?;
    info!("deleted instance profile {name}");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use mockall::predicate::eq;
  use mockall::Sequence;

  use super::*;
  use crate::crd::InstanceProfileSpec;
  use crate::iam::MockIamApi;

  fn profile(role: Option<&str>) -> InstanceProfile {
    InstanceProfile::new(
      "web",
      InstanceProfileSpec {
        name: "web".into(),
        path: Some("/".into()),
        role: role.map(str::to_owned),
        ..Default::default()
      },
    )
  }

  #[tokio::test]
  async fn role_swap_removes_then_adds() {
    let mut api = MockIamApi::new();
    let mut seq = Sequence::new();
    api
      .expect_remove_role_from_instance_profile()
      .with(eq("web"), eq("old"))
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_, _| Ok(()));
    api
      .expect_add_role_to_instance_profile()
      .with(eq("web"), eq("new"))
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_, _| Ok(()));
    let manager = InstanceProfileManager::new(Arc::new(api));

    let latest = profile(Some("old"));
    let desired = profile(Some("new"));
    let delta = manager.delta(&desired, &latest);
    manager.update(&desired, &latest, &delta).await.unwrap();
  }

  #[tokio::test]
  async fn read_one_takes_first_role() {
    let mut api = MockIamApi::new();
    api.expect_get_instance_profile().returning(|_| {
      Ok(Some(InstanceProfileOutput {
        arn: "arn:aws:iam::123456789012:instance-profile/web".into(),
        instance_profile_id: "AIPAEXAMPLE".into(),
        instance_profile_name: "web".into(),
        path: "/".into(),
        role_names: vec!["web-role".into()],
        create_date: None,
      }))
    });
    api.expect_list_tags().returning(|_| Ok(vec![]));
    let manager = InstanceProfileManager::new(Arc::new(api));

    let latest = manager.read_one(&profile(None)).await.unwrap().unwrap();
    assert_eq!(latest.spec.role.as_deref(), Some("web-role"));
    assert!(manager.delta(&profile(Some("web-role")), &latest).is_empty());
  }

  #[tokio::test]
  async fn delete_detaches_role() {
    let mut api = MockIamApi::new();
    api
      .expect_remove_role_from_instance_profile()
      .with(eq("web"), eq("web-role"))
      .times(1)
      .returning(|_, _| Ok(()));
    api
      .expect_delete_instance_profile()
      .with(eq("web"))
      .times(1)
      .returning(|_| Ok(()));
    let manager = InstanceProfileManager::new(Arc::new(api));

    manager.delete(&profile(Some("web-role"))).await.unwrap();
  }

  #[tokio::test]
  async fn name_and_path_are_immutable() {
    let manager = InstanceProfileManager::new(Arc::new(MockIamApi::new()));
    let latest = profile(Some("web-role"));

    let mut renamed = latest.clone();
    renamed.spec.name = "web-2".into();
    let delta = manager.delta(&renamed, &latest);
    assert!(manager.update(&renamed, &latest, &delta).await.unwrap_err().is_terminal());

    let mut moved = latest.clone();
    moved.spec.path = Some("/web/".into());
    let delta = manager.delta(&moved, &latest);
    let err = manager.update(&moved, &latest, &delta).await.unwrap_err();
    assert_eq!(err.to_string(), "Immutable Spec fields have been modified: Spec.Path");
  }
}
