use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use super::{same_inline_policies, same_opt, same_set, Delta, ResourceManager};
use crate::crd::{AckResource, Group, ResourceMetadata};
use crate::iam::{GroupOutput, IamApi, Principal};
use crate::references::{self, ReferenceReader, Resolved};
use crate::{policies, Result};

pub struct GroupManager {
  iam: Arc<dyn IamApi>,
}

impl GroupManager {
  pub fn new(iam: Arc<dyn IamApi>) -> Self {
    Self { iam }
  }
}

fn set_status(group: &mut Group, out: &GroupOutput) {
  *group.resource_metadata_mut() = ResourceMetadata::with_arn(&out.arn);
  let status = group.status.get_or_insert_with(Default::default);
  status.group_id = Some(out.group_id.clone());
  status.create_date = out.create_date;
}

#[async_trait]
impl ResourceManager for GroupManager {
  type Resource = Group;

  async fn resolve_references(&self, reader: &dyn ReferenceReader, desired: &Group) -> Result<Resolved<Group>> {
    references::resolve_group(reader, desired).await
  }

  fn late_initialize(&self, desired: &mut Group, latest: &Group) {
    if desired.spec.path.is_none() {
      desired.spec.path = latest.spec.path.clone();
    }
  }

  fn delta(&self, desired: &Group, latest: &Group) -> Delta {
    let (a, b) = (&desired.spec, &latest.spec);
    let mut delta = Delta::new();
    delta.add_if(a.name != b.name, "Spec.Name");
    delta.add_if(!same_opt(&a.path, &b.path), "Spec.Path");
    delta.add_if(!same_set(&a.policies, &b.policies), "Spec.Policies");
    delta.add_if(
      !same_inline_policies(&a.inline_policies, &b.inline_policies),
      "Spec.InlinePolicies",
    );
    delta
  }

  async fn read_one(&self, desired: &Group) -> Result<Option<Group>> {
    let Some(out) = self.iam.get_group(&desired.spec.name).await? else {
      return Ok(None);
    };
    let principal = Principal::Group(out.group_name.clone());

    let mut latest = desired.clone();
    latest.spec.name = out.group_name.clone();
    latest.spec.path = Some(out.path.clone());
    latest.spec.policies = self.iam.list_attached_policies(&principal).await?;
    latest.spec.inline_policies = policies::inline_policies(self.iam.as_ref(), &principal).await?;
    set_status(&mut latest, &out);
    Ok(Some(latest))
  }

  async fn create(&self, desired: &Group) -> Result<Group> {
    let out = self.iam.create_group(&desired.spec).await?;
    info!("created group {}", out.arn);

    let principal = Principal::Group(out.group_name.clone());
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

  async fn update(&self, desired: &Group, latest: &Group, delta: &Delta) -> Result<Group> {
    delta.check_immutable(&["Spec.Name"])?;

    let name = &latest.spec.name;
    let principal = Principal::Group(name.clone());
    let api = self.iam.as_ref();

    if delta.differs_at("Spec.Policies") {
      policies::sync_managed_policies(api, &principal, &desired.spec.policies, &latest.spec.policies).await?;
    }
    if delta.differs_at("Spec.InlinePolicies") {
      policies::sync_inline_policies(api, &principal, &desired.spec.inline_policies, &latest.spec.inline_policies)
        .await?;
    }
    if delta.differs_at("Spec.Path") {
      api
        .update_group(name, desired.spec.path.as_deref().unwrap_or("/"))
        .await?;
    }
    info!("updated group {name}: {:?}", delta.paths().collect::<Vec<_>>());

    let mut updated = desired.clone();
    updated.copy_status_from(latest);
    Ok(updated)
  }

  async fn delete(&self, latest: &Group) -> Result<()> {
    let name = &latest.spec.name;
    policies::remove_all_policies(self.iam.as_ref(), &Principal::Group(name.clone())).await?;
    self.iam.delete_group(name).await?;
    info!("deleted group {name}");
    Ok(())
  }
}
