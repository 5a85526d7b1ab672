use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use super::{same_opt, Delta, ResourceManager};
use crate::crd::{AckResource, ResourceMetadata, ServiceLinkedRole};
use crate::iam::{IamApi, RoleOutput};
use crate::Result;

/// Service linked roles live under `/aws-service-role/<service>/`
const SERVICE_ROLE_PATH_PREFIX: &str = "/aws-service-role/";

pub struct ServiceLinkedRoleManager {
  iam: Arc<dyn IamApi>,
}

impl ServiceLinkedRoleManager {
  pub fn new(iam: Arc<dyn IamApi>) -> Self {
    Self { iam }
  }
}

fn set_status(role: &mut ServiceLinkedRole, out: &RoleOutput) {
  *role.resource_metadata_mut() = ResourceMetadata::with_arn(&out.arn);
  let status = role.status.get_or_insert_with(Default::default);
  status.role_name = Some(out.role_name.clone());
  status.role_id = Some(out.role_id.clone());
  status.create_date = out.create_date;
  status.max_session_duration = out.max_session_duration;
  status.role_last_used = out.last_used.clone();
}

/// The service principal is encoded in the role path,
/// e.g. `/aws-service-role/elasticbeanstalk.amazonaws.com/`
fn service_from_path(path: &str) -> Option<&str> {
  path
    .strip_prefix(SERVICE_ROLE_PATH_PREFIX)
    .map(|rest| rest.trim_end_matches('/'))
    .filter(|service| !service.is_empty())
}

/// Role names are `AWSServiceRoleFor<Service>` with `_<suffix>` appended
/// when a custom suffix was requested at creation
fn suffix_from_name(role_name: &str) -> Option<&str> {
  role_name
    .rsplit_once('_')
    .map(|(_, suffix)| suffix)
    .filter(|suffix| !suffix.is_empty())
}

#[async_trait]
impl ResourceManager for ServiceLinkedRoleManager {
  type Resource = ServiceLinkedRole;

  fn late_initialize(&self, desired: &mut ServiceLinkedRole, latest: &ServiceLinkedRole) {
    if desired.spec.description.is_none() {
      desired.spec.description = latest.spec.description.clone();
    }
  }

  fn delta(&self, desired: &ServiceLinkedRole, latest: &ServiceLinkedRole) -> Delta {
    let (a, b) = (&desired.spec, &latest.spec);
    let mut delta = Delta::new();
    delta.add_if(a.aws_service_name != b.aws_service_name, "Spec.AWSServiceName");
    delta.add_if(!same_opt(&a.custom_suffix, &b.custom_suffix), "Spec.CustomSuffix");
    delta.add_if(!same_opt(&a.description, &b.description), "Spec.Description");
    delta
  }

  async fn read_one(&self, desired: &ServiceLinkedRole) -> Result<Option<ServiceLinkedRole>> {
    let Some(role_name) = desired.status.as_ref().and_then(|s| s.role_name.as_deref()) else {
      return Ok(None);
    };
    let Some(out) = self.iam.get_role(role_name).await? else {
      return Ok(None);
    };

    let mut latest = desired.clone();
    if let Some(service) = service_from_path(&out.path) {
      latest.spec.aws_service_name = service.to_string();
    }
    latest.spec.custom_suffix = suffix_from_name(&out.role_name).map(str::to_owned);
    latest.spec.description = out.description.clone();
    set_status(&mut latest, &out);
    Ok(Some(latest))
  }

  async fn create(&self, desired: &ServiceLinkedRole) -> Result<ServiceLinkedRole> {
    let out = self.iam.create_service_linked_role(&desired.spec).await?;
    info!("created service linked role {}", out.arn);
    let mut created = desired.clone();
    set_status(&mut created, &out);
    Ok(created)
  }

  async fn update(
    &self,
    desired: &ServiceLinkedRole,
    latest: &ServiceLinkedRole,
    delta: &Delta,
  ) -> Result<ServiceLinkedRole> {
    delta.check_immutable(&["Spec.AWSServiceName", "Spec.CustomSuffix"])?;

    let mut updated = desired.clone();
    updated.copy_status_from(latest);
    let Some(role_name) = latest.status.as_ref().and_then(|s| s.role_name.clone()) else {
      return Ok(updated);
    };
    if delta.differs_at("Spec.Description") {
      self
        .iam
        .update_role(&role_name, desired.spec.description.clone(), None)
        .await?;
      info!("updated description of service linked role {role_name}");
    }
    Ok(updated)
  }

  async fn delete(&self, latest: &ServiceLinkedRole) -> Result<()> {
    let Some(role_name) = latest.status.as_ref().and_then(|s| s.role_name.as_deref()) else {
      return Ok(());
    };
    let task = self.iam.delete_service_linked_role(role_name).await?;
    info!("deleting service linked role {role_name}, deletion task {task}");
    Ok(())
  }
}
