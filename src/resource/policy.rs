use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use super::{same_opt, Delta, ResourceManager};
use crate::crd::{AckResource, Policy, ResourceMetadata};
use crate::iam::{IamApi, PolicyOutput, PolicyVersion, TagTarget};
use crate::{policy_document, tags, Result};

/// IAM keeps at most this many versions of a managed policy
pub const POLICY_VERSION_LIMIT: usize = 5;

const DEFAULT_PATH: &str = "/";

/// All versions of a policy, oldest first
pub async fn policy_versions(api: &dyn IamApi, arn: &str) -> Result<Vec<PolicyVersion>> {
  let mut versions = api.list_policy_versions(arn).await?;
  versions.sort_by_key(|v| v.create_date);
  Ok(versions)
}

/// Make room for one more version by deleting the oldest non-default one once
/// the limit is reached
pub async fn ensure_versions_limit_not_exceeded(api: &dyn IamApi, arn: &str) -> Result<()> {
  let versions = policy_versions(api, arn).await?;
  if versions.len() < POLICY_VERSION_LIMIT {
    return Ok(());
  }
  if let Some(oldest) = versions.iter().find(|v| !v.is_default) {
    api.delete_policy_version(arn, &oldest.version_id).await?;
    info!(
      "policy {arn} reached {POLICY_VERSION_LIMIT} versions, deleted oldest non-default version {}",
      oldest.version_id
    );
  }
  Ok(())
}

/// Create a new default version holding `document` and return its id
pub async fn update_policy_document(api: &dyn IamApi, arn: &str, document: &str) -> Result<String> {
  ensure_versions_limit_not_exceeded(api, arn).await?;
  let version = api.create_policy_version(arn, document, true).await?;
  debug!("policy {arn} now defaults to version {}", version.version_id);
  Ok(version.version_id)
}

/// IAM refuses to delete a policy that still has non-default versions
pub async fn delete_non_default_policy_versions(api: &dyn IamApi, arn: &str) -> Result<()> {
  for version in policy_versions(api, arn).await? {
    if version.is_default {
      continue;
    }
    debug!("deleting version {} of policy {arn}", version.version_id);
    api.delete_policy_version(arn, &version.version_id).await?;
  }
  Ok(())
}

pub struct PolicyManager {
  iam: Arc<dyn IamApi>,
}

impl PolicyManager {
  pub fn new(iam: Arc<dyn IamApi>) -> Self {
    Self { iam }
  }
}

fn set_status(policy: &mut Policy, out: &PolicyOutput) {
  *policy.resource_metadata_mut() = ResourceMetadata::with_arn(&out.arn);
  let status = policy.status.get_or_insert_with(Default::default);
  status.policy_id = out.policy_id.clone();
  status.default_version_id = out.default_version_id.clone();
  status.attachment_count = out.attachment_count;
  status.permissions_boundary_usage_count = out.permissions_boundary_usage_count;
  status.is_attachable = Some(out.is_attachable);
  status.create_date = out.create_date;
  status.update_date = out.update_date;
}

#[async_trait]
impl ResourceManager for PolicyManager {
  type Resource = Policy;

  fn late_initialize(&self, desired: &mut Policy, latest: &Policy) {
    if desired.spec.path.is_none() {
      desired.spec.path = latest.spec.path.clone().or_else(|| Some(DEFAULT_PATH.to_string()));
    }
    if desired.spec.description.is_none() {
      desired.spec.description = latest.spec.description.clone();
    }
  }

  fn delta(&self, desired: &Policy, latest: &Policy) -> Delta {
    let (a, b) = (&desired.spec, &latest.spec);
    let mut delta = Delta::new();
    delta.add_if(a.name != b.name, "Spec.Name");
    delta.add_if(!same_opt(&a.path, &b.path), "Spec.Path");
    delta.add_if(!same_opt(&a.description, &b.description), "Spec.Description");
    delta.add_if(
      !policy_document::equivalent(&a.policy_document, &b.policy_document),
      "Spec.PolicyDocument",
    );
    delta.add_if(!tags::equal_tags(&a.tags, &b.tags), "Spec.Tags");
    delta
  }

  async fn read_one(&self, desired: &Policy) -> Result<Option<Policy>> {
    let Some(arn) = desired.arn() else {
      return Ok(None);
    };
    let Some(out) = self.iam.get_policy(arn).await? else {
      return Ok(None);
    };

    let mut latest = desired.clone();
    if let Some(name) = &out.policy_name {
      latest.spec.name = name.clone();
    }
    latest.spec.path = out.path.clone();
    latest.spec.description = out.description.clone();
    if let Some(version_id) = &out.default_version_id {
      let version = self.iam.get_policy_version(&out.arn, version_id).await?;
      if let Some(encoded) = &version.document {
        latest.spec.policy_document = policy_document::decode(encoded)?;
      }
    }
    latest.spec.tags = tags::list_tags(self.iam.as_ref(), &TagTarget::Policy(out.arn.clone())).await?;
    set_status(&mut latest, &out);
    Ok(Some(latest))
  }

  async fn create(&self, desired: &Policy) -> Result<Policy> {
    let out = self.iam.create_policy(&desired.spec).await?;
    info!("created policy {}", out.arn);
    let mut created = desired.clone();
    set_status(&mut created, &out);
    Ok(created)
  }

  async fn update(&self, desired: &Policy, latest: &Policy, delta: &Delta) -> Result<Policy> {
    delta.check_immutable(&["Spec.Name", "Spec.Path", "Spec.Description"])?;

    let mut updated = desired.clone();
    updated.copy_status_from(latest);
    let Some(arn) = latest.arn().map(str::to_owned) else {
      return Ok(updated);
    };
    let api = self.iam.as_ref();

    if delta.differs_at("Spec.PolicyDocument") {
      let version_id = update_policy_document(api, &arn, &desired.spec.policy_document).await?;
      updated.status.get_or_insert_with(Default::default).default_version_id = Some(version_id);
    }
    if delta.differs_at("Spec.Tags") {
      tags::sync_tags(api, &TagTarget::Policy(arn.clone()), &desired.spec.tags, &latest.spec.tags).await?;
    }
    info!("updated policy {arn}: {:?}", delta.paths().collect::<Vec<_>>());
    Ok(updated)
  }

  async fn delete(&self, latest: &Policy) -> Result<()> {
    let Some(arn) = latest.arn() else {
      return Ok(());
    };
    delete_non_default_policy_versions(self.iam.as_ref(), arn).await?;
    self.iam.delete_policy(arn).await?;
    info!("deleted policy {arn}");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use mockall::predicate::eq;

  use super::*;
  use crate::crd::PolicySpec;
  use crate::iam::MockIamApi;

  const ARN: &str = "arn:aws:iam::123456789012:policy/app";

  fn version(id: &str, day: u32, is_default: bool) -> PolicyVersion {
    PolicyVersion {
      version_id: id.to_string(),
      document: None,
      is_default,
      create_date: Utc.with_ymd_and_hms(2023, 1, day, 0, 0, 0).single(),
    }
  }

  fn policy_with_arn() -> Policy {
    let mut policy = Policy::new(
      "app",
      PolicySpec {
        name: "app".into(),
        policy_document: r#"{"Version":"2012-10-17","Statement":[]}"#.into(),
        ..Default::default()
      },
    );
    *policy.resource_metadata_mut() = ResourceMetadata::with_arn(ARN);
    policy
  }

  #[tokio::test]
  async fn versions_are_sorted_oldest_first() {
    let mut api = MockIamApi::new();
    api
      .expect_list_policy_versions()
      .returning(|_| Ok(vec![version("v3", 3, true), version("v1", 1, false), version("v2", 2, false)]));

    let ids: Vec<_> = policy_versions(&api, ARN)
      .await
      .unwrap()
      .into_iter()
      .map(|v| v.version_id)
      .collect();
    assert_eq!(ids, vec!["v1", "v2", "v3"]);
  }

  #[tokio::test]
  async fn oldest_non_default_version_is_deleted_at_the_limit() {
    let mut api = MockIamApi::new();
    api.expect_list_policy_versions().returning(|_| {
      Ok(vec![
        version("v5", 5, false),
        version("v1", 1, true),
        version("v2", 2, false),
        version("v3", 3, false),
        version("v4", 4, false),
      ])
    });
    api
      .expect_delete_policy_version()
      .with(eq(ARN), eq("v2"))
      .times(1)
      .returning(|_, _| Ok(()));

    ensure_versions_limit_not_exceeded(&api, ARN).await.unwrap();
  }

  #[tokio::test]
  async fn nothing_is_deleted_below_the_limit() {
    let mut api = MockIamApi::new();
    api
      .expect_list_policy_versions()
      .returning(|_| Ok((1..=4).map(|day| version(&format!("v{day}"), day, day == 4)).collect()));
    api.expect_delete_policy_version().never();

    ensure_versions_limit_not_exceeded(&api, ARN).await.unwrap();
  }

  #[tokio::test]
  async fn document_change_creates_default_version() {
    let mut api = MockIamApi::new();
    api
      .expect_list_policy_versions()
      .returning(|_| Ok(vec![version("v1", 1, true)]));
    api
      .expect_create_policy_version()
      .withf(|arn, _, set_as_default| arn == ARN && *set_as_default)
      .times(1)
      .returning(|_, _, _| Ok(version("v2", 2, true)));
    let manager = PolicyManager::new(Arc::new(api));

    let latest = policy_with_arn();
    let mut desired = policy_with_arn();
    desired.spec.policy_document =
      r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"s3:*","Resource":"*"}]}"#.into();

    let delta = manager.delta(&desired, &latest);
    let updated = manager.update(&desired, &latest, &delta).await.unwrap();
    assert_eq!(
      updated.status.unwrap().default_version_id.as_deref(),
      Some("v2")
    );
  }

  #[tokio::test]
  async fn description_is_immutable() {
    let manager = PolicyManager::new(Arc::new(MockIamApi::new()));
    let latest = policy_with_arn();
    let mut desired = policy_with_arn();
    desired.spec.description = Some("changed".into());

    let delta = manager.delta(&desired, &latest);
    assert!(manager.update(&desired, &latest, &delta).await.unwrap_err().is_terminal());
  }

  #[tokio::test]
  async fn read_one_without_arn_is_not_found() {
    let manager = PolicyManager::new(Arc::new(MockIamApi::new()));
    let mut policy = policy_with_arn();
    policy.status = None;
    assert_eq!(manager.read_one(&policy).await.unwrap(), None);
  }

  #[tokio::test]
  async fn delete_removes_non_default_versions_first() {
    let mut api = MockIamApi::new();
    api
      .expect_list_policy_versions()
      .returning(|_| Ok(vec![version("v1", 1, false), version("v2", 2, true)]));
    api
      .expect_delete_policy_version()
      .with(eq(ARN), eq("v1"))
      .times(1)
      .returning(|_, _| Ok(()));
    api.expect_delete_policy().with(eq(ARN)).times(1).returning(|_| Ok(()));
    let manager = PolicyManager::new(Arc::new(api));

    manager.delete(&policy_with_arn()).await.unwrap();
  }
}
