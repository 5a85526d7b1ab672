//! Managed policy attachments, inline policies and permissions boundaries for
//! roles, users and groups

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::iam::{IamApi, Principal};
use crate::{policy_document, Result};

/// Attach the policies only present in `desired`, then detach the ones only
/// present in `latest`.
pub async fn sync_managed_policies(
  api: &dyn IamApi,
  principal: &Principal,
  desired: &[String],
  latest: &[String],
) -> Result<()> {
  let desired: BTreeSet<&str> = desired.iter().map(String::as_str).collect();
  let latest: BTreeSet<&str> = latest.iter().map(String::as_str).collect();

  for arn in desired.difference(&latest) {
    debug!("attaching policy {arn} to {principal}");
    api.attach_policy(principal, arn).await?;
  }
  for arn in latest.difference(&desired) {
    debug!("detaching policy {arn} from {principal}");
    api.detach_policy(principal, arn).await?;
  }
  Ok(())
}

/// Current inline policies of `principal`, with decoded documents
pub async fn inline_policies(api: &dyn IamApi, principal: &Principal) -> Result<BTreeMap<String, String>> {
  let mut policies = BTreeMap::new();
  for name in api.list_inline_policy_names(principal).await? {
    let encoded = api.get_inline_policy(principal, &name).await?;
    policies.insert(name, policy_document::decode(&encoded)?);
  }
  Ok(policies)
}

/// Put every inline policy that is new or whose document changed, then delete
/// the names no longer desired.
pub async fn sync_inline_policies(
  api: &dyn IamApi,
  principal: &Principal,
  desired: &BTreeMap<String, String>,
  latest: &BTreeMap<String, String>,
) -> Result<()> {
  for (name, document) in desired {
    let unchanged = latest
      .get(name)
      .is_some_and(|current| policy_document::equivalent(current, document));
    if !unchanged {
      debug!("putting inline policy {name} on {principal}");
      api.put_inline_policy(principal, name, document).await?;
    }
  }
  for name in latest.keys().filter(|name| !desired.contains_key(*name)) {
    debug!("deleting inline policy {name} from {principal}");
    api.delete_inline_policy(principal, name).await?;
  }
  Ok(())
}

/// An absent or empty `desired` removes the boundary.
pub async fn sync_permissions_boundary(
  api: &dyn IamApi,
  principal: &Principal,
  desired: Option<&str>,
  latest: Option<&str>,
) -> Result<()> {
  let desired = desired.filter(|arn| !arn.is_empty());
  let latest = latest.filter(|arn| !arn.is_empty());
  match (desired, latest) {
    (None, None) => Ok(()),
    (None, Some(_)) => {
      debug!("deleting permissions boundary of {principal}");
      api.delete_permissions_boundary(principal).await
    }
    (Some(desired), latest) if latest != Some(desired) => {
      debug!("setting permissions boundary of {principal} to {desired}");
      api.put_permissions_boundary(principal, desired).await
    }
    _ => Ok(()),
  }
}

/// Detach every managed policy and delete every inline policy so the
/// principal itself can be deleted.
pub async fn remove_all_policies(api: &dyn IamApi, principal: &Principal) -> Result<()> {
  for arn in api.list_attached_policies(principal).await? {
    debug!("detaching policy {arn} from {principal}");
    api.detach_policy(principal, &arn).await?;
  }
  for name in api.list_inline_policy_names(principal).await? {
    debug!("deleting inline policy {name} from {principal}");
    api.delete_inline_policy(principal, &name).await?;
  }
  Ok(())
}
