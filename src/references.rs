//! Resolution of `*Ref` fields to concrete values
//!
//! A reference points at another Role or Policy custom resource. Resolving it
//! produces a copy of the referencing object with the concrete field filled
//! in; the user's spec is never written back.

use async_trait::async_trait;
use kube::{Api, Client, ResourceExt};

#[cfg(test)]
use mockall::automock;

use crate::crd::{
  condition_is_true, AckResource, AwsResourceReferenceWrapper, ConditionType, Group, InstanceProfile, Policy, Role, User,
};
use crate::{Error, Result};

/// Fetches the custom resources that references can point at.
/// `None` means the object does not exist.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReferenceReader: Send + Sync {
  async fn policy(&self, namespace: &str, name: &str) -> Result<Option<Policy>>;
  async fn role(&self, namespace: &str, name: &str) -> Result<Option<Role>>;
}

#[async_trait]
impl ReferenceReader for Client {
  async fn policy(&self, namespace: &str, name: &str) -> Result<Option<Policy>> {
    Ok(Api::<Policy>::namespaced(self.clone(), namespace).get_opt(name).await?)
  }

  async fn role(&self, namespace: &str, name: &str) -> Result<Option<Role>> {
    Ok(Api::<Role>::namespaced(self.clone(), namespace).get_opt(name).await?)
  }
}

/// A copy of a custom resource with every reference replaced by its value
#[derive(Debug, Clone)]
pub struct Resolved<K> {
  pub resource: K,
  /// Whether the object carried any reference at all
  pub referenced: bool,
}

impl<K> Resolved<K> {
  fn unreferenced(resource: K) -> Self {
    Self {
      resource,
      referenced: false,
    }
  }
}

fn validate_exclusive(id_set: bool, ref_set: bool, id: &'static str, reference: &'static str) -> Result<()> {
  if id_set && ref_set {
    return Err(Error::ReferenceAndIdConflict { id, reference });
  }
  Ok(())
}

fn namespace_of<K: kube::Resource>(obj: &K) -> Result<String> {
  obj.namespace().ok_or_else(|| Error::MissingNamespace(obj.name_any()))
}

/// Name and namespace a reference points at, defaulting to `namespace`
fn target(
  wrapper: &AwsResourceReferenceWrapper,
  namespace: &str,
  field: &'static str,
) -> Result<(String, String)> {
  let from = wrapper.from.as_ref().ok_or(Error::EmptyReference(field))?;
  let name = from
    .name
    .as_deref()
    .filter(|name| !name.is_empty())
    .ok_or(Error::EmptyReference(field))?;
  let namespace = from
    .namespace
    .as_deref()
    .filter(|ns| !ns.is_empty())
    .unwrap_or(namespace);
  Ok((namespace.to_string(), name.to_string()))
}

fn found<K>(obj: Option<K>, kind: &'static str, namespace: &str, name: &str) -> Result<K> {
  obj.ok_or_else(|| Error::ReferenceNotFound {
    kind,
    namespace: namespace.to_string(),
    name: name.to_string(),
  })
}

/// Referenced objects must be synced and must not be stuck in a terminal state
fn ensure_usable<K: AckResource>(obj: &K, kind: &'static str, namespace: &str, name: &str) -> Result<()> {
  if condition_is_true(obj.conditions(), ConditionType::Terminal) {
    return Err(Error::ReferenceTerminal {
      kind,
      namespace: namespace.to_string(),
      name: name.to_string(),
    });
  }
  if !condition_is_true(obj.conditions(), ConditionType::ResourceSynced) {
    return Err(Error::ReferenceNotSynced {
      kind,
      namespace: namespace.to_string(),
      name: name.to_string(),
    });
  }
  Ok(())
}

/// ARN of the Policy a reference points at
pub async fn policy_arn(
  reader: &dyn ReferenceReader,
  wrapper: &AwsResourceReferenceWrapper,
  namespace: &str,
  field: &'static str,
) -> Result<String> {
  let (namespace, name) = target(wrapper, namespace, field)?;
  let policy = found(reader.policy(&namespace, &name).await?, "Policy", &namespace, &name)?;
  ensure_usable(&policy, "Policy", &namespace, &name)?;
  policy
    .arn()
    .filter(|arn| !arn.is_empty())
    .map(str::to_owned)
    .ok_or(Error::ReferenceMissingTargetField {
      kind: "Policy",
      namespace,
      name,
      field: "Status.ACKResourceMetadata.ARN",
    })
}

/// IAM name of the Role a reference points at
pub async fn role_name(
  reader: &dyn ReferenceReader,
  wrapper: &AwsResourceReferenceWrapper,
  namespace: &str,
  field: &'static str,
) -> Result<String> {
  let (namespace, name) = target(wrapper, namespace, field)?;
  let role = found(reader.role(&namespace, &name).await?, "Role", &namespace, &name)?;
  ensure_usable(&role, "Role", &namespace, &name)?;
  if role.spec.name.is_empty() {
    return Err(Error::ReferenceMissingTargetField {
      kind: "Role",
      namespace,
      name,
      field: "Spec.Name",
    });
  }
  Ok(role.spec.name)
}

async fn policy_arns(
  reader: &dyn ReferenceReader,
  refs: &[AwsResourceReferenceWrapper],
  namespace: &str,
) -> Result<Vec<String>> {
  let mut arns = Vec::with_capacity(refs.len());
  for wrapper in refs {
    arns.push(policy_arn(reader, wrapper, namespace, "PolicyRefs").await?);
  }
  Ok(arns)
}

pub async fn resolve_role(reader: &dyn ReferenceReader, role: &Role) -> Result<Resolved<Role>> {
  let spec = &role.spec;
  validate_exclusive(
    spec.permissions_boundary.is_some(),
    spec.permissions_boundary_ref.is_some(),
    "PermissionsBoundary",
    "PermissionsBoundaryRef",
  )?;
  validate_exclusive(
    !spec.policies.is_empty(),
    !spec.policy_refs.is_empty(),
    "Policies",
    "PolicyRefs",
  )?;
  if spec.permissions_boundary_ref.is_none() && spec.policy_refs.is_empty() {
    return Ok(Resolved::unreferenced(role.clone()));
  }

  let namespace = namespace_of(role)?;
  let mut resolved = role.clone();
  if let Some(wrapper) = &spec.permissions_boundary_ref {
    resolved.spec.permissions_boundary =
      Some(policy_arn(reader, wrapper, &namespace, "PermissionsBoundaryRef").await?);
  }
  if !spec.policy_refs.is_empty() {
    resolved.spec.policies = policy_arns(reader, &spec.policy_refs, &namespace).await?;
  }
  Ok(Resolved {
    resource: resolved,
    referenced: true,
  })
}

pub async fn resolve_user(reader: &dyn ReferenceReader, user: &User) -> Result<Resolved<User>> {
  let spec = &user.spec;
  validate_exclusive(
    spec.permissions_boundary.is_some(),
    spec.permissions_boundary_ref.is_some(),
    "PermissionsBoundary",
    "PermissionsBoundaryRef",
  )?;
  validate_exclusive(
    !spec.policies.is_empty(),
    !spec.policy_refs.is_empty(),
    "Policies",
    "PolicyRefs",
  )?;
  if spec.permissions_boundary_ref.is_none() && spec.policy_refs.is_empty() {
    return Ok(Resolved::unreferenced(user.clone()));
  }

  let namespace = namespace_of(user)?;
  let mut resolved = user.clone();
  if let Some(wrapper) = &spec.permissions_boundary_ref {
    resolved.spec.permissions_boundary =
      Some(policy_arn(reader, wrapper, &namespace, "PermissionsBoundaryRef").await?);
  }
  if !spec.policy_refs.is_empty() {
    resolved.spec.policies = policy_arns(reader, &spec.policy_refs, &namespace).await?;
  }
  Ok(Resolved {
    resource: resolved,
    referenced: true,
  })
}

pub async fn resolve_group(reader: &dyn ReferenceReader, group: &Group) -> Result<Resolved<Group>> {
  validate_exclusive(
    !group.spec.policies.is_empty(),
    !group.spec.policy_refs.is_empty(),
    "Policies",
    "PolicyRefs",
  )?;
  if group.spec.policy_refs.is_empty() {
    return Ok(Resolved::unreferenced(group.clone()));
  }

  let namespace = namespace_of(group)?;
  let mut resolved = group.clone();
  resolved.spec.policies = policy_arns(reader, &group.spec.policy_refs, &namespace).await?;
  Ok(Resolved {
    resource: resolved,
    referenced: true,
  })
}

pub async fn resolve_instance_profile(
  reader: &dyn ReferenceReader,
  profile: &InstanceProfile,
) -> Result<Resolved<InstanceProfile>> {
  validate_exclusive(
    profile.spec.role.is_some(),
    profile.spec.role_ref.is_some(),
    "Role",
    "RoleRef",
  )?;
  let Some(wrapper) = &profile.spec.role_ref else {
    return Ok(Resolved::unreferenced(profile.clone()));
  };

  let namespace = namespace_of(profile)?;
  let mut resolved = profile.clone();
  resolved.spec.role = Some(role_name(reader, wrapper, &namespace, "RoleRef").await?);
  Ok(Resolved {
    resource: resolved,
    referenced: true,
  })
}
