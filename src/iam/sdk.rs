use async_trait::async_trait;
use aws_sdk_iam::{
  error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
  primitives::DateTime as SdkDateTime,
  types, Client,
};
use chrono::{DateTime, Utc};
use log::debug;

use super::{
  GroupOutput, IamApi, InstanceProfileOutput, OpenIdConnectProviderOutput, PolicyOutput, PolicyVersion, Principal,
  RoleOutput, SamlProviderOutput, TagTarget, UserOutput,
};
use crate::crd::{
  GroupSpec, InstanceProfileSpec, OpenIDConnectProviderSpec, PolicySpec, RoleLastUsed, RoleSpec, SAMLProviderSpec,
  ServiceLinkedRoleSpec, Tag, UserSpec,
};
use crate::{Error, Result};

/// [`IamApi`] backed by the AWS SDK
#[derive(Clone, Debug)]
pub struct SdkIam {
  client: Client,
}

impl SdkIam {
  pub fn new(client: Client) -> Self {
    Self { client }
  }

  pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
    Self::new(Client::new(config))
  }
}

fn api_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> Error
where
  E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
  R: std::fmt::Debug + Send + Sync + 'static,
{
  Error::Aws {
    operation,
    code: err.code().map(str::to_owned),
    message: err
      .message()
      .map(str::to_owned)
      .unwrap_or_else(|| DisplayErrorContext(&err).to_string()),
  }
}

/// Maps `NoSuchEntity` to `Ok(None)`
fn not_found_to_none<T>(res: Result<T>) -> Result<Option<T>> {
  match res {
    Ok(value) => Ok(Some(value)),
    Err(err) if err.is_not_found() => Ok(None),
    Err(err) => Err(err),
  }
}

fn to_chrono(dt: &SdkDateTime) -> Option<DateTime<Utc>> {
  DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn sdk_tags(tags: &[Tag]) -> Result<Option<Vec<types::Tag>>> {
  if tags.is_empty() {
    return Ok(None);
  }
  tags
    .iter()
    .map(|t| {
      types::Tag::builder()
        .key(&t.key)
        .value(&t.value)
        .build()
        .map_err(|e| Error::terminal(format!("invalid tag {}: {e}", t.key)))
    })
    .collect::<Result<Vec<_>>>()
    .map(Some)
}

fn from_sdk_tag(tag: &types::Tag) -> Tag {
  Tag::new(tag.key(), tag.value())
}

fn role_output(role: &types::Role) -> RoleOutput {
  RoleOutput {
    arn: role.arn().to_owned(),
    role_id: role.role_id().to_owned(),
    role_name: role.role_name().to_owned(),
    path: role.path().to_owned(),
    description: role.description().map(str::to_owned),
    max_session_duration: role.max_session_duration(),
    assume_role_policy_document: role.assume_role_policy_document().map(str::to_owned),
    permissions_boundary: role
      .permissions_boundary()
      .and_then(|pb| pb.permissions_boundary_arn())
      .map(str::to_owned),
    create_date: to_chrono(role.create_date()),
    last_used: role.role_last_used().map(|used| RoleLastUsed {
      last_used_date: used.last_used_date().and_then(to_chrono),
      region: used.region().map(str::to_owned),
    }),
  }
}

fn policy_output(policy: &types::Policy) -> PolicyOutput {
  PolicyOutput {
    arn: policy.arn().unwrap_or_default().to_owned(),
    policy_id: policy.policy_id().map(str::to_owned),
    policy_name: policy.policy_name().map(str::to_owned),
    path: policy.path().map(str::to_owned),
    description: policy.description().map(str::to_owned),
    default_version_id: policy.default_version_id().map(str::to_owned),
    attachment_count: policy.attachment_count(),
    permissions_boundary_usage_count: policy.permissions_boundary_usage_count(),
    is_attachable: policy.is_attachable(),
    create_date: policy.create_date().and_then(to_chrono),
    update_date: policy.update_date().and_then(to_chrono),
  }
}

fn policy_version(version: &types::PolicyVersion) -> PolicyVersion {
  PolicyVersion {
    version_id: version.version_id().unwrap_or_default().to_owned(),
    document: version.document().map(str::to_owned),
    is_default: version.is_default_version(),
    create_date: version.create_date().and_then(to_chrono),
  }
}

fn group_output(group: &types::Group) -> GroupOutput {
  GroupOutput {
    arn: group.arn().to_owned(),
    group_id: group.group_id().to_owned(),
    group_name: group.group_name().to_owned(),
    path: group.path().to_owned(),
    create_date: to_chrono(group.create_date()),
  }
}

fn user_output(user: &types::User) -> UserOutput {
  UserOutput {
    arn: user.arn().to_owned(),
    user_id: user.user_id().to_owned(),
    user_name: user.user_name().to_owned(),
    path: user.path().to_owned(),
    permissions_boundary: user
      .permissions_boundary()
      .and_then(|pb| pb.permissions_boundary_arn())
      .map(str::to_owned),
    create_date: to_chrono(user.create_date()),
    password_last_used: user.password_last_used().and_then(to_chrono),
  }
}

fn instance_profile_output(profile: &types::InstanceProfile) -> InstanceProfileOutput {
  InstanceProfileOutput {
    arn: profile.arn().to_owned(),
    instance_profile_id: profile.instance_profile_id().to_owned(),
    instance_profile_name: profile.instance_profile_name().to_owned(),
    path: profile.path().to_owned(),
    role_names: profile.roles().iter().map(|r| r.role_name().to_owned()).collect(),
    create_date: to_chrono(profile.create_date()),
  }
}

/// Collects every page of a paginated IAM list operation through the SDK
/// paginator, which follows `Marker` until `IsTruncated` is false.
macro_rules! paginate {
  ($operation:literal, $builder:expr, |$page:ident| $items:expr) => {{
    let mut pages = $builder.into_paginator().send();
    let mut items = Vec::new();
    while let Some($page) = pages.next().await {
      let $page = $page.map_err(|e| api_error($operation, e))?;
      items.extend($items);
    }
    items
  }};
}

#[async_trait]
impl IamApi for SdkIam {
  async fn create_role(&self, spec: &RoleSpec) -> Result<RoleOutput> {
    let out = self
      .client
      .create_role()
      .role_name(&spec.name)
      .set_path(spec.path.clone())
      .set_description(spec.description.clone())
      .assume_role_policy_document(&spec.assume_role_policy_document)
      .set_max_session_duration(spec.max_session_duration)
      .set_permissions_boundary(spec.permissions_boundary.clone())
      .set_tags(sdk_tags(&spec.tags)?)
      .send()
      .await
      .map_err(|e| api_error("CreateRole", e))?;
    out.role().map(role_output).ok_or(Error::MissingOutput {
      operation: "CreateRole",
      field: "Role",
    })
  }

  async fn get_role(&self, name: &str) -> Result<Option<RoleOutput>> {
    let res = self
      .client
      .get_role()
      .role_name(name)
      .send()
      .await
      .map_err(|e| api_error("GetRole", e));
    match not_found_to_none(res)? {
      Some(out) => Ok(out.role().map(role_output)),
      None => Ok(None),
    }
  }

  async fn update_role(&self, name: &str, description: Option<String>, max_session_duration: Option<i32>) -> Result<()> {
    self
      .client
      .update_role()
      .role_name(name)
      .set_description(description)
      .set_max_session_duration(max_session_duration)
      .send()
      .await
      .map_err(|e| api_error("UpdateRole", e))?;
    Ok(())
  }

  async fn update_assume_role_policy(&self, name: &str, document: &str) -> Result<()> {
    self
      .client
      .update_assume_role_policy()
      .role_name(name)
      .policy_document(document)
      .send()
      .await
      .map_err(|e| api_error("UpdateAssumeRolePolicy", e))?;
    Ok(())
  }

  async fn delete_role(&self, name: &str) -> Result<()> {
    self
      .client
      .delete_role()
      .role_name(name)
      .send()
      .await
      .map_err(|e| api_error("DeleteRole", e))?;
    Ok(())
  }

  async fn put_permissions_boundary(&self, principal: &Principal, policy_arn: &str) -> Result<()> {
    match principal {
      Principal::Role(name) => {
        self
          .client
          .put_role_permissions_boundary()
          .role_name(name)
          .permissions_boundary(policy_arn)
          .send()
          .await
          .map_err(|e| api_error("PutRolePermissionsBoundary", e))?;
      }
      Principal::User(name) => {
        self
          .client
          .put_user_permissions_boundary()
          .user_name(name)
          .permissions_boundary(policy_arn)
          .send()
          .await
          .map_err(|e| api_error("PutUserPermissionsBoundary", e))?;
      }
      Principal::Group(_) => return Err(Error::terminal("groups do not support permissions boundaries")),
    }
    Ok(())
  }

  async fn delete_permissions_boundary(&self, principal: &Principal) -> Result<()> {
    match principal {
      Principal::Role(name) => {
        self
          .client
          .delete_role_permissions_boundary()
          .role_name(name)
          .send()
          .await
          .map_err(|e| api_error("DeleteRolePermissionsBoundary", e))?;
      }
      Principal::User(name) => {
        self
          .client
          .delete_user_permissions_boundary()
          .user_name(name)
          .send()
          .await
          .map_err(|e| api_error("DeleteUserPermissionsBoundary", e))?;
      }
      Principal::Group(_) => return Err(Error::terminal("groups do not support permissions boundaries")),
    }
    Ok(())
  }

  async fn list_attached_policies(&self, principal: &Principal) -> Result<Vec<String>> {
    let arns = match principal {
      Principal::Role(name) => paginate!(
        "ListAttachedRolePolicies",
        self.client.list_attached_role_policies().role_name(name),
        |page| page.attached_policies().iter().filter_map(|p| p.policy_arn()).map(str::to_owned)
      ),
      Principal::User(name) => paginate!(
        "ListAttachedUserPolicies",
        self.client.list_attached_user_policies().user_name(name),
        |page| page.attached_policies().iter().filter_map(|p| p.policy_arn()).map(str::to_owned)
      ),
      Principal::Group(name) => paginate!(
        "ListAttachedGroupPolicies",
        self.client.list_attached_group_policies().group_name(name),
        |page| page.attached_policies().iter().filter_map(|p| p.policy_arn()).map(str::to_owned)
      ),
    };
    Ok(arns)
  }

  async fn attach_policy(&self, principal: &Principal, policy_arn: &str) -> Result<()> {
    match principal {
      Principal::Role(name) => self
        .client
        .attach_role_policy()
        .role_name(name)
        .policy_arn(policy_arn)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("AttachRolePolicy", e)),
      Principal::User(name) => self
        .client
        .attach_user_policy()
        .user_name(name)
        .policy_arn(policy_arn)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("AttachUserPolicy", e)),
      Principal::Group(name) => self
        .client
        .attach_group_policy()
        .group_name(name)
        .policy_arn(policy_arn)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("AttachGroupPolicy", e)),
    }
  }

  async fn detach_policy(&self, principal: &Principal, policy_arn: &str) -> Result<()> {
    match principal {
      Principal::Role(name) => self
        .client
        .detach_role_policy()
        .role_name(name)
        .policy_arn(policy_arn)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("DetachRolePolicy", e)),
      Principal::User(name) => self
        .client
        .detach_user_policy()
        .user_name(name)
        .policy_arn(policy_arn)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("DetachUserPolicy", e)),
      Principal::Group(name) => self
        .client
        .detach_group_policy()
        .group_name(name)
        .policy_arn(policy_arn)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("DetachGroupPolicy", e)),
    }
  }

  async fn list_inline_policy_names(&self, principal: &Principal) -> Result<Vec<String>> {
    let names = match principal {
      Principal::Role(name) => paginate!(
        "ListRolePolicies",
        self.client.list_role_policies().role_name(name),
        |page| page.policy_names().iter().cloned()
      ),
      Principal::User(name) => paginate!(
        "ListUserPolicies",
        self.client.list_user_policies().user_name(name),
        |page| page.policy_names().iter().cloned()
      ),
      Principal::Group(name) => paginate!(
        "ListGroupPolicies",
        self.client.list_group_policies().group_name(name),
        |page| page.policy_names().iter().cloned()
      ),
    };
    Ok(names)
  }

  async fn get_inline_policy(&self, principal: &Principal, policy_name: &str) -> Result<String> {
    let document = match principal {
      Principal::Role(name) => self
        .client
        .get_role_policy()
        .role_name(name)
        .policy_name(policy_name)
        .send()
        .await
        .map_err(|e| api_error("GetRolePolicy", e))?
        .policy_document()
        .to_owned(),
      Principal::User(name) => self
        .client
        .get_user_policy()
        .user_name(name)
        .policy_name(policy_name)
        .send()
        .await
        .map_err(|e| api_error("GetUserPolicy", e))?
        .policy_document()
        .to_owned(),
      Principal::Group(name) => self
        .client
        .get_group_policy()
        .group_name(name)
        .policy_name(policy_name)
        .send()
        .await
        .map_err(|e| api_error("GetGroupPolicy", e))?
        .policy_document()
        .to_owned(),
    };
    Ok(document)
  }

  async fn put_inline_policy(&self, principal: &Principal, policy_name: &str, document: &str) -> Result<()> {
    match principal {
      Principal::Role(name) => self
        .client
        .put_role_policy()
        .role_name(name)
        .policy_name(policy_name)
        .policy_document(document)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("PutRolePolicy", e)),
      Principal::User(name) => self
        .client
        .put_user_policy()
        .user_name(name)
        .policy_name(policy_name)
        .policy_document(document)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("PutUserPolicy", e)),
      Principal::Group(name) => self
        .client
        .put_group_policy()
        .group_name(name)
        .policy_name(policy_name)
        .policy_document(document)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("PutGroupPolicy", e)),
    }
  }

  async fn delete_inline_policy(&self, principal: &Principal, policy_name: &str) -> Result<()> {
    match principal {
      Principal::Role(name) => self
        .client
        .delete_role_policy()
        .role_name(name)
        .policy_name(policy_name)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("DeleteRolePolicy", e)),
      Principal::User(name) => self
        .client
        .delete_user_policy()
        .user_name(name)
        .policy_name(policy_name)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("DeleteUserPolicy", e)),
      Principal::Group(name) => self
        .client
        .delete_group_policy()
        .group_name(name)
        .policy_name(policy_name)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("DeleteGroupPolicy", e)),
    }
  }

  async fn list_tags(&self, target: &TagTarget) -> Result<Vec<Tag>> {
    let tags = match target {
      TagTarget::Role(name) => paginate!(
        "ListRoleTags",
        self.client.list_role_tags().role_name(name),
        |page| page.tags().iter().map(from_sdk_tag)
      ),
      TagTarget::User(name) => paginate!(
        "ListUserTags",
        self.client.list_user_tags().user_name(name),
        |page| page.tags().iter().map(from_sdk_tag)
      ),
      TagTarget::Policy(arn) => paginate!(
        "ListPolicyTags",
        self.client.list_policy_tags().policy_arn(arn),
        |page| page.tags().iter().map(from_sdk_tag)
      ),
      TagTarget::InstanceProfile(name) => paginate!(
        "ListInstanceProfileTags",
        self.client.list_instance_profile_tags().instance_profile_name(name),
        |page| page.tags().iter().map(from_sdk_tag)
      ),
      TagTarget::OpenIdConnectProvider(arn) => paginate!(
        "ListOpenIDConnectProviderTags",
        self.client.list_open_id_connect_provider_tags().open_id_connect_provider_arn(arn),
        |page| page.tags().iter().map(from_sdk_tag)
      ),
      TagTarget::SamlProvider(arn) => paginate!(
        "ListSAMLProviderTags",
        self.client.list_saml_provider_tags().saml_provider_arn(arn),
        |page| page.tags().iter().map(from_sdk_tag)
      ),
    };
    Ok(tags)
  }

  async fn tag_resource(&self, target: &TagTarget, tags: &[Tag]) -> Result<()> {
    let tags = sdk_tags(tags)?;
    debug!("tagging {target}");
    match target {
      TagTarget::Role(name) => self
        .client
        .tag_role()
        .role_name(name)
        .set_tags(tags)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("TagRole", e)),
      TagTarget::User(name) => self
        .client
        .tag_user()
        .user_name(name)
        .set_tags(tags)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("TagUser", e)),
      TagTarget::Policy(arn) => self
        .client
        .tag_policy()
        .policy_arn(arn)
        .set_tags(tags)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("TagPolicy", e)),
      TagTarget::InstanceProfile(name) => self
        .client
        .tag_instance_profile()
        .instance_profile_name(name)
        .set_tags(tags)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("TagInstanceProfile", e)),
      TagTarget::OpenIdConnectProvider(arn) => self
        .client
        .tag_open_id_connect_provider()
        .open_id_connect_provider_arn(arn)
        .set_tags(tags)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("TagOpenIDConnectProvider", e)),
      TagTarget::SamlProvider(arn) => self
        .client
        .tag_saml_provider()
        .saml_provider_arn(arn)
        .set_tags(tags)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("TagSAMLProvider", e)),
    }
  }

  async fn untag_resource(&self, target: &TagTarget, keys: &[String]) -> Result<()> {
    let keys = Some(keys.to_vec());
    debug!("untagging {target}");
    match target {
      TagTarget::Role(name) => self
        .client
        .untag_role()
        .role_name(name)
        .set_tag_keys(keys)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("UntagRole", e)),
      TagTarget::User(name) => self
        .client
        .untag_user()
        .user_name(name)
        .set_tag_keys(keys)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("UntagUser", e)),
      TagTarget::Policy(arn) => self
        .client
        .untag_policy()
        .policy_arn(arn)
        .set_tag_keys(keys)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("UntagPolicy", e)),
      TagTarget::InstanceProfile(name) => self
        .client
        .untag_instance_profile()
        .instance_profile_name(name)
        .set_tag_keys(keys)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("UntagInstanceProfile", e)),
      TagTarget::OpenIdConnectProvider(arn) => self
        .client
        .untag_open_id_connect_provider()
        .open_id_connect_provider_arn(arn)
        .set_tag_keys(keys)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("UntagOpenIDConnectProvider", e)),
      TagTarget::SamlProvider(arn) => self
        .client
        .untag_saml_provider()
        .saml_provider_arn(arn)
        .set_tag_keys(keys)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| api_error("UntagSAMLProvider", e)),
    }
  }

  async fn create_policy(&self, spec: &PolicySpec) -> Result<PolicyOutput> {
    let out = self
      .client
      .create_policy()
      .policy_name(&spec.name)
      .set_path(spec.path.clone())
      .set_description(spec.description.clone())
      .policy_document(&spec.policy_document)
      .set_tags(sdk_tags(&spec.tags)?)
      .send()
      .await
      .map_err(|e| api_error("CreatePolicy", e))?;
    out.policy().map(policy_output).ok_or(Error::MissingOutput {
      operation: "CreatePolicy",
      field: "Policy",
    })
  }

  async fn get_policy(&self, arn: &str) -> Result<Option<PolicyOutput>> {
    let res = self
      .client
      .get_policy()
      .policy_arn(arn)
      .send()
      .await
      .map_err(|e| api_error("GetPolicy", e));
    Ok(not_found_to_none(res)?.and_then(|out| out.policy().map(policy_output)))
  }

  async fn get_policy_version(&self, arn: &str, version_id: &str) -> Result<PolicyVersion> {
    let out = self
      .client
      .get_policy_version()
      .policy_arn(arn)
      .version_id(version_id)
      .send()
      .await
      .map_err(|e| api_error("GetPolicyVersion", e))?;
    out.policy_version().map(policy_version).ok_or(Error::MissingOutput {
      operation: "GetPolicyVersion",
      field: "PolicyVersion",
    })
  }

  async fn list_policy_versions(&self, arn: &str) -> Result<Vec<PolicyVersion>> {
    Ok(paginate!(
      "ListPolicyVersions",
      self.client.list_policy_versions().policy_arn(arn),
      |page| page.versions().iter().map(policy_version)
    ))
  }

  async fn create_policy_version(&self, arn: &str, document: &str, set_as_default: bool) -> Result<PolicyVersion> {
    let out = self
      .client
      .create_policy_version()
      .policy_arn(arn)
      .policy_document(document)
      .set_as_default(set_as_default)
      .send()
      .await
      .map_err(|e| api_error("CreatePolicyVersion", e))?;
    out.policy_version().map(policy_version).ok_or(Error::MissingOutput {
      operation: "CreatePolicyVersion",
      field: "PolicyVersion",
    })
  }

  async fn delete_policy_version(&self, arn: &str, version_id: &str) -> Result<()> {
    self
      .client
      .delete_policy_version()
      .policy_arn(arn)
      .version_id(version_id)
      .send()
      .await
      .map_err(|e| api_error("DeletePolicyVersion", e))?;
    Ok(())
  }

  async fn delete_policy(&self, arn: &str) -> Result<()> {
    self
      .client
      .delete_policy()
      .policy_arn(arn)
      .send()
      .await
      .map_err(|e| api_error("DeletePolicy", e))?;
    Ok(())
  }

  async fn create_group(&self, spec: &GroupSpec) -> Result<GroupOutput> {
    let out = self
      .client
      .create_group()
      .group_name(&spec.name)
      .set_path(spec.path.clone())
      .send()
      .await
      .map_err(|e| api_error("CreateGroup", e))?;
    out.group().map(group_output).ok_or(Error::MissingOutput {
      operation: "CreateGroup",
      field: "Group",
    })
  }

  async fn get_group(&self, name: &str) -> Result<Option<GroupOutput>> {
    // GetGroup also pages through members, the first page carries the group
    let res = self
      .client
      .get_group()
      .group_name(name)
      .send()
      .await
      .map_err(|e| api_error("GetGroup", e));
    Ok(not_found_to_none(res)?.and_then(|out| out.group().map(group_output)))
  }

  async fn update_group(&self, name: &str, new_path: &str) -> Result<()> {
    self
      .client
      .update_group()
      .group_name(name)
      .new_path(new_path)
      .send()
      .await
      .map_err(|e| api_error("UpdateGroup", e))?;
    Ok(())
  }

  async fn delete_group(&self, name: &str) -> Result<()> {
    self
      .client
      .delete_group()
      .group_name(name)
      .send()
      .await
      .map_err(|e| api_error("DeleteGroup", e))?;
    Ok(())
  }

  async fn create_user(&self, spec: &UserSpec) -> Result<UserOutput> {
    let out = self
      .client
      .create_user()
      .user_name(&spec.name)
      .set_path(spec.path.clone())
      .set_permissions_boundary(spec.permissions_boundary.clone())
      .set_tags(sdk_tags(&spec.tags)?)
      .send()
      .await
      .map_err(|e| api_error("CreateUser", e))?;
    out.user().map(user_output).ok_or(Error::MissingOutput {
      operation: "CreateUser",
      field: "User",
    })
  }

  async fn get_user(&self, name: &str) -> Result<Option<UserOutput>> {
    let res = self
      .client
      .get_user()
      .user_name(name)
      .send()
      .await
      .map_err(|e| api_error("GetUser", e));
    Ok(not_found_to_none(res)?.and_then(|out| out.user().map(user_output)))
  }

  async fn update_user(&self, name: &str, new_path: &str) -> Result<()> {
    self
      .client
      .update_user()
      .user_name(name)
      .new_path(new_path)
      .send()
      .await
      .map_err(|e| api_error("UpdateUser", e))?;
    Ok(())
  }

  async fn delete_user(&self, name: &str) -> Result<()> {
    self
      .client
      .delete_user()
      .user_name(name)
      .send()
      .await
      .map_err(|e| api_error("DeleteUser", e))?;
    Ok(())
  }

  async fn create_instance_profile(&self, spec: &InstanceProfileSpec) -> Result<InstanceProfileOutput> {
    let out = self
      .client
      .create_instance_profile()
      .instance_profile_name(&spec.name)
      .set_path(spec.path.clone())
      .set_tags(sdk_tags(&spec.tags)?)
      .send()
      .await
      .map_err(|e| api_error("CreateInstanceProfile", e))?;
    out.instance_profile().map(instance_profile_output).ok_or(Error::MissingOutput {
      operation: "CreateInstanceProfile",
      field: "InstanceProfile",
    })
  }

  async fn get_instance_profile(&self, name: &str) -> Result<Option<InstanceProfileOutput>> {
    let res = self
      .client
      .get_instance_profile()
      .instance_profile_name(name)
      .send()
      .await
      .map_err(|e| api_error("GetInstanceProfile", e));
    Ok(not_found_to_none(res)?.and_then(|out| out.instance_profile().map(instance_profile_output)))
  }

  async fn add_role_to_instance_profile(&self, profile: &str, role: &str) -> Result<()> {
    self
      .client
      .add_role_to_instance_profile()
      .instance_profile_name(profile)
      .role_name(role)
      .send()
      .await
      .map_err(|e| api_error("AddRoleToInstanceProfile", e))?;
    Ok(())
  }

  async fn remove_role_from_instance_profile(&self, profile: &str, role: &str) -> Result<()> {
    self
      .client
      .remove_role_from_instance_profile()
      .instance_profile_name(profile)
      .role_name(role)
      .send()
      .await
      .map_err(|e| api_error("RemoveRoleFromInstanceProfile", e))?;
    Ok(())
  }

  async fn delete_instance_profile(&self, name: &str) -> Result<()> {
    self
      .client
      .delete_instance_profile()
      .instance_profile_name(name)
      .send()
      .await
      .map_err(|e| api_error("DeleteInstanceProfile", e))?;
    Ok(())
  }

  async fn create_open_id_connect_provider(&self, spec: &OpenIDConnectProviderSpec) -> Result<String> {
    let out = self
      .client
      .create_open_id_connect_provider()
      .url(&spec.url)
      .set_client_id_list(Some(spec.client_ids.clone()))
      .set_thumbprint_list(Some(spec.thumbprints.clone()))
      .set_tags(sdk_tags(&spec.tags)?)
      .send()
      .await
      .map_err(|e| api_error("CreateOpenIDConnectProvider", e))?;
    out
      .open_id_connect_provider_arn()
      .map(str::to_owned)
      .ok_or(Error::MissingOutput {
        operation: "CreateOpenIDConnectProvider",
        field: "OpenIDConnectProviderArn",
      })
  }

  async fn get_open_id_connect_provider(&self, arn: &str) -> Result<Option<OpenIdConnectProviderOutput>> {
    let res = self
      .client
      .get_open_id_connect_provider()
      .open_id_connect_provider_arn(arn)
      .send()
      .await
      .map_err(|e| api_error("GetOpenIDConnectProvider", e));
    Ok(not_found_to_none(res)?.map(|out| OpenIdConnectProviderOutput {
      url: out.url().map(str::to_owned),
      client_ids: out.client_id_list().to_vec(),
      thumbprints: out.thumbprint_list().to_vec(),
      create_date: out.create_date().and_then(to_chrono),
    }))
  }

  async fn update_open_id_connect_provider_thumbprints(&self, arn: &str, thumbprints: &[String]) -> Result<()> {
    self
      .client
      .update_open_id_connect_provider_thumbprint()
      .open_id_connect_provider_arn(arn)
      .set_thumbprint_list(Some(thumbprints.to_vec()))
      .send()
      .await
      .map_err(|e| api_error("UpdateOpenIDConnectProviderThumbprint", e))?;
    Ok(())
  }

  async fn add_client_id_to_open_id_connect_provider(&self, arn: &str, client_id: &str) -> Result<()> {
    self
      .client
      .add_client_id_to_open_id_connect_provider()
      .open_id_connect_provider_arn(arn)
      .client_id(client_id)
      .send()
      .await
      .map_err(|e| api_error("AddClientIDToOpenIDConnectProvider", e))?;
    Ok(())
  }

  async fn remove_client_id_from_open_id_connect_provider(&self, arn: &str, client_id: &str) -> Result<()> {
    self
      .client
      .remove_client_id_from_open_id_connect_provider()
      .open_id_connect_provider_arn(arn)
      .client_id(client_id)
      .send()
      .await
      .map_err(|e| api_error("RemoveClientIDFromOpenIDConnectProvider", e))?;
    Ok(())
  }

  async fn delete_open_id_connect_provider(&self, arn: &str) -> Result<()> {
    self
      .client
      .delete_open_id_connect_provider()
      .open_id_connect_provider_arn(arn)
      .send()
      .await
      .map_err(|e| api_error("DeleteOpenIDConnectProvider", e))?;
    Ok(())
  }

  async fn create_saml_provider(&self, spec: &SAMLProviderSpec) -> Result<String> {
    let out = self
      .client
      .create_saml_provider()
      .name(&spec.name)
      .saml_metadata_document(&spec.saml_metadata_document)
      .set_tags(sdk_tags(&spec.tags)?)
      .send()
      .await
      .map_err(|e| api_error("CreateSAMLProvider", e))?;
    out.saml_provider_arn().map(str::to_owned).ok_or(Error::MissingOutput {
      operation: "CreateSAMLProvider",
      field: "SAMLProviderArn",
    })
  }

  async fn get_saml_provider(&self, arn: &str) -> Result<Option<SamlProviderOutput>> {
    let res = self
      .client
      .get_saml_provider()
      .saml_provider_arn(arn)
      .send()
      .await
      .map_err(|e| api_error("GetSAMLProvider", e));
    Ok(not_found_to_none(res)?.map(|out| SamlProviderOutput {
      saml_metadata_document: out.saml_metadata_document().map(str::to_owned),
      create_date: out.create_date().and_then(to_chrono),
      valid_until: out.valid_until().and_then(to_chrono),
    }))
  }

  async fn update_saml_provider(&self, arn: &str, saml_metadata_document: &str) -> Result<()> {
    self
      .client
      .update_saml_provider()
      .saml_provider_arn(arn)
      .saml_metadata_document(saml_metadata_document)
      .send()
      .await
      .map_err(|e| api_error("UpdateSAMLProvider", e))?;
    Ok(())
  }

  async fn delete_saml_provider(&self, arn: &str) -> Result<()> {
    self
      .client
      .delete_saml_provider()
      .saml_provider_arn(arn)
      .send()
      .await
      .map_err(|e| api_error("DeleteSAMLProvider", e))?;
    Ok(())
  }

  async fn create_service_linked_role(&self, spec: &ServiceLinkedRoleSpec) -> Result<RoleOutput> {
    let out = self
      .client
      .create_service_linked_role()
      .aws_service_name(&spec.aws_service_name)
      .set_custom_suffix(spec.custom_suffix.clone())
      .set_description(spec.description.clone())
      .send()
      .await
      .map_err(|e| api_error("CreateServiceLinkedRole", e))?;
    out.role().map(role_output).ok_or(Error::MissingOutput {
      operation: "CreateServiceLinkedRole",
      field: "Role",
    })
  }

  async fn delete_service_linked_role(&self, role_name: &str) -> Result<String> {
    let out = self
      .client
      .delete_service_linked_role()
      .role_name(role_name)
      .send()
      .await
      .map_err(|e| api_error("DeleteServiceLinkedRole", e))?;
    Ok(out.deletion_task_id().to_owned())
  }
}
