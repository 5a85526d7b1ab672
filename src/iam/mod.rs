//! The IAM API surface the controller consumes
//!
//! Hooks and resource managers only ever see [`IamApi`]. The production
//! implementation wraps `aws_sdk_iam::Client` (see [`sdk`]); tests use the
//! mockall generated `MockIamApi`.

mod sdk;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[cfg(test)]
use mockall::automock;

use crate::crd::{
  GroupSpec, InstanceProfileSpec, OpenIDConnectProviderSpec, PolicySpec, RoleLastUsed, RoleSpec, SAMLProviderSpec,
  ServiceLinkedRoleSpec, Tag, UserSpec,
};
use crate::Result;

pub use sdk::SdkIam;

/// An IAM identity that managed and inline policies can be attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
  Role(String),
  User(String),
  Group(String),
}

impl Principal {
  pub fn name(&self) -> &str {
    match self {
      Self::Role(name) | Self::User(name) | Self::Group(name) => name,
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Self::Role(_) => "role",
      Self::User(_) => "user",
      Self::Group(_) => "group",
    }
  }
}

impl fmt::Display for Principal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.kind(), self.name())
  }
}

/// A taggable IAM entity. Roles, users and instance profiles are addressed by
/// name, everything else by ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagTarget {
  Role(String),
  User(String),
  Policy(String),
  InstanceProfile(String),
  OpenIdConnectProvider(String),
  SamlProvider(String),
}

impl fmt::Display for TagTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Role(id) => write!(f, "role {id}"),
      Self::User(id) => write!(f, "user {id}"),
      Self::Policy(id) => write!(f, "policy {id}"),
      Self::InstanceProfile(id) => write!(f, "instance profile {id}"),
      Self::OpenIdConnectProvider(id) => write!(f, "OIDC provider {id}"),
      Self::SamlProvider(id) => write!(f, "SAML provider {id}"),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleOutput {
  pub arn: String,
  pub role_id: String,
  pub role_name: String,
  pub path: String,
  pub description: Option<String>,
  pub max_session_duration: Option<i32>,
  /// URL-encoded as returned by IAM
  pub assume_role_policy_document: Option<String>,
  pub permissions_boundary: Option<String>,
  pub create_date: Option<DateTime<Utc>>,
  pub last_used: Option<RoleLastUsed>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyOutput {
  pub arn: String,
  pub policy_id: Option<String>,
  pub policy_name: Option<String>,
  pub path: Option<String>,
  pub description: Option<String>,
  pub default_version_id: Option<String>,
  pub attachment_count: Option<i32>,
  pub permissions_boundary_usage_count: Option<i32>,
  pub is_attachable: bool,
  pub create_date: Option<DateTime<Utc>>,
  pub update_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyVersion {
  pub version_id: String,
  /// Only populated by `get_policy_version`, URL-encoded
  pub document: Option<String>,
  pub is_default: bool,
  pub create_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupOutput {
  pub arn: String,
  pub group_id: String,
  pub group_name: String,
  pub path: String,
  pub create_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserOutput {
  pub arn: String,
  pub user_id: String,
  pub user_name: String,
  pub path: String,
  pub permissions_boundary: Option<String>,
  pub create_date: Option<DateTime<Utc>>,
  pub password_last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceProfileOutput {
  pub arn: String,
  pub instance_profile_id: String,
  pub instance_profile_name: String,
  pub path: String,
  pub role_names: Vec<String>,
  pub create_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenIdConnectProviderOutput {
  pub url: Option<String>,
  pub client_ids: Vec<String>,
  pub thumbprints: Vec<String>,
  pub create_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamlProviderOutput {
  pub saml_metadata_document: Option<String>,
  pub create_date: Option<DateTime<Utc>>,
  pub valid_until: Option<DateTime<Utc>>,
}

/// Read operations return `Ok(None)` when IAM answers `NoSuchEntity`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IamApi: Send + Sync {
  // roles
  async fn create_role(&self, spec: &RoleSpec) -> Result<RoleOutput>;
  async fn get_role(&self, name: &str) -> Result<Option<RoleOutput>>;
  async fn update_role(&self, name: &str, description: Option<String>, max_session_duration: Option<i32>) -> Result<()>;
  async fn update_assume_role_policy(&self, name: &str, document: &str) -> Result<()>;
  async fn delete_role(&self, name: &str) -> Result<()>;

  // permissions boundaries, roles and users only
  async fn put_permissions_boundary(&self, principal: &Principal, policy_arn: &str) -> Result<()>;
  async fn delete_permissions_boundary(&self, principal: &Principal) -> Result<()>;

  // managed policies
  async fn list_attached_policies(&self, principal: &Principal) -> Result<Vec<String>>;
  async fn attach_policy(&self, principal: &Principal, policy_arn: &str) -> Result<()>;
  async fn detach_policy(&self, principal: &Principal, policy_arn: &str) -> Result<()>;

  // inline policies
  async fn list_inline_policy_names(&self, principal: &Principal) -> Result<Vec<String>>;
  /// Returns the URL-encoded document
  async fn get_inline_policy(&self, principal: &Principal, policy_name: &str) -> Result<String>;
  async fn put_inline_policy(&self, principal: &Principal, policy_name: &str, document: &str) -> Result<()>;
  async fn delete_inline_policy(&self, principal: &Principal, policy_name: &str) -> Result<()>;

  // tags
  async fn list_tags(&self, target: &TagTarget) -> Result<Vec<Tag>>;
  async fn tag_resource(&self, target: &TagTarget, tags: &[Tag]) -> Result<()>;
  async fn untag_resource(&self, target: &TagTarget, keys: &[String]) -> Result<()>;

  // customer managed policies
  async fn create_policy(&self, spec: &PolicySpec) -> Result<PolicyOutput>;
  async fn get_policy(&self, arn: &str) -> Result<Option<PolicyOutput>>;
  async fn get_policy_version(&self, arn: &str, version_id: &str) -> Result<PolicyVersion>;
  async fn list_policy_versions(&self, arn: &str) -> Result<Vec<PolicyVersion>>;
  async fn create_policy_version(&self, arn: &str, document: &str, set_as_default: bool) -> Result<PolicyVersion>;
  async fn delete_policy_version(&self, arn: &str, version_id: &str) -> Result<()>;
  async fn delete_policy(&self, arn: &str) -> Result<()>;

  // groups
  async fn create_group(&self, spec: &GroupSpec) -> Result<GroupOutput>;
  async fn get_group(&self, name: &str) -> Result<Option<GroupOutput>>;
  async fn update_group(&self, name: &str, new_path: &str) -> Result<()>;
  async fn delete_group(&self, name: &str) -> Result<()>;

  // users
  async fn create_user(&self, spec: &UserSpec) -> Result<UserOutput>;
  async fn get_user(&self, name: &str) -> Result<Option<UserOutput>>;
  async fn update_user(&self, name: &str, new_path: &str) -> Result<()>;
  async fn delete_user(&self, name: &str) -> Result<()>;

  // instance profiles
  async fn create_instance_profile(&self, spec: &InstanceProfileSpec) -> Result<InstanceProfileOutput>;
  async fn get_instance_profile(&self, name: &str) -> Result<Option<InstanceProfileOutput>>;
  async fn add_role_to_instance_profile(&self, profile: &str, role: &str) -> Result<()>;
  async fn remove_role_from_instance_profile(&self, profile: &str, role: &str) -> Result<()>;
  async fn delete_instance_profile(&self, name: &str) -> Result<()>;

  // OIDC providers
  /// Returns the ARN of the new provider
  async fn create_open_id_connect_provider(&self, spec: &OpenIDConnectProviderSpec) -> Result<String>;
  async fn get_open_id_connect_provider(&self, arn: &str) -> Result<Option<OpenIdConnectProviderOutput>>;
  async fn update_open_id_connect_provider_thumbprints(&self, arn: &str, thumbprints: &[String]) -> Result<()>;
  async fn add_client_id_to_open_id_connect_provider(&self, arn: &str, client_id: &str) -> Result<()>;
  async fn remove_client_id_from_open_id_connect_provider(&self, arn: &str, client_id: &str) -> Result<()>;
  async fn delete_open_id_connect_provider(&self, arn: &str) -> Result<()>;

  // SAML providers
  /// Returns the ARN of the new provider
  async fn create_saml_provider(&self, spec: &SAMLProviderSpec) -> Result<String>;
  async fn get_saml_provider(&self, arn: &str) -> Result<Option<SamlProviderOutput>>;
  async fn update_saml_provider(&self, arn: &str, saml_metadata_document: &str) -> Result<()>;
  async fn delete_saml_provider(&self, arn: &str) -> Result<()>;

  // service linked roles
  async fn create_service_linked_role(&self, spec: &ServiceLinkedRoleSpec) -> Result<RoleOutput>;
  /// Returns the deletion task id
  async fn delete_service_linked_role(&self, role_name: &str) -> Result<String>;
}
