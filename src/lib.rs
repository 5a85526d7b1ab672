//! Kubernetes controller for AWS IAM entities
//!
//! Custom resources in the `iam.services.k8s.aws` group describe roles,
//! policies, groups, users, instance profiles, OIDC and SAML providers and
//! service linked roles. The reconciler converges IAM towards them.

pub mod config;
pub mod crd;
mod error;
pub mod finalizer;
pub mod iam;
pub mod policies;
pub mod policy_document;
pub mod reconciler;
pub mod references;
pub mod resource;
pub mod tags;

pub use error::{Error, Result};
