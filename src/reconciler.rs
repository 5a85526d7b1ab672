//! Drives a [`ResourceManager`] from a `kube::runtime::Controller`
//!
//! One pass resolves references, reads the IAM entity, then creates it or
//! pushes the delta. The outcome lands in the ACK conditions of the status
//! subresource; `.spec` is never written.

use std::{sync::Arc, time::Duration};

use futures_util::StreamExt;
use kube::{
  api::{Api, Patch, PatchParams},
  runtime::{
    controller::{self, Action, Controller},
    finalizer::{finalizer, Event},
    watcher,
  },
  Client, Resource, ResourceExt,
};
use log::{debug, error, info, warn};

use crate::crd::{remove_condition, set_condition, AckResource, ConditionStatus, ConditionType};
use crate::finalizer::finalizer_name;
use crate::references::{ReferenceReader, Resolved};
use crate::resource::ResourceManager;
use crate::{Error, Result};

pub struct Context<M> {
  pub client: Client,
  pub manager: M,
  pub references: Arc<dyn ReferenceReader>,
  /// Requeue interval after a successful sync
  pub resync_period: Duration,
  /// Requeue interval after a recoverable error
  pub error_requeue: Duration,
  /// Recorded in `status.ackResourceMetadata.region`
  pub region: Option<String>,
}

/// Result of one successful pass
#[derive(Debug)]
pub struct Synced<K> {
  pub resource: K,
  pub referenced: bool,
  pub created: bool,
}

/// Converge IAM towards `obj` and return the observed state
pub async fn sync<M: ResourceManager>(
  manager: &M,
  reader: &dyn ReferenceReader,
  obj: &M::Resource,
) -> Result<Synced<M::Resource>> {
  let Resolved {
    resource: mut desired,
    referenced,
  } = manager.resolve_references(reader, obj).await?;

  let Some(latest) = manager.read_one(&desired).await? else {
    let created = manager.create(&desired).await?;
    return Ok(Synced {
      resource: created,
      referenced,
      created: true,
    });
  };

  manager.late_initialize(&mut desired, &latest);
  let delta = manager.delta(&desired, &latest);
  let resource = if delta.is_empty() {
    debug!("{} is in sync", obj.name_any());
    latest
  } else {
    manager.update(&desired, &latest, &delta).await?
  };
  Ok(Synced {
    resource,
    referenced,
    created: false,
  })
}

/// Delete the IAM entity backing `obj`, if it still exists
pub async fn remove<M: ResourceManager>(manager: &M, obj: &M::Resource) -> Result<()> {
  match manager.read_one(obj).await? {
    Some(latest) => manager.delete(&latest).await,
    None => {
      debug!("{} is already gone from IAM", obj.name_any());
      Ok(())
    }
  }
}

fn is_reference_error(err: &Error) -> bool {
  matches!(
    err,
    Error::ReferenceAndIdConflict { .. }
      | Error::EmptyReference(_)
      | Error::ReferenceNotFound { .. }
      | Error::ReferenceNotSynced { .. }
      | Error::ReferenceTerminal { .. }
      | Error::ReferenceMissingTargetField { .. }
  )
}

pub(crate) fn mark_synced<K: AckResource>(obj: &mut K, referenced: bool) {
  let conditions = obj.conditions_mut();
  if referenced {
    set_condition(
      conditions,
      ConditionType::ReferencesResolved,
      ConditionStatus::True,
      None,
      None,
    );
  } else {
    remove_condition(conditions, ConditionType::ReferencesResolved);
  }
  remove_condition(conditions, ConditionType::Terminal);
  remove_condition(conditions, ConditionType::Recoverable);
  set_condition(conditions, ConditionType::ResourceSynced, ConditionStatus::True, None, None);
}

pub(crate) fn mark_failed<K: AckResource>(obj: &mut K, err: &Error) {
  let conditions = obj.conditions_mut();
  let message = Some(err.to_string());
  if is_reference_error(err) {
    set_condition(
      conditions,
      ConditionType::ReferencesResolved,
      ConditionStatus::False,
      message.clone(),
      None,
    );
  }
  if err.is_terminal() {
    remove_condition(conditions, ConditionType::Recoverable);
    set_condition(conditions, ConditionType::Terminal, ConditionStatus::True, message, None);
  } else {
    remove_condition(conditions, ConditionType::Terminal);
    set_condition(
      conditions,
      ConditionType::Recoverable,
      ConditionStatus::True,
      message,
      err.aws_code().map(str::to_owned),
    );
  }
  set_condition(conditions, ConditionType::ResourceSynced, ConditionStatus::False, None, None);
}

async fn patch_status<K: AckResource>(api: &Api<K>, obj: &K) -> Result<()> {
  let patch = obj.status_patch()?;
  api
    .patch_status(&obj.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
    .await?;
  Ok(())
}

async fn apply<M: ResourceManager>(api: &Api<M::Resource>, obj: Arc<M::Resource>, ctx: &Context<M>) -> Result<Action> {
  let mut observed = (*obj).clone();
  match sync(&ctx.manager, ctx.references.as_ref(), obj.as_ref()).await {
    Ok(synced) => {
      if synced.created {
        info!("created {} for {}", M::Resource::kind(&()), obj.name_any());
      }
      observed.copy_status_from(&synced.resource);
      if observed.arn().is_some() && ctx.region.is_some() {
        observed.resource_metadata_mut().region = ctx.region.clone();
      }
      mark_synced(&mut observed, synced.referenced);
      patch_status(api, &observed).await?;
      Ok(Action::requeue(ctx.resync_period))
    }
    Err(err) if err.is_terminal() => {
      warn!("{} {} needs attention: {err}", M::Resource::kind(&()), obj.name_any());
      mark_failed(&mut observed, &err);
      patch_status(api, &observed).await?;
      Ok(Action::await_change())
    }
    Err(err) => {
      mark_failed(&mut observed, &err);
      if let Err(patch_err) = patch_status(api, &observed).await {
        warn!("failed to record error on {}: {patch_err}", obj.name_any());
      }
      Err(err)
    }
  }
}

async fn cleanup<M: ResourceManager>(obj: Arc<M::Resource>, ctx: &Context<M>) -> Result<Action> {
  remove(&ctx.manager, obj.as_ref()).await?;
  info!("cleaned up {} {}", M::Resource::kind(&()), obj.name_any());
  Ok(Action::await_change())
}

pub async fn reconcile<M: ResourceManager>(obj: Arc<M::Resource>, ctx: Arc<Context<M>>) -> Result<Action> {
  let namespace = obj
    .namespace()
    .ok_or_else(|| Error::MissingNamespace(obj.name_any()))?;
  let api = Api::<M::Resource>::namespaced(ctx.client.clone(), &namespace);
  debug!("reconciling {} {namespace}/{}", M::Resource::kind(&()), obj.name_any());

  Ok(
    finalizer(&api, &finalizer_name::<M::Resource>(), obj, |event| async {
      match event {
        Event::Apply(obj) => apply::<M>(&api, obj, &ctx).await,
        Event::Cleanup(obj) => cleanup::<M>(obj, &ctx).await,
      }
    })
    .await?,
  )
}

pub fn error_policy<M: ResourceManager>(obj: Arc<M::Resource>, err: &Error, ctx: Arc<Context<M>>) -> Action {
  warn!("reconcile of {} failed: {err}", obj.name_any());
  Action::requeue(ctx.error_requeue)
}

/// Run a controller for the manager's kind until shutdown
pub async fn run<M: ResourceManager>(ctx: Arc<Context<M>>, watch_namespace: Option<String>) {
  let api = match &watch_namespace {
    Some(namespace) => Api::<M::Resource>::namespaced(ctx.client.clone(), namespace),
    None => Api::<M::Resource>::all(ctx.client.clone()),
  };
  info!("starting {} controller", M::Resource::kind(&()));

  Controller::new(api, watcher::Config::default())
    .shutdown_on_signal()
    .run(reconcile::<M>, error_policy::<M>, ctx)
    .for_each(|res| async move {
      match res {
        Ok((obj, _)) => {
          debug!("reconciled {obj}");
        }
        Err(controller::Error::ObjectNotFound(obj)) => {
          info!("object not found: {obj}");
        }
        Err(e) => {
          error!("reconcile failed: {e}");
        }
      }
    })
    .await;
}

#[cfg(test)]
mod tests {
  use mockall::predicate::eq;

  use super::*;
  use crate::crd::{condition_is_true, ResourceMetadata, Role, RoleSpec, Tag};
  use crate::iam::{MockIamApi, RoleOutput, TagTarget};
  use crate::references::MockReferenceReader;
  use crate::resource::RoleManager;

  const TRUST: &str = r#"{"Version":"2012-10-17","Statement":[]}"#;
  const ARN: &str = "arn:aws:iam::123456789012:role/app";

  fn role() -> Role {
    let mut role = Role::new(
      "app",
      RoleSpec {
        name: "app".into(),
        path: Some("/".into()),
        assume_role_policy_document: TRUST.into(),
        max_session_duration: Some(3600),
        tags: vec![Tag::new("team", "a")],
        ..Default::default()
      },
    );
    role.metadata.namespace = Some("default".into());
    role
  }

  fn output() -> RoleOutput {
    RoleOutput {
      arn: ARN.into(),
      role_id: "AROAEXAMPLE".into(),
      role_name: "app".into(),
      path: "/".into(),
      max_session_duration: Some(3600),
      assume_role_policy_document: Some(urlencoding::encode(TRUST).into_owned()),
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn missing_role_is_created() {
    let mut api = MockIamApi::new();
    api.expect_get_role().returning(|_| Ok(None));
    api.expect_create_role().times(1).returning(|_| Ok(output()));
    let manager = RoleManager::new(Arc::new(api));

    let synced = sync(&manager, &MockReferenceReader::new(), &role()).await.unwrap();
    assert!(synced.created);
    assert!(!synced.referenced);
    assert_eq!(synced.resource.arn(), Some(ARN));
  }

  #[tokio::test]
  async fn role_in_sync_is_not_updated() {
    let mut api = MockIamApi::new();
    api.expect_get_role().returning(|_| Ok(Some(output())));
    api.expect_list_attached_policies().returning(|_| Ok(vec![]));
    api.expect_list_inline_policy_names().returning(|_| Ok(vec![]));
    api
      .expect_list_tags()
      .with(eq(TagTarget::Role("app".into())))
      .returning(|_| Ok(vec![Tag::new("team", "a")]));
    api.expect_update_role().never();
    api.expect_tag_resource().never();
    let manager = RoleManager::new(Arc::new(api));

    let synced = sync(&manager, &MockReferenceReader::new(), &role()).await.unwrap();
    assert!(!synced.created);
    assert_eq!(synced.resource.arn(), Some(ARN));
  }

  #[tokio::test]
  async fn drifted_tags_are_pushed() {
    let mut api = MockIamApi::new();
    api.expect_get_role().returning(|_| Ok(Some(output())));
    api.expect_list_attached_policies().returning(|_| Ok(vec![]));
    api.expect_list_inline_policy_names().returning(|_| Ok(vec![]));
    api.expect_list_tags().returning(|_| Ok(vec![]));
    api
      .expect_tag_resource()
      .withf(|_, tags| tags == [Tag::new("team", "a")])
      .times(1)
      .returning(|_, _| Ok(()));
    let manager = RoleManager::new(Arc::new(api));

    sync(&manager, &MockReferenceReader::new(), &role()).await.unwrap();
  }

  #[tokio::test]
  async fn remove_skips_missing_entities() {
    let mut api = MockIamApi::new();
    api.expect_get_role().returning(|_| Ok(None));
    api.expect_delete_role().never();
    let manager = RoleManager::new(Arc::new(api));

    remove(&manager, &role()).await.unwrap();
  }

  #[test]
  fn conditions_follow_the_outcome() {
    let mut obj = role();
    *obj.resource_metadata_mut() = ResourceMetadata::with_arn(ARN);

    mark_failed(
      &mut obj,
      &Error::Aws {
        operation: "GetRole",
        code: Some("Throttling".into()),
        message: "slow down".into(),
      },
    );
    assert!(condition_is_true(obj.conditions(), ConditionType::Recoverable));
    assert!(!condition_is_true(obj.conditions(), ConditionType::ResourceSynced));

    mark_failed(&mut obj, &Error::immutable_fields_changed(&["Spec.Name"]));
    assert!(condition_is_true(obj.conditions(), ConditionType::Terminal));
    assert!(!condition_is_true(obj.conditions(), ConditionType::Recoverable));

    mark_synced(&mut obj, true);
    assert!(condition_is_true(obj.conditions(), ConditionType::ResourceSynced));
    assert!(condition_is_true(obj.conditions(), ConditionType::ReferencesResolved));
    assert!(!condition_is_true(obj.conditions(), ConditionType::Terminal));
  }

  #[test]
  fn reference_failures_flag_references() {
    let mut obj = role();
    mark_failed(
      &mut obj,
      &Error::ReferenceNotSynced {
        kind: "Policy",
        namespace: "default".into(),
        name: "boundary".into(),
      },
    );
    let resolved = obj
      .conditions()
      .iter()
      .find(|c| c.type_ == ConditionType::ReferencesResolved)
      .unwrap();
    assert_eq!(resolved.status, ConditionStatus::False);
  }

  #[test]
  fn missing_reference_flags_references() {
    let mut obj = role();
    mark_failed(
      &mut obj,
      &Error::ReferenceNotFound {
        kind: "Role",
        namespace: "default".into(),
        name: "web".into(),
      },
    );
    let resolved = obj
      .conditions()
      .iter()
      .find(|c| c.type_ == ConditionType::ReferencesResolved)
      .unwrap();
    assert_eq!(resolved.status, ConditionStatus::False);
    assert!(condition_is_true(obj.conditions(), ConditionType::Recoverable));
  }
}
