use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use super::{same_set, Delta, ResourceManager};
use crate::crd::{AckResource, OpenIDConnectProvider, ResourceMetadata};
use crate::iam::{IamApi, TagTarget};
use crate::{tags, Result};

pub struct OpenIdConnectProviderManager {
  iam: Arc<dyn IamApi>,
}

impl OpenIdConnectProviderManager {
  pub fn new(iam: Arc<dyn IamApi>) -> Self {
    Self { iam }
  }

  async fn sync_client_ids(&self, arn: &str, desired: &[String], latest: &[String]) -> Result<()> {
    let desired: BTreeSet<&str> = desired.iter().map(String::as_str).collect();
    let latest: BTreeSet<&str> = latest.iter().map(String::as_str).collect();
    for client_id in desired.difference(&latest) {
      debug!("adding client id {client_id} to {arn}");
      self.iam.add_client_id_to_open_id_connect_provider(arn, client_id).await?;
    }
    for client_id in latest.difference(&desired) {
      debug!("removing client id {client_id} from {arn}");
      self
        .iam
        .remove_client_id_from_open_id_connect_provider(arn, client_id)
        .await?;
    }
    Ok(())
  }
}

/// IAM reports the issuer without its scheme
fn issuer(url: &str) -> &str {
  url.strip_prefix("https://").unwrap_or(url).trim_end_matches('/')
}

#[async_trait]
impl ResourceManager for OpenIdConnectProviderManager {
  type Resource = OpenIDConnectProvider;

  fn delta(&self, desired: &OpenIDConnectProvider, latest: &OpenIDConnectProvider) -> Delta {
    let (a, b) = (&desired.spec, &latest.spec);
    let mut delta = Delta::new();
    delta.add_if(issuer(&a.url) != issuer(&b.url), "Spec.URL");
    delta.add_if(!same_set(&a.client_ids, &b.client_ids), "Spec.ClientIDs");
    delta.add_if(!same_set(&a.thumbprints, &b.thumbprints), "Spec.Thumbprints");
    delta.add_if(!tags::equal_tags(&a.tags, &b.tags), "Spec.Tags");
    delta
  }

  async fn read_one(&self, desired: &OpenIDConnectProvider) -> Result<Option<OpenIDConnectProvider>> {
    let Some(arn) = desired.arn() else {
      return Ok(None);
    };
    let Some(out) = self.iam.get_open_id_connect_provider(arn).await? else {
      return Ok(None);
    };

    let mut latest = desired.clone();
    if let Some(url) = out.url {
      latest.spec.url = url;
    }
    latest.spec.client_ids = out.client_ids;
    latest.spec.thumbprints = out.thumbprints;
    latest.spec.tags = tags::list_tags(
      self.iam.as_ref(),
      &TagTarget::OpenIdConnectProvider(arn.to_string()),
    )
    .await?;
    Ok(Some(latest))
  }

  async fn create(&self, desired: &OpenIDConnectProvider) -> Result<OpenIDConnectProvider> {
    let arn = self.iam.create_open_id_connect_provider(&desired.spec).await?;
    info!("created OIDC provider {arn}");
    let mut created = desired.clone();
    *created.resource_metadata_mut() = ResourceMetadata::with_arn(arn);
    Ok(created)
  }

  async fn update(
    &self,
    desired: &OpenIDConnectProvider,
    latest: &OpenIDConnectProvider,
    delta: &Delta,
  ) -> Result<OpenIDConnectProvider> {
    delta.check_immutable(&["Spec.URL"])?;

    let mut updated = desired.clone();
    updated.copy_status_from(latest);
    let Some(arn) = latest.arn() else {
      return Ok(updated);
    };

    if delta.differs_at("Spec.Thumbprints") {
      self
        .iam
        .update_open_id_connect_provider_thumbprints(arn, &desired.spec.thumbprints)
        .await?;
    }
    if delta.differs_at("Spec.ClientIDs") {
      self
        .sync_client_ids(arn, &desired.spec.client_ids, &latest.spec.client_ids)
        .await?;
    }
    if delta.differs_at("Spec.Tags") {
      tags::sync_tags(
        self.iam.as_ref(),
        &TagTarget::OpenIdConnectProvider(arn.to_string()),
        &desired.spec.tags,
        &latest.spec.tags,
      )
      .await?;
    }
    info!("updated OIDC provider {arn}: {:?}", delta.paths().collect::<Vec<_>>());
    Ok(updated)
  }

  async fn delete(&self, latest: &OpenIDConnectProvider) -> Result<()> {
    if let Some(arn) = latest.arn() {
      self.iam.delete_open_id_connect_provider(arn).await?;
      info!("deleted OIDC provider {arn}");
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use mockall::predicate::eq;

  use super::*;
  use crate::crd::OpenIDConnectProviderSpec;
  use crate::iam::{MockIamApi, OpenIdConnectProviderOutput};

  const ARN: &str = "arn:aws:iam::123456789012:oidc-provider/token.actions.githubusercontent.com";

  fn provider(client_ids: &[&str], thumbprints: &[&str]) -> OpenIDConnectProvider {
    let mut provider = OpenIDConnectProvider::new(
      "github",
      OpenIDConnectProviderSpec {
        url: "https://token.actions.githubusercontent.com".into(),
        client_ids: client_ids.iter().map(|s| s.to_string()).collect(),
        thumbprints: thumbprints.iter().map(|s| s.to_string()).collect(),
        tags: vec![],
      },
    );
    *provider.resource_metadata_mut() = ResourceMetadata::with_arn(ARN);
    provider
  }

  #[tokio::test]
  async fn read_one_ignores_missing_scheme() {
    let mut api = MockIamApi::new();
    api
      .expect_get_open_id_connect_provider()
      .with(eq(ARN))
      .returning(|_| {
        Ok(Some(OpenIdConnectProviderOutput {
          url: Some("token.actions.githubusercontent.com".into()),
          client_ids: vec!["sts.amazonaws.com".into()],
          thumbprints: vec!["abc".into()],
          create_date: None,
        }))
      });
    api.expect_list_tags().returning(|_| Ok(vec![]));
    let manager = OpenIdConnectProviderManager::new(Arc::new(api));

    let desired = provider(&["sts.amazonaws.com"], &["abc"]);
    let latest = manager.read_one(&desired).await.unwrap().unwrap();
    assert!(manager.delta(&desired, &latest).is_empty());
  }

  #[tokio::test]
  async fn client_ids_are_diffed_and_thumbprints_replaced() {
    let mut api = MockIamApi::new();
    api
      .expect_update_open_id_connect_provider_thumbprints()
      .withf(|arn, thumbprints| arn == ARN && thumbprints == ["def".to_string()])
      .times(1)
      .returning(|_, _| Ok(()));
    api
      .expect_add_client_id_to_open_id_connect_provider()
      .with(eq(ARN), eq("new-audience"))
      .times(1)
      .returning(|_, _| Ok(()));
    api
      .expect_remove_client_id_from_open_id_connect_provider()
      .with(eq(ARN), eq("old-audience"))
      .times(1)
      .returning(|_, _| Ok(()));
    let manager = OpenIdConnectProviderManager::new(Arc::new(api));

    let latest = provider(&["sts.amazonaws.com", "old-audience"], &["abc"]);
    let desired = provider(&["sts.amazonaws.com", "new-audience"], &["def"]);
    let delta = manager.delta(&desired, &latest);
    manager.update(&desired, &latest, &delta).await.unwrap();
  }

  #[tokio::test]
  async fn url_is_immutable() {
    let manager = OpenIdConnectProviderManager::new(Arc::new(MockIamApi::new()));
    let latest = provider(&[], &[]);
    let mut desired = latest.clone();
    desired.spec.url = "https://oidc.eks.eu-west-1.amazonaws.com/id/EXAMPLE".into();

    let delta = manager.delta(&desired, &latest);
    assert!(manager.update(&desired, &latest, &delta).await.unwrap_err().is_terminal());
  }
}
