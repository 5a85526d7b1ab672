use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use super::{Delta, ResourceManager};
use crate::crd::{AckResource, ResourceMetadata, SAMLProvider};
use crate::iam::{IamApi, TagTarget};
use crate::{tags, Result};

pub struct SamlProviderManager {
  iam: Arc<dyn IamApi>,
}

impl SamlProviderManager {
  pub fn new(iam: Arc<dyn IamApi>) -> Self {
    Self { iam }
  }
}

/// `arn:aws:iam::123456789012:saml-provider/name`
fn name_from_arn(arn: &str) -> Option<&str> {
  arn.rsplit_once(":saml-provider/").map(|(_, name)| name)
}

#[async_trait]
impl ResourceManager for SamlProviderManager {
  type Resource = SAMLProvider;

  fn delta(&self, desired: &SAMLProvider, latest: &SAMLProvider) -> Delta {
    let (a, b) = (&desired.spec, &latest.spec);
    let mut delta = Delta::new();
    delta.add_if(a.name != b.name, "Spec.Name");
    delta.add_if(
      a.saml_metadata_document.trim() != b.saml_metadata_document.trim(),
      "Spec.SAMLMetadataDocument",
    );
    delta.add_if(!tags::equal_tags(&a.tags, &b.tags), "Spec.Tags");
    delta
  }

  async fn read_one(&self, desired: &SAMLProvider) -> Result<Option<SAMLProvider>> {
    let Some(arn) = desired.arn() else {
      return Ok(None);
    };
    let Some(out) = self.iam.get_saml_provider(arn).await? else {
      return Ok(None);
    };

    let mut latest = desired.clone();
    if let Some(name) = name_from_arn(arn) {
      latest.spec.name = name.to_string();
    }
    if let Some(document) = out.saml_metadata_document {
      latest.spec.saml_metadata_document = document;
    }
    latest.spec.tags = tags::list_tags(self.iam.as_ref(), &TagTarget::SamlProvider(arn.to_string())).await?;
    let status = latest.status.get_or_insert_with(Default::default);
    status.create_date = out.create_date;
    status.valid_until = out.valid_until;
    Ok(Some(latest))
  }

  async fn create(&self, desired: &SAMLProvider) -> Result<SAMLProvider> {
    let arn = self.iam.create_saml_provider(&desired.spec).await?;
    info!("created SAML provider {arn}");
    let mut created = desired.clone();
    *created.resource_metadata_mut() = ResourceMetadata::with_arn(arn);
    Ok(created)
  }

  async fn update(&self, desired: &SAMLProvider, latest: &SAMLProvider, delta: &Delta) -> Result<SAMLProvider> {
    delta.check_immutable(&["Spec.Name"])?;

    let mut updated = desired.clone();
    updated.copy_status_from(latest);
    let Some(arn) = latest.arn() else {
      return Ok(updated);
    };

    if delta.differs_at("Spec.SAMLMetadataDocument") {
      self
        .iam
        .update_saml_provider(arn, &desired.spec.saml_metadata_document)
        .await?;
    }
    if delta.differs_at("Spec.Tags") {
      tags::sync_tags(
        self.iam.as_ref(),
        &TagTarget::SamlProvider(arn.to_string()),
        &desired.spec.tags,
        &latest.spec.tags,
      )
      .await?;
    }
    info!("updated SAML provider {arn}: {:?}", delta.paths().collect::<Vec<_>>());
    Ok(updated)
  }

  async fn delete(&self, latest: &SAMLProvider) -> Result<()> {
    if let Some(arn) = latest.arn() {
      self.iam.delete_saml_provider(arn).await?;
      info!("deleted SAML provider {arn}");
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use mockall::predicate::eq;

  use super::*;
  use crate::crd::{SAMLProviderSpec, Tag};
  use crate::iam::{MockIamApi, SamlProviderOutput};

  const ARN: &str = "arn:aws:iam::123456789012:saml-provider/okta";

  fn provider(document: &str) -> SAMLProvider {
    let mut provider = SAMLProvider::new(
      "okta",
      SAMLProviderSpec {
        name: "okta".into(),
        saml_metadata_document: document.into(),
        tags: vec![Tag::new("idp", "okta")],
      },
    );
    *provider.resource_metadata_mut() = ResourceMetadata::with_arn(ARN);
    provider
  }

  #[test]
  fn name_is_parsed_from_arn() {
    assert_eq!(name_from_arn(ARN), Some("okta"));
    assert_eq!(name_from_arn("arn:aws:iam::123456789012:role/okta"), None);
  }

  #[tokio::test]
  async fn read_one_reports_validity() {
    let mut api = MockIamApi::new();
    api.expect_get_saml_provider().with(eq(ARN)).returning(|_| {
      Ok(Some(SamlProviderOutput {
        saml_metadata_document: Some("<md/>".into()),
        create_date: None,
        valid_until: chrono::DateTime::<chrono::Utc>::from_timestamp(1_900_000_000, 0),
      }))
    });
    api
      .expect_list_tags()
      .returning(|_| Ok(vec![Tag::new("idp", "okta")]));
    let manager = SamlProviderManager::new(Arc::new(api));

    let desired = provider("<md/>\n");
    let latest = manager.read_one(&desired).await.unwrap().unwrap();
    assert!(latest.status.as_ref().unwrap().valid_until.is_some());
    assert!(manager.delta(&desired, &latest).is_empty());
  }

  #[tokio::test]
  async fn metadata_change_updates_provider() {
    let mut api = MockIamApi::new();
    api
      .expect_update_saml_provider()
      .with(eq(ARN), eq("<md v=\"2\"/>"))
      .times(1)
      .returning(|_, _| Ok(()));
    let manager = SamlProviderManager::new(Arc::new(api));

    let latest = provider("<md/>");
    let desired = provider("<md v=\"2\"/>");
    let delta = manager.delta(&desired, &latest);
    manager.update(&desired, &latest, &delta).await.unwrap();
  }

  #[tokio::test]
  async fn name_is_immutable() {
    let manager = SamlProviderManager::new(Arc::new(MockIamApi::new()));
    let latest = provider("<md/>");
    let mut desired = latest.clone();
    desired.spec.name = "azure".into();

    let delta = manager.delta(&desired, &latest);
    assert!(manager.update(&desired, &latest, &delta).await.unwrap_err().is_terminal());
  }
}
