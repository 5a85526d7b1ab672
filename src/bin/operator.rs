use std::{convert::TryFrom, sync::Arc};

use anyhow::{bail, Context as _};
use clap::Parser;
use kube::{config::KubeConfigOptions, Client};
use log::info;

use operator::{
  config::Config,
  iam::{IamApi, SdkIam},
  reconciler::{self, Context},
  references::ReferenceReader,
  resource::{
    GroupManager, InstanceProfileManager, OpenIdConnectProviderManager, PolicyManager, ResourceManager, RoleManager,
    SamlProviderManager, ServiceLinkedRoleManager, UserManager,
  },
};

async fn kube_client(config: &Config) -> anyhow::Result<Client> {
  if let Ok(client) = Client::try_default().await {
    return Ok(client);
  }
  // fall back to a kubeconfig context, as used by Terraform
  match &config.kube_context {
    Some(ctx) => Ok(
      Client::try_from(
        kube::Config::from_kubeconfig(&KubeConfigOptions {
          context: Some(ctx.clone()),
          ..KubeConfigOptions::default()
        })
        .await?,
      )
      .context("Failed to load KUBE_CTX context")?,
    ),
    None => bail!("Failed to create client"),
  }
}

struct Shared {
  client: Client,
  references: Arc<dyn ReferenceReader>,
  config: Config,
  region: Option<String>,
}

impl Shared {
  fn context<M: ResourceManager>(&self, manager: M) -> Arc<Context<M>> {
    Arc::new(Context {
      client: self.client.clone(),
      manager,
      references: self.references.clone(),
      resync_period: self.config.resync_period(),
      error_requeue: self.config.error_requeue(),
      region: self.region.clone(),
    })
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  env_logger::init();
  let config = Config::parse();

  let client = kube_client(&config).await?;

  let mut loader = aws_config::from_env();
  if let Some(region) = &config.aws_region {
    loader = loader.region(aws_config::Region::new(region.clone()));
  }
  let sdk_config = loader.load().await;
  let region = sdk_config.region().map(ToString::to_string);
  let iam: Arc<dyn IamApi> = Arc::new(SdkIam::from_conf(&sdk_config));
  info!(
    "watching {} in region {}",
    config.watch_namespace.as_deref().unwrap_or("all namespaces"),
    region.as_deref().unwrap_or("<unset>")
  );

  let shared = Shared {
    references: Arc::new(client.clone()),
    client,
    region,
    config: config.clone(),
  };
  let ns = config.watch_namespace;

  tokio::join!(
    reconciler::run(shared.context(RoleManager::new(iam.clone())), ns.clone()),
    reconciler::run(shared.context(PolicyManager::new(iam.clone())), ns.clone()),
    reconciler::run(shared.context(GroupManager::new(iam.clone())), ns.clone()),
    reconciler::run(shared.context(UserManager::new(iam.clone())), ns.clone()),
    reconciler::run(shared.context(InstanceProfileManager::new(iam.clone())), ns.clone()),
    reconciler::run(shared.context(OpenIdConnectProviderManager::new(iam.clone())), ns.clone()),
    reconciler::run(shared.context(SamlProviderManager::new(iam.clone())), ns.clone()),
    reconciler::run(shared.context(ServiceLinkedRoleManager::new(iam)), ns),
  );

  Ok(())
}
