//! Operator settings, read from flags or the environment

use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Reconciles IAM custom resources against AWS IAM")]
pub struct Config {
  /// Only watch objects in this namespace
  #[arg(long, env = "WATCH_NAMESPACE")]
  pub watch_namespace: Option<String>,

  /// Overrides the region resolved by the AWS default provider chain
  #[arg(long, env = "AWS_REGION")]
  pub aws_region: Option<String>,

  /// kubeconfig context used when no in-cluster configuration is found
  #[arg(long, env = "KUBE_CTX")]
  pub kube_context: Option<String>,

  /// Requeue interval after a successful sync
  #[arg(long, env = "RESYNC_PERIOD_SECONDS", default_value_t = 600)]
  pub resync_period_seconds: u64,

  /// Requeue interval after a recoverable error
  #[arg(long, env = "ERROR_REQUEUE_SECONDS", default_value_t = 15)]
  pub error_requeue_seconds: u64,
}

impl Config {
  pub fn resync_period(&self) -> Duration {
    Duration::from_secs(self.resync_period_seconds)
  }

  pub fn error_requeue(&self) -> Duration {
    Duration::from_secs(self.error_requeue_seconds)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn flags_are_parsed() {
    let config = Config::parse_from([
      "operator",
      "--watch-namespace",
      "iam",
      "--resync-period-seconds",
      "30",
      "--error-requeue-seconds",
      "5",
    ]);
    assert_eq!(config.watch_namespace.as_deref(), Some("iam"));
    assert_eq!(config.resync_period(), Duration::from_secs(30));
    assert_eq!(config.error_requeue(), Duration::from_secs(5));
  }

  #[test]
  fn command_is_well_formed() {
    use clap::CommandFactory;
    Config::command().debug_assert();
  }
}
