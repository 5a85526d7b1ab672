//! Error type shared by the IAM seam, the hooks and the reconciler

use thiserror::Error;

/// IAM error codes that no amount of retrying will fix.
const TERMINAL_AWS_CODES: &[&str] = &[
  "ValidationError",
  "MalformedPolicyDocument",
  "InvalidInput",
  "EntityAlreadyExists",
  "LimitExceeded",
];

#[derive(Debug, Error)]
pub enum Error {
  #[error("Kube error: {0}")]
  Kube(#[from] kube::Error),

  #[error("IAM {operation} failed: {message}")]
  Aws {
    operation: &'static str,
    code: Option<String>,
    message: String,
  },

  #[error("IAM {operation} response is missing {field}")]
  MissingOutput { operation: &'static str, field: &'static str },

  /// Attempted mutation of an immutable field, or any other condition that
  /// needs the user to change the resource before it can make progress.
  #[error("{0}")]
  Terminal(String),

  #[error("{id} and {reference} are mutually exclusive, supply only one of them")]
  ReferenceAndIdConflict { id: &'static str, reference: &'static str },

  #[error("provided resource reference is nil or empty: {0}")]
  EmptyReference(&'static str),

  #[error("referenced {kind} {namespace}/{name} does not exist")]
  ReferenceNotFound { kind: &'static str, namespace: String, name: String },

  #[error("referenced {kind} {namespace}/{name} is not yet synced")]
  ReferenceNotSynced { kind: &'static str, namespace: String, name: String },

  #[error("referenced {kind} {namespace}/{name} has a terminal condition")]
  ReferenceTerminal { kind: &'static str, namespace: String, name: String },

  #[error("referenced {kind} {namespace}/{name} has no value for {field}")]
  ReferenceMissingTargetField {
    kind: &'static str,
    namespace: String,
    name: String,
    field: &'static str,
  },

  #[error("object {0} has no namespace")]
  MissingNamespace(String),

  #[error("Policy document decode error: {0}")]
  Decode(#[from] std::string::FromUtf8Error),

  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Finalizer error: {0}")]
  Finalizer(#[source] Box<kube::runtime::finalizer::Error<Error>>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn terminal(msg: impl Into<String>) -> Self {
    Self::Terminal(msg.into())
  }

  pub fn immutable_fields_changed(fields: &[&str]) -> Self {
    Self::Terminal(format!("Immutable Spec fields have been modified: {}", fields.join(",")))
  }

  /// Terminal errors are surfaced as the `ACK.Terminal` condition and are not
  /// retried until the object changes.
  pub fn is_terminal(&self) -> bool {
    match self {
      Self::Terminal(_) | Self::ReferenceAndIdConflict { .. } | Self::ReferenceTerminal { .. } => true,
      Self::Aws { code: Some(code), .. } => TERMINAL_AWS_CODES.contains(&code.as_str()),
      _ => false,
    }
  }

  pub fn aws_code(&self) -> Option<&str> {
    match self {
      Self::Aws { code, .. } => code.as_deref(),
      _ => None,
    }
  }

  /// IAM reports missing entities with the `NoSuchEntity` code.
  pub fn is_not_found(&self) -> bool {
    self.aws_code() == Some("NoSuchEntity")
  }
}

impl From<kube::runtime::finalizer::Error<Error>> for Error {
  fn from(err: kube::runtime::finalizer::Error<Error>) -> Self {
    Self::Finalizer(Box::new(err))
  }
}
