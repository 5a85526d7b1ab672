use kube::Resource;

use crate::crd::GROUP;

/// Finalizer added to every managed object, e.g. `finalizers.iam.services.k8s.aws/Role`
pub fn finalizer_name<K: Resource<DynamicType = ()>>() -> String {
  format!("finalizers.{GROUP}/{}", K::kind(&()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::crd::{OpenIDConnectProvider, Role};

  #[test]
  fn finalizer_is_scoped_by_kind() {
    assert_eq!(finalizer_name::<Role>(), "finalizers.iam.services.k8s.aws/Role");
    assert_eq!(
      finalizer_name::<OpenIDConnectProvider>(),
      "finalizers.iam.services.k8s.aws/OpenIDConnectProvider"
    );
  }
}
