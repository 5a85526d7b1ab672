use kube::CustomResourceExt;

use operator::crd::{
  Group, InstanceProfile, OpenIDConnectProvider, Policy, Role, SAMLProvider, ServiceLinkedRole, User,
};

fn main() -> anyhow::Result<()> {
  let crds = [
    Role::crd(),
    Policy::crd(),
    Group::crd(),
    User::crd(),
    InstanceProfile::crd(),
    OpenIDConnectProvider::crd(),
    SAMLProvider::crd(),
    ServiceLinkedRole::crd(),
  ];
  for crd in crds {
    print!("---\n{}", serde_yaml::to_string(&crd)?);
  }
  Ok(())
}
