//! Tag synchronization shared by every taggable kind

use std::collections::BTreeMap;

use log::debug;

use crate::crd::Tag;
use crate::iam::{IamApi, TagTarget};
use crate::Result;

/// Tags to add or update and tag keys to remove to get from `latest` to
/// `desired`. Keys are unique on IAM entities, so later duplicates win.
pub fn compute_tags_delta(latest: &[Tag], desired: &[Tag]) -> (Vec<Tag>, Vec<String>) {
  let latest = as_map(latest);
  let desired = as_map(desired);

  let to_add = desired
    .iter()
    .filter(|&(key, value)| latest.get(key) != Some(value))
    .map(|(key, value)| Tag::new(*key, *value))
    .collect();
  let to_remove = latest
    .keys()
    .filter(|key| !desired.contains_key(*key))
    .map(|key| key.to_string())
    .collect();

  (to_add, to_remove)
}

/// Order independent comparison
pub fn equal_tags(a: &[Tag], b: &[Tag]) -> bool {
  as_map(a) == as_map(b)
}

fn as_map(tags: &[Tag]) -> BTreeMap<&str, &str> {
  tags.iter().map(|t| (t.key.as_str(), t.value.as_str())).collect()
}

pub async fn list_tags(api: &dyn IamApi, target: &TagTarget) -> Result<Vec<Tag>> {
  api.list_tags(target).await
}

/// Issue at most one untag and one tag call so that the tags on `target` equal
/// `desired`. Removals go first so a failed tag call never leaves stale keys.
pub async fn sync_tags(api: &dyn IamApi, target: &TagTarget, desired: &[Tag], latest: &[Tag]) -> Result<()> {
  let (to_add, to_remove) = compute_tags_delta(latest, desired);

  if !to_remove.is_empty() {
    debug!("removing tags {to_remove:?} from {target}");
    api.untag_resource(target, &to_remove).await?;
  }
  if !to_add.is_empty() {
    debug!("adding {} tag(s) to {target}", to_add.len());
    api.tag_resource(target, &to_add).await?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::iam::MockIamApi;

  fn tags(pairs: &[(&str, &str)]) -> Vec<Tag> {
    pairs.iter().map(|(k, v)| Tag::new(*k, *v)).collect()
  }

  fn target() -> TagTarget {
    TagTarget::Role("app".to_string())
  }

  #[tokio::test]
  async fn equal_tags_issue_no_calls() {
    let api = MockIamApi::new();
    let current = tags(&[("k1", "v1"), ("k2", "v2")]);
    let desired = tags(&[("k2", "v2"), ("k1", "v1")]);
    sync_tags(&api, &target(), &desired, &current).await.unwrap();
  }

  #[tokio::test]
  async fn added_tag_is_one_tag_call() {
    let mut api = MockIamApi::new();
    api
      .expect_tag_resource()
      .withf(|target, tags| *target == TagTarget::Role("app".into()) && tags == [Tag::new("k3", "v3")])
      .times(1)
      .returning(|_, _| Ok(()));

    let current = tags(&[("k1", "v1")]);
    let desired = tags(&[("k1", "v1"), ("k3", "v3")]);
    sync_tags(&api, &target(), &desired, &current).await.unwrap();
  }

  #[tokio::test]
  async fn removed_tag_is_one_untag_call() {
    let mut api = MockIamApi::new();
    api
      .expect_untag_resource()
      .withf(|_, keys| keys == ["k2".to_string()])
      .times(1)
      .returning(|_, _| Ok(()));

    let current = tags(&[("k1", "v1"), ("k2", "v2")]);
    let desired = tags(&[("k1", "v1")]);
    sync_tags(&api, &target(), &desired, &current).await.unwrap();
  }

  #[tokio::test]
  async fn updated_value_is_one_tag_call() {
    let mut api = MockIamApi::new();
    api
      .expect_tag_resource()
      .withf(|_, tags| tags == [Tag::new("k1", "changed")])
      .times(1)
      .returning(|_, _| Ok(()));

    let current = tags(&[("k1", "v1"), ("k2", "v2")]);
    let desired = tags(&[("k1", "changed"), ("k2", "v2")]);
    sync_tags(&api, &target(), &desired, &current).await.unwrap();
  }

  #[tokio::test]
  async fn untag_failure_stops_the_sync() {
    let mut api = MockIamApi::new();
    api.expect_untag_resource().times(1).returning(|_, _| {
      Err(crate::Error::Aws {
        operation: "UntagRole",
        code: Some("ServiceFailure".into()),
        message: "boom".into(),
      })
    });

    let current = tags(&[("old", "v")]);
    let desired = tags(&[("new", "v")]);
    assert!(sync_tags(&api, &target(), &desired, &current).await.is_err());
  }

  #[test]
  fn compare_tags() {
    assert!(equal_tags(&tags(&[("a", "1"), ("b", "2")]), &tags(&[("b", "2"), ("a", "1")])));
    assert!(!equal_tags(&tags(&[("a", "1")]), &tags(&[("a", "2")])));
    assert!(!equal_tags(&tags(&[("a", "1")]), &tags(&[("a", "1"), ("b", "2")])));
    assert!(!equal_tags(&tags(&[("a", "1")]), &tags(&[("b", "1")])));
    assert!(equal_tags(&[], &[]));
  }

  #[test]
  fn delta_splits_additions_and_removals() {
    let latest = tags(&[("keep", "1"), ("change", "1"), ("drop", "1")]);
    let desired = tags(&[("keep", "1"), ("change", "2"), ("new", "1")]);
    let (to_add, to_remove) = compute_tags_delta(&latest, &desired);
    assert_eq!(to_add, tags(&[("change", "2"), ("new", "1")]));
    assert_eq!(to_remove, vec!["drop".to_string()]);
  }
}
