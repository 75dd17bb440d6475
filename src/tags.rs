//! Tag derivation and merge rules.
//!
//! Load balancers are brought up to the set of global tag keys by copying
//! tags from an associated instance and, failing that, from the instance's
//! source image. Everything here is a pure transformation over tag lists;
//! reading and writing the actual cloud resources happens in [`crate::cloud`].

use serde::Serialize;

/// The tag key identifying the owning application.
pub static APPLICATION_KEY: &str = "Application";

/// Legacy project key found on older images, folded into `Application`.
pub static PROJECT_KEY: &str = "Project";

/// OpsWorks stack name, an alternate convention for the application id.
pub static OPSWORKS_STACK_KEY: &str = "opsworks:stack";

/// Elastic Beanstalk environment name, another alternate convention.
pub static BEANSTALK_ENVIRONMENT_KEY: &str = "elasticbeanstalk:environment-name";

/// A key/value tag on a cloud resource.
///
/// Keys are unique within the tag set of one resource; producers de-duplicate
/// by key before emitting a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Tag {
        Tag {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Which tag keys are mandatory, which are platform-owned, and which are noise.
///
/// Passed explicitly into every function here so the rules can be exercised in
/// tests without any process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPolicy {
    /// Tag keys that every load balancer must carry.
    pub global_keys: Vec<String>,
    /// Key prefixes (before the first `:`) owned by the platform, never
    /// written by this tool.
    pub reserved_prefixes: Vec<String>,
    /// Exact keys treated as operational noise rather than business metadata.
    pub ignored_keys: Vec<String>,
}

impl Default for TagPolicy {
    fn default() -> TagPolicy {
        TagPolicy {
            global_keys: vec![
                "Application".to_owned(),
                "Environment".to_owned(),
                "Version".to_owned(),
            ],
            reserved_prefixes: vec![
                "aws".to_owned(),
                "opsworks".to_owned(),
                "elasticbeanstalk".to_owned(),
            ],
            ignored_keys: vec![
                "LaunchedBy".to_owned(),
                "service".to_owned(),
                "component".to_owned(),
            ],
        }
    }
}

/// True if the part of the key before the first `:` is a reserved prefix.
///
/// Keys without a `:` are never reserved.
pub fn is_reserved_key(policy: &TagPolicy, key: &str) -> bool {
    match key.split_once(':') {
        Some((prefix, _)) => policy.reserved_prefixes.iter().any(|p| p == prefix),
        None => false,
    }
}

/// True if the tag is operational noise: either an exact ignored key, or a
/// raw prefix match against the reserved prefixes (no delimiter required).
///
/// Only the volume propagation path consults this; the load balancer flow
/// relies on [`is_reserved_key`] alone.
#[allow(dead_code)]
pub fn is_ignored(policy: &TagPolicy, tag: &Tag) -> bool {
    policy.ignored_keys.iter().any(|k| k == &tag.key)
        || policy
            .reserved_prefixes
            .iter()
            .any(|prefix| tag.key.starts_with(prefix.as_str()))
}

/// The tags an instance contributes as a tagging source.
///
/// `aws:` and `opsworks:` keys are always dropped from the output. When the
/// raw set has no `Application` tag, one is synthesized from the first tag
/// carrying an OpsWorks stack name or a Beanstalk environment name, in the
/// raw set's order.
pub fn instance_tags(raw: &[Tag]) -> Vec<Tag> {
    let mut tags: Vec<Tag> = raw
        .iter()
        .filter(|t| !t.key.starts_with("aws:") && !t.key.starts_with("opsworks:"))
        .cloned()
        .collect();
    if !has_key(raw, APPLICATION_KEY) {
        let alternate = raw
            .iter()
            .find(|t| t.key == OPSWORKS_STACK_KEY || t.key == BEANSTALK_ENVIRONMENT_KEY);
        if let Some(tag) = alternate {
            tags.push(Tag::new(APPLICATION_KEY, tag.value.clone()));
        }
    }
    tags
}

/// The tags an image contributes as a tagging source.
///
/// Older images carry a `Project` key instead of `Application`; when there is
/// no `Application`, the `Project` entry is replaced by an `Application` tag
/// with its value. An image whose tags could not be read contributes an empty
/// slice here; that degradation happens in the cloud layer.
pub fn image_tags(raw: &[Tag]) -> Vec<Tag> {
    if has_key(raw, APPLICATION_KEY) {
        return raw.to_vec();
    }
    match raw.iter().find(|t| t.key == PROJECT_KEY) {
        Some(project) => {
            let application = Tag::new(APPLICATION_KEY, project.value.clone());
            let mut tags: Vec<Tag> = raw
                .iter()
                .filter(|t| t.key != PROJECT_KEY)
                .cloned()
                .collect();
            tags.push(application);
            tags
        }
        None => raw.to_vec(),
    }
}

/// Compute the tag set to apply to a load balancer.
///
/// Every non-reserved tag already on the resource is kept verbatim, in order.
/// Then instance tags and image tags, in that order, contribute any
/// global-keyed tag whose key is not yet present. First occurrence by key
/// wins, so an instance value beats an image value for the same key, and
/// non-global keys are never added.
///
/// Feeding the result back in as `primary` with the same sources leaves it
/// unchanged, so repeated runs converge.
pub fn merge_tags(
    policy: &TagPolicy,
    primary: &[Tag],
    instance: &[Tag],
    image: &[Tag],
) -> Vec<Tag> {
    let mut result: Vec<Tag> = primary
        .iter()
        .filter(|t| !is_reserved_key(policy, &t.key))
        .cloned()
        .collect();
    for tag in instance.iter().chain(image) {
        if policy.global_keys.iter().any(|k| k == &tag.key) && !has_key(&result, &tag.key) {
            result.push(tag.clone());
        }
    }
    result
}

/// Compute the tag set for an EBS volume from its instance and image.
///
/// Same rule as [`merge_tags`] but the volume's own tags take precedence over
/// both sources. Defined for completeness; the load balancer entry point does
/// not drive volume propagation.
#[allow(dead_code)]
pub fn volume_tags(
    policy: &TagPolicy,
    instance: &[Tag],
    image: &[Tag],
    volume: &[Tag],
) -> Vec<Tag> {
    let mut result: Vec<Tag> = Vec::new();
    for tag in volume.iter().chain(instance).chain(image) {
        if !has_key(&result, &tag.key) && policy.global_keys.iter().any(|k| k == &tag.key) {
            result.push(tag.clone());
        }
    }
    result
}

/// True if every global key is already present, by key alone.
pub fn is_fully_tagged(policy: &TagPolicy, current: &[Tag]) -> bool {
    policy.global_keys.iter().all(|key| has_key(current, key))
}

fn has_key(tags: &[Tag], key: &str) -> bool {
    tags.iter().any(|t| t.key == key)
}
